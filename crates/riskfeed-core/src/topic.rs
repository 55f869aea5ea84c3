//! Subscription topics and the rules that match them against event types.
//!
//! | Form          | Example           | Matches                                   |
//! |---------------|-------------------|-------------------------------------------|
//! | `event:<TYPE>`| `event:ALERT_CREATED` | type equals `<TYPE>` (case-sensitive) |
//! | `<prefix>:*`  | `covenant:*`      | type starts with `<prefix>`, ignoring case |
//! | anything else | `RISK_SCORE_UPDATE` | type equals the topic (case-sensitive)  |

use crate::event::EventKind;

const EVENT_PREFIX: &str = "event:";
const WILDCARD_SUFFIX: &str = ":*";

/// A parsed subscription topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// `event:<TYPE>`; holds `<TYPE>`.
    EventType(String),
    /// `<prefix>:*`; holds `<prefix>` as written.
    Wildcard(String),
    /// Any other string, compared verbatim.
    Literal(String),
}

impl Topic {
    /// Classify a raw topic string. `event:` is checked before the `:*` suffix.
    pub fn parse(raw: &str) -> Self {
        if let Some(kind) = raw.strip_prefix(EVENT_PREFIX) {
            Self::EventType(kind.to_string())
        } else if let Some(prefix) = raw.strip_suffix(WILDCARD_SUFFIX) {
            Self::Wildcard(prefix.to_string())
        } else {
            Self::Literal(raw.to_string())
        }
    }

    /// The `event:<TYPE>` topic for an event kind.
    pub fn for_event(kind: &EventKind) -> Self {
        Self::EventType(kind.as_str().to_string())
    }

    /// Returns `true` if an event with the given type tag should be delivered
    /// to subscribers of this topic.
    pub fn matches(&self, event_type: &str) -> bool {
        match self {
            Self::EventType(kind) | Self::Literal(kind) => kind == event_type,
            Self::Wildcard(prefix) => event_type
                .to_lowercase()
                .starts_with(&prefix.to_lowercase()),
        }
    }
}

impl From<&str> for Topic {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EventType(kind) => write!(f, "{EVENT_PREFIX}{kind}"),
            Self::Wildcard(prefix) => write!(f, "{prefix}{WILDCARD_SUFFIX}"),
            Self::Literal(raw) => f.write_str(raw),
        }
    }
}

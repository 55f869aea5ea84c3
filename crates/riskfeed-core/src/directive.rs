//! Client → server subscription directives.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Subscribe,
    Unsubscribe,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Subscribe => write!(f, "subscribe"),
            Self::Unsubscribe => write!(f, "unsubscribe"),
        }
    }
}

/// `{ "action": "subscribe" | "unsubscribe", "topic": "<string>" }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub action: Action,
    pub topic: String,
}

impl Directive {
    pub fn subscribe(topic: impl Into<String>) -> Self {
        Self {
            action: Action::Subscribe,
            topic: topic.into(),
        }
    }

    pub fn unsubscribe(topic: impl Into<String>) -> Self {
        Self {
            action: Action::Unsubscribe,
            topic: topic.into(),
        }
    }

    /// Serialize to the JSON text frame sent upstream.
    pub fn to_frame(&self) -> String {
        // Two plain string fields; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format() {
        let frame = Directive::subscribe("covenant:*").to_frame();
        let v: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(v, serde_json::json!({"action": "subscribe", "topic": "covenant:*"}));

        let back: Directive =
            serde_json::from_str(r#"{"action":"unsubscribe","topic":"event:ALERT_CREATED"}"#).unwrap();
        assert_eq!(back, Directive::unsubscribe("event:ALERT_CREATED"));
    }
}

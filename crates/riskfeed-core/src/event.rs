//! Server → client event wire types.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FeedError;

/// The event type tag carried in the `type` field of every inbound event.
///
/// Tags the client does not know about are kept verbatim in [`EventKind::Unknown`]
/// so they can still be routed to literal and wildcard subscriptions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    CovenantUpdate,
    AlertCreated,
    AlertUpdated,
    RiskScoreUpdate,
    DocumentStatusChange,
    ConnectionEstablished,
    Unknown(String),
}

impl EventKind {
    /// Every event type the client recognises.
    pub const KNOWN: [EventKind; 6] = [
        EventKind::CovenantUpdate,
        EventKind::AlertCreated,
        EventKind::AlertUpdated,
        EventKind::RiskScoreUpdate,
        EventKind::DocumentStatusChange,
        EventKind::ConnectionEstablished,
    ];

    /// The wire tag, e.g. `"COVENANT_UPDATE"`.
    pub fn as_str(&self) -> &str {
        match self {
            Self::CovenantUpdate => "COVENANT_UPDATE",
            Self::AlertCreated => "ALERT_CREATED",
            Self::AlertUpdated => "ALERT_UPDATED",
            Self::RiskScoreUpdate => "RISK_SCORE_UPDATE",
            Self::DocumentStatusChange => "DOCUMENT_STATUS_CHANGE",
            Self::ConnectionEstablished => "CONNECTION_ESTABLISHED",
            Self::Unknown(tag) => tag,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl From<&str> for EventKind {
    fn from(tag: &str) -> Self {
        match tag {
            "COVENANT_UPDATE" => Self::CovenantUpdate,
            "ALERT_CREATED" => Self::AlertCreated,
            "ALERT_UPDATED" => Self::AlertUpdated,
            "RISK_SCORE_UPDATE" => Self::RiskScoreUpdate,
            "DOCUMENT_STATUS_CHANGE" => Self::DocumentStatusChange,
            "CONNECTION_ESTABLISHED" => Self::ConnectionEstablished,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl From<String> for EventKind {
    fn from(tag: String) -> Self {
        match Self::from(tag.as_str()) {
            Self::Unknown(_) => Self::Unknown(tag),
            known => known,
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Unknown(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed, timestamped event pushed by the server.
///
/// Wire form: `{ "type": "<EVENT_TYPE>", "payload": <any>, "timestamp": "<ISO-8601>" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Opaque payload; `null` when the frame omits it.
    #[serde(default)]
    pub payload: Value,
    /// ISO-8601 timestamp as sent by the server; empty when omitted.
    #[serde(default)]
    pub timestamp: String,
}

impl Event {
    pub fn new(kind: impl Into<EventKind>, payload: Value, timestamp: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload,
            timestamp: timestamp.into(),
        }
    }

    /// Parse a raw inbound text frame.
    ///
    /// Fails with [`FeedError::MalformedFrame`] if the text is not a JSON object
    /// and with [`FeedError::MissingType`] if `type` is absent or not a string.
    pub fn parse(text: &str) -> Result<Self, FeedError> {
        let value: Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(FeedError::MalformedFrame("expected a JSON object".into()));
        }
        if !value.get("type").is_some_and(Value::is_string) {
            return Err(FeedError::MissingType);
        }
        Ok(serde_json::from_value(value)?)
    }

    /// The wire tag of this event.
    pub fn event_type(&self) -> &str {
        self.kind.as_str()
    }

    /// Parse the timestamp as RFC 3339 / ISO-8601.
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }

    /// Deserialize the opaque payload into a concrete type.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, FeedError> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

//! Feed-level error types.

use thiserror::Error;

/// Errors that can occur while connecting to or reading from the event feed.
///
/// `Clone` so a single connection outcome can be handed to every caller
/// waiting on the same in-flight attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// The transport could not establish a connection.
    #[error("failed to connect to {url}: {reason}")]
    ConnectFailed { url: String, reason: String },

    /// WebSocket send/receive error on an established connection.
    #[error("transport error: {0}")]
    Transport(String),

    /// Inbound frame is not valid JSON or not an event object.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Inbound frame parsed but carries no string `type` field.
    #[error("frame has no event type")]
    MissingType,

    /// A configuration value could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configured endpoint is not a usable WebSocket URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The client was disconnected explicitly.
    #[error("client disconnected")]
    Closed,

    /// Automatic reconnection gave up.
    #[error("reconnection gave up after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

impl FeedError {
    /// Returns `true` if the failure is transient and a later attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectFailed { .. } | Self::Transport(_))
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(e: serde_json::Error) -> Self {
        Self::MalformedFrame(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(FeedError::Transport("reset".into()).is_retryable());
        assert!(!FeedError::Closed.is_retryable());
        assert!(!FeedError::RetriesExhausted { attempts: 5 }.is_retryable());
    }

    #[test]
    fn json_error_becomes_malformed_frame() {
        let err: FeedError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, FeedError::MalformedFrame(_)));
    }
}

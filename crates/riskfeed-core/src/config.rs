//! Feed client configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::backoff::BackoffConfig;
use crate::error::FeedError;

pub const ENV_URL: &str = "RISKFEED_WS_URL";
pub const ENV_PATH: &str = "RISKFEED_WS_PATH";
pub const ENV_RECONNECT_DELAY_MS: &str = "RISKFEED_RECONNECT_DELAY_MS";
pub const ENV_MAX_RECONNECT_ATTEMPTS: &str = "RISKFEED_MAX_RECONNECT_ATTEMPTS";

/// Connection and reconnect settings for a feed client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Base address of the event server, e.g. "wss://api.example.com".
    /// `http`/`https` are accepted and mapped to `ws`/`wss`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Endpoint path appended to `base_url`.
    #[serde(default = "default_path")]
    pub path: String,
    /// Delay before the first reconnect attempt, in milliseconds.
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    /// Automatic reconnect attempts before giving up.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Upper bound on a single reconnect delay, in milliseconds.
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,
}

fn default_base_url() -> String { "ws://localhost:8000".into() }
fn default_path() -> String { "/ws/events".into() }
fn default_reconnect_base_delay_ms() -> u64 { 1_000 }
fn default_max_reconnect_attempts() -> u32 { 5 }
fn default_max_reconnect_delay_ms() -> u64 { 60_000 }

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            path: default_path(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
        }
    }
}

impl FeedConfig {
    /// Defaults overlaid with `RISKFEED_*` environment variables.
    pub fn from_env() -> Result<Self, FeedError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`, keyed by the `ENV_*` names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, FeedError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_URL) {
            config.base_url = url;
        }
        if let Some(path) = lookup(ENV_PATH) {
            config.path = path;
        }
        if let Some(ms) = lookup(ENV_RECONNECT_DELAY_MS) {
            config.reconnect_base_delay_ms = parse_number(ENV_RECONNECT_DELAY_MS, &ms)?;
        }
        if let Some(n) = lookup(ENV_MAX_RECONNECT_ATTEMPTS) {
            config.max_reconnect_attempts = parse_number(ENV_MAX_RECONNECT_ATTEMPTS, &n)?;
        }
        Ok(config)
    }

    /// Use `url` as the base address.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// The full WebSocket endpoint: base URL joined with the path.
    pub fn endpoint(&self) -> Result<String, FeedError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| FeedError::InvalidEndpoint(format!("{}: {e}", self.base_url)))?;

        let scheme = match url.scheme() {
            "ws" | "http" => "ws",
            "wss" | "https" => "wss",
            other => {
                return Err(FeedError::InvalidEndpoint(format!(
                    "unsupported scheme '{other}' in {}",
                    self.base_url
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| FeedError::InvalidEndpoint(self.base_url.clone()))?;

        let suffix = self.path.trim_start_matches('/');
        if !suffix.is_empty() {
            let joined = format!("{}/{}", url.path().trim_end_matches('/'), suffix);
            url.set_path(&joined);
        }
        Ok(url.to_string())
    }

    /// Backoff settings for the reconnect scheduler.
    pub fn backoff(&self) -> BackoffConfig {
        BackoffConfig {
            base_delay: Duration::from_millis(self.reconnect_base_delay_ms),
            max_attempts: self.max_reconnect_attempts,
            max_delay: Duration::from_millis(self.max_reconnect_delay_ms),
            ..Default::default()
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, FeedError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| FeedError::InvalidConfig(format!("{key}={raw}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn default_endpoint() {
        let cfg = FeedConfig::default();
        assert_eq!(cfg.endpoint().unwrap(), "ws://localhost:8000/ws/events");
        assert_eq!(cfg.backoff(), BackoffConfig::default());
    }

    #[test]
    fn http_base_maps_to_ws() {
        let cfg = FeedConfig::default().with_base_url("https://risk.example.com/api/");
        assert_eq!(cfg.endpoint().unwrap(), "wss://risk.example.com/api/ws/events");
    }

    #[test]
    fn rejects_unknown_scheme() {
        let cfg = FeedConfig::default().with_base_url("ftp://example.com");
        assert!(matches!(cfg.endpoint(), Err(FeedError::InvalidEndpoint(_))));
        let cfg = FeedConfig::default().with_base_url("not a url");
        assert!(matches!(cfg.endpoint(), Err(FeedError::InvalidEndpoint(_))));
    }

    #[test]
    fn env_overlay() {
        let cfg = FeedConfig::from_lookup(lookup(&[
            (ENV_URL, "wss://feed.internal"),
            (ENV_PATH, "stream"),
            (ENV_RECONNECT_DELAY_MS, "250"),
            (ENV_MAX_RECONNECT_ATTEMPTS, "3"),
        ]))
        .unwrap();
        assert_eq!(cfg.endpoint().unwrap(), "wss://feed.internal/stream");
        assert_eq!(cfg.backoff().base_delay, Duration::from_millis(250));
        assert_eq!(cfg.backoff().max_attempts, 3);
    }

    #[test]
    fn env_rejects_bad_numbers() {
        let err = FeedConfig::from_lookup(lookup(&[(ENV_MAX_RECONNECT_ATTEMPTS, "many")])).unwrap_err();
        assert!(matches!(err, FeedError::InvalidConfig(_)));
    }

    #[test]
    fn deserializes_partial_json() {
        let cfg: FeedConfig = serde_json::from_str(r#"{"base_url":"wss://x.io"}"#).unwrap();
        assert_eq!(cfg.path, "/ws/events");
        assert_eq!(cfg.max_reconnect_attempts, 5);
    }
}

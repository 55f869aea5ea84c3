//! Client counters.

use std::sync::{Arc, Mutex, PoisonError};

/// Metrics snapshot for a feed client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedMetrics {
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub callbacks_invoked: u64,
    pub callback_panics: u64,
    pub directives_sent: u64,
    pub reconnect_attempts: u64,
}

/// Shared, mutable [`FeedMetrics`].
#[derive(Clone, Default)]
pub struct MetricsHandle(Arc<Mutex<FeedMetrics>>);

impl MetricsHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, f: impl FnOnce(&mut FeedMetrics)) {
        f(&mut self.0.lock().unwrap_or_else(PoisonError::into_inner));
    }

    pub fn snapshot(&self) -> FeedMetrics {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl std::fmt::Debug for MetricsHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.snapshot().fmt(f)
    }
}

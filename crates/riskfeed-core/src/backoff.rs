//! Exponential reconnect backoff.
//!
//! `delay(n) = base_delay * multiplier^(n - 1)`, capped at `max_delay`, for
//! `n` in `1..=max_attempts`. Past `max_attempts` no delay is produced and
//! the caller stops retrying.

use std::time::Duration;

/// Configuration for the reconnect backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Delay before the first reconnect attempt.
    pub base_delay: Duration,
    /// Maximum number of automatic reconnect attempts.
    pub max_attempts: u32,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Growth factor between consecutive attempts.
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1_000),
            max_attempts: 5,
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }
}

/// Stateless policy: maps an attempt number to a delay.
#[derive(Debug, Clone, Default)]
pub struct BackoffPolicy {
    pub config: BackoffConfig,
}

impl BackoffPolicy {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config }
    }

    /// Returns the delay before the `attempt`-th reconnect (1-based).
    /// Returns `None` if `attempt` exceeds `max_attempts`.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if !self.should_retry(attempt) {
            return None;
        }
        let exp = attempt.max(1) - 1;
        let base_ms = self.config.base_delay.as_millis() as f64
            * self.config.multiplier.powi(exp as i32);
        let cap_ms = self.config.max_delay.as_millis() as f64;
        Some(Duration::from_millis(base_ms.min(cap_ms) as u64))
    }

    /// Returns `true` if attempt number `attempt` is still allowed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.config.max_attempts
    }

    /// Every delay the policy will ever produce, in order.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..=self.config.max_attempts)
            .filter_map(|n| self.next_delay(n))
            .collect()
    }
}

/// Bounded count of consecutive failed connections.
///
/// Incremented on every unplanned close, reset on every successful open,
/// and never counts past `max + 1` (the first value that is out of budget).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectCounter {
    attempts: u32,
    max: u32,
}

impl ReconnectCounter {
    pub fn new(max: u32) -> Self {
        Self { attempts: 0, max }
    }

    /// Record an unplanned close and return the attempt number to schedule.
    pub fn increment(&mut self) -> u32 {
        self.attempts = (self.attempts + 1).min(self.max.saturating_add(1));
        self.attempts
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn get(&self) -> u32 {
        self.attempts
    }

    /// Returns `true` once the retry budget is spent.
    pub fn is_exhausted(&self) -> bool {
        self.attempts > self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_doubles_from_one_second() {
        let policy = BackoffPolicy::default();
        let ms: Vec<u128> = (1..=5)
            .map(|n| policy.next_delay(n).unwrap().as_millis())
            .collect();
        assert_eq!(ms, vec![1_000, 2_000, 4_000, 8_000, 16_000]);
        assert!(policy.next_delay(6).is_none());
        assert_eq!(policy.schedule().len(), 5);
    }

    #[test]
    fn delay_capped_at_max() {
        let policy = BackoffPolicy::new(BackoffConfig {
            max_attempts: 10,
            max_delay: Duration::from_millis(5_000),
            ..Default::default()
        });
        assert_eq!(policy.next_delay(4).unwrap(), Duration::from_millis(5_000));
        assert_eq!(policy.next_delay(10).unwrap(), Duration::from_millis(5_000));
    }

    #[test]
    fn should_retry_boundary() {
        let policy = BackoffPolicy::new(BackoffConfig {
            max_attempts: 2,
            ..Default::default()
        });
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn counter_is_bounded_and_resets() {
        let mut c = ReconnectCounter::new(2);
        assert_eq!(c.increment(), 1);
        assert_eq!(c.increment(), 2);
        assert!(!c.is_exhausted());
        assert_eq!(c.increment(), 3);
        assert_eq!(c.increment(), 3);
        assert!(c.is_exhausted());
        c.reset();
        assert_eq!(c.get(), 0);
    }
}

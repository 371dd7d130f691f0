//! Retry Policy
//!
//! Fixed delay plus stop condition for calls that must eventually succeed,
//! such as listing an exchange's symbols. The policy never sleeps itself;
//! callers ask it for the next delay.

use std::time::Duration;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Delay between attempts.
    pub delay: Duration,
    /// Maximum number of retries (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(1), 0)
    }
}

impl RetryConfig {
    /// A fixed delay between attempts.
    #[must_use]
    pub const fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts,
        }
    }
}

/// Stateful retry policy built from a [`RetryConfig`].
///
/// # Example
///
/// ```rust
/// use crypto_exporter::application::services::{RetryConfig, RetryPolicy};
/// use std::time::Duration;
///
/// let mut policy = RetryPolicy::new(RetryConfig::fixed(Duration::from_secs(1), 2));
///
/// assert_eq!(policy.next_delay(), Some(Duration::from_secs(1)));
/// assert_eq!(policy.next_delay(), Some(Duration::from_secs(1)));
/// assert_eq!(policy.next_delay(), None);
/// ```
#[derive(Debug)]
pub struct RetryPolicy {
    config: RetryConfig,
    attempt_count: u32,
}

impl RetryPolicy {
    /// Create a new retry policy.
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self {
            config,
            attempt_count: 0,
        }
    }

    /// Delay before the next attempt.
    ///
    /// Returns `None` once `max_attempts` retries have been handed out.
    #[must_use]
    pub const fn next_delay(&mut self) -> Option<Duration> {
        if !self.should_retry() {
            return None;
        }

        self.attempt_count = self.attempt_count.saturating_add(1);
        Some(self.config.delay)
    }

    /// Retries handed out so far.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Whether another retry is allowed.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.config.max_attempts == 0 || self.attempt_count < self.config.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_fixed_one_second_unlimited() {
        let config = RetryConfig::default();
        assert_eq!(config.delay, Duration::from_secs(1));
        assert_eq!(config.max_attempts, 0);

        let mut policy = RetryPolicy::new(config);
        for _ in 0..1000 {
            assert_eq!(policy.next_delay(), Some(Duration::from_secs(1)));
        }
        assert!(policy.should_retry());
    }

    #[test]
    fn stops_after_max_attempts() {
        let mut policy = RetryPolicy::new(RetryConfig::fixed(Duration::from_millis(10), 3));

        assert_eq!(policy.next_delay(), Some(Duration::from_millis(10)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(10)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(10)));
        assert_eq!(policy.attempt_count(), 3);

        assert!(policy.next_delay().is_none());
        assert!(!policy.should_retry());
    }
}

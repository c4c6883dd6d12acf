//! Retry policy.
//!
//! # Responsibilities
//! - Decide whether a classified failure gets another attempt
//! - Compute the delay before that attempt
//!
//! # Design Decisions
//! - Only classifications marked retryable are retried; authentication,
//!   configuration and security failures need an operator, not a retry
//! - A gateway `Retry-After` hint is a floor, never a ceiling

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resilience::backoff::calculate_backoff;

/// Retry configuration shared by every protected call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,

    pub base_delay_ms: u64,

    pub max_delay_ms: u64,

    pub backoff_multiplier: f64,

    /// Add up to 10% random jitter to each delay.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Delay before retrying after failed attempt number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let delay = calculate_backoff(
            attempt,
            self.base_delay_ms,
            self.max_delay_ms,
            self.backoff_multiplier,
            self.jitter,
        );
        match retry_after {
            Some(hint) => delay.max(hint),
            None => delay,
        }
    }

    pub fn should_retry(&self, attempt: u32, retryable: bool) -> bool {
        retryable && attempt < self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryConfig {
        RetryConfig {
            jitter: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_retry_after_is_a_floor() {
        let policy = policy();
        assert_eq!(
            policy.delay_for(0, Some(Duration::from_secs(5))),
            Duration::from_secs(5)
        );
        assert_eq!(
            policy.delay_for(4, Some(Duration::from_secs(5))),
            Duration::from_secs(16)
        );
    }

    #[test]
    fn test_should_retry_bounds() {
        let policy = policy();
        assert!(policy.should_retry(0, true));
        assert!(policy.should_retry(2, true));
        assert!(!policy.should_retry(3, true));
        assert!(!policy.should_retry(0, false));
    }
}

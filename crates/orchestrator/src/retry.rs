//! Retry policy for collaborator calls.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backoff strategy between retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries.
    Fixed,
    /// Exponential backoff: base * 2^(attempt - 1), capped at `max_delay`.
    Exponential,
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential
    }
}

/// How transient collaborator failures are retried within a stage.
///
/// Only the supervisor applies this; the decision units never retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first failed attempt (0 = fail fast).
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            strategy: BackoffStrategy::Exponential,
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 0,
            ..Default::default()
        }
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            max_delay: delay,
            strategy: BackoffStrategy::Fixed,
        }
    }

    /// Delay before the given retry attempt (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        match self.strategy {
            BackoffStrategy::Fixed => self.base_delay,
            BackoffStrategy::Exponential => {
                let exp = 2_u32.saturating_pow(attempt.saturating_sub(1));
                self.base_delay.saturating_mul(exp).min(self.max_delay)
            }
        }
    }

    /// Whether another retry is allowed after `attempt` failures.
    pub fn should_retry(&self, failed_attempts: u32) -> bool {
        failed_attempts <= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            strategy: BackoffStrategy::Exponential,
        };
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(350));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(350));
    }

    #[test]
    fn no_retry_fails_fast() {
        let policy = RetryPolicy::no_retry();
        assert!(!policy.should_retry(1));
    }

    #[test]
    fn default_allows_two_retries() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn delays_never_exceed_the_cap(base_ms in 1u64..1000, cap_ms in 1u64..10_000, attempt in 1u32..20) {
                let policy = RetryPolicy {
                    max_attempts: 5,
                    base_delay: Duration::from_millis(base_ms),
                    max_delay: Duration::from_millis(cap_ms),
                    strategy: BackoffStrategy::Exponential,
                };
                prop_assert!(policy.delay_for_attempt(attempt) <= policy.max_delay.max(policy.base_delay));
            }

            #[test]
            fn exponential_delays_are_nondecreasing(base_ms in 1u64..1000, attempt in 1u32..19) {
                let policy = RetryPolicy {
                    max_attempts: 5,
                    base_delay: Duration::from_millis(base_ms),
                    max_delay: Duration::from_secs(60),
                    strategy: BackoffStrategy::Exponential,
                };
                prop_assert!(policy.delay_for_attempt(attempt) <= policy.delay_for_attempt(attempt + 1));
            }
        }
    }
}

//! Retry policy for remote mutation calls
//!
//! Validation, permission, conflict and unknown failures are never retried.
//! Transient failures are retried up to `max_attempts` total attempts with
//! exponential backoff: `base_delay * 2^n`, capped at `max_delay`.

use crate::EngineConfig;
use crate::error::{ConfigError, ErrorKind, RemoteError};
use std::time::Duration;

/// Result of classifying a remote failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub retryable: bool,
    pub kind: ErrorKind,
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Reissue the call after `delay`; `attempt` is the number of the next attempt
    Retry { attempt: u32, delay: Duration },
    /// Surface the failure
    GiveUp { kind: ErrorKind },
}

/// Classifies failures and decides whether and when to retry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
    ) -> Result<Self, ConfigError> {
        if max_attempts == 0 {
            return Err(ConfigError::invalid("max_attempts", "must be at least 1"));
        }
        if base_delay > max_delay {
            return Err(ConfigError::invalid(
                "base_delay_ms",
                "must not exceed max_delay_ms",
            ));
        }
        Ok(Self {
            max_attempts,
            base_delay,
            max_delay,
        })
    }

    /// Create a policy from engine configuration
    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    /// A policy that makes exactly one attempt
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Total attempts allowed, including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Classify a remote failure
    pub fn classify(&self, error: &RemoteError) -> Classification {
        let kind = error.kind();
        Classification {
            retryable: kind.is_retryable(),
            kind,
        }
    }

    /// Decide what to do after `attempts_made` failed attempts ending in `error`
    pub fn evaluate(&self, error: &RemoteError, attempts_made: u32) -> RetryDecision {
        let classification = self.classify(error);
        if !classification.retryable || attempts_made >= self.max_attempts {
            return RetryDecision::GiveUp {
                kind: classification.kind,
            };
        }
        RetryDecision::Retry {
            attempt: attempts_made + 1,
            delay: self.backoff_delay(attempts_made.saturating_sub(1)),
        }
    }

    /// Delay before retry number `retry_index` (0 for the first retry)
    pub fn backoff_delay(&self, retry_index: u32) -> Duration {
        let factor = 2u32.checked_pow(retry_index).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(4, Duration::from_secs(2), Duration::from_secs(60)).unwrap()
    }

    #[test]
    fn test_backoff_delay() {
        let policy = policy();
        assert_eq!(policy.backoff_delay(0), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(4));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(8));
        assert_eq!(policy.backoff_delay(3), Duration::from_secs(16));

        // Capped
        assert_eq!(policy.backoff_delay(10), Duration::from_secs(60));
        assert_eq!(policy.backoff_delay(64), Duration::from_secs(60));
    }

    #[test]
    fn test_validation_never_retried() {
        let policy = policy();
        let error = RemoteError::validation("name is required");

        assert!(!policy.classify(&error).retryable);
        for attempts in 0..policy.max_attempts() {
            assert_eq!(
                policy.evaluate(&error, attempts),
                RetryDecision::GiveUp {
                    kind: ErrorKind::Validation
                }
            );
        }
    }

    #[test]
    fn test_non_transient_kinds_give_up() {
        let policy = policy();
        let errors = vec![
            RemoteError::permission("denied"),
            RemoteError::conflict("duplicate"),
            RemoteError::new("mystery", "?"),
        ];

        for error in errors {
            assert!(
                matches!(policy.evaluate(&error, 1), RetryDecision::GiveUp { .. }),
                "{error:?} should not be retried"
            );
        }
    }

    #[test]
    fn test_transient_retried_until_budget() {
        let policy = policy();
        let error = RemoteError::server(503, "unavailable");

        assert_eq!(
            policy.evaluate(&error, 1),
            RetryDecision::Retry {
                attempt: 2,
                delay: Duration::from_secs(2)
            }
        );
        assert_eq!(
            policy.evaluate(&error, 3),
            RetryDecision::Retry {
                attempt: 4,
                delay: Duration::from_secs(8)
            }
        );
        assert_eq!(
            policy.evaluate(&error, 4),
            RetryDecision::GiveUp {
                kind: ErrorKind::Transient
            }
        );
    }

    #[test]
    fn test_no_retry_policy() {
        let policy = RetryPolicy::no_retry();
        assert_eq!(
            policy.evaluate(&RemoteError::timeout("slow"), 1),
            RetryDecision::GiveUp {
                kind: ErrorKind::Transient
            }
        );
    }

    #[test]
    fn test_invalid_policies() {
        assert!(RetryPolicy::new(0, Duration::ZERO, Duration::ZERO).is_err());
        assert!(
            RetryPolicy::new(3, Duration::from_secs(10), Duration::from_secs(1)).is_err()
        );
    }

    #[test]
    fn test_from_config() {
        let policy = RetryPolicy::from_config(&EngineConfig::default()).unwrap();
        assert_eq!(policy, RetryPolicy::default());
    }
}

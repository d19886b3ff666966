//! Explicit retry policy for the blocking connection calls
//!
//! The default reproduces a fixed one-second interval with no cap on attempts.
//! Exponential backoff and an attempt cap are opt-in.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy for network association and broker session establishment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryPolicy {
    /// Delay before the second attempt, in milliseconds
    pub interval_ms: u64,
    /// Maximum number of failed attempts (None = unlimited)
    pub max_attempts: Option<u32>,
    /// Multiplier applied to the delay after each failure (1.0 = fixed interval)
    pub backoff_factor: f64,
    /// Upper bound for grown delays, in milliseconds
    pub max_interval_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval_ms: 1_000,
            max_attempts: None,
            backoff_factor: 1.0,
            max_interval_ms: 30_000,
        }
    }
}

/// Decision after a failed attempt
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Wait `delay`, then make attempt number `attempt`
    Proceed { attempt: u32, delay: Duration },
    /// Attempt cap reached
    GiveUp { attempts: u32 },
}

impl RetryPolicy {
    /// Fixed interval, unlimited attempts
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval_ms: interval.as_millis() as u64,
            ..Default::default()
        }
    }

    /// Builder-style attempt cap
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Builder-style exponential backoff
    pub fn with_backoff(mut self, factor: f64, max_interval: Duration) -> Self {
        self.backoff_factor = factor;
        self.max_interval_ms = max_interval.as_millis() as u64;
        self
    }

    /// Delay to sleep after the given failed attempt (1-based)
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        if self.backoff_factor <= 1.0 {
            return Duration::from_millis(self.interval_ms);
        }

        let exponent = failed_attempt.saturating_sub(1).min(64) as i32;
        let grown = self.interval_ms as f64 * self.backoff_factor.powi(exponent);
        let cap = self.max_interval_ms.max(self.interval_ms) as f64;
        Duration::from_millis(grown.min(cap) as u64)
    }

    /// Decide what to do after `failed_attempts` consecutive failures
    pub fn decide(&self, failed_attempts: u32) -> RetryDecision {
        if let Some(max_attempts) = self.max_attempts {
            if failed_attempts >= max_attempts {
                return RetryDecision::GiveUp {
                    attempts: failed_attempts,
                };
            }
        }

        RetryDecision::Proceed {
            attempt: failed_attempts + 1,
            delay: self.delay_after(failed_attempts),
        }
    }

    /// Total worst-case waiting time, None when attempts are unlimited
    pub fn max_total_delay(&self) -> Option<Duration> {
        self.max_attempts.map(|max_attempts| {
            (1..max_attempts)
                .map(|attempt| self.delay_after(attempt))
                .sum()
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.interval_ms == 0 {
            return Err("interval_ms must be greater than 0".to_string());
        }
        if self.max_attempts == Some(0) {
            return Err("max_attempts must be greater than 0 or unset for unlimited".to_string());
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(format!(
                "backoff_factor must be a finite number >= 1.0, got {}",
                self.backoff_factor
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_fixed_one_second_unbounded() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, None);
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(50), Duration::from_secs(1));
        assert_eq!(policy.max_total_delay(), None);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_unbounded_policy_never_gives_up() {
        let policy = RetryPolicy::default();
        for failures in [0, 1, 10, 10_000, u32::MAX - 1] {
            assert!(matches!(
                policy.decide(failures),
                RetryDecision::Proceed { .. }
            ));
        }
    }

    #[test]
    fn test_capped_policy_gives_up_at_cap() {
        let policy = RetryPolicy::fixed(Duration::from_millis(10)).with_max_attempts(3);
        assert_eq!(
            policy.decide(2),
            RetryDecision::Proceed {
                attempt: 3,
                delay: Duration::from_millis(10)
            }
        );
        assert_eq!(policy.decide(3), RetryDecision::GiveUp { attempts: 3 });
        assert_eq!(policy.max_total_delay(), Some(Duration::from_millis(20)));
    }

    #[test]
    fn test_exponential_backoff_grows_and_caps() {
        let policy = RetryPolicy::fixed(Duration::from_millis(100))
            .with_backoff(2.0, Duration::from_millis(500));
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
        assert_eq!(policy.delay_after(4), Duration::from_millis(500));
        assert_eq!(policy.delay_after(1_000), Duration::from_millis(500));
    }

    #[test]
    fn test_fixed_interval_longer_than_cap_is_not_shortened() {
        let policy = RetryPolicy {
            interval_ms: 60_000,
            ..Default::default()
        };
        assert_eq!(policy.delay_after(3), Duration::from_secs(60));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let zero_interval = RetryPolicy {
            interval_ms: 0,
            ..Default::default()
        };
        assert!(zero_interval.validate().is_err());

        let zero_attempts = RetryPolicy::default().with_max_attempts(0);
        assert!(zero_attempts.validate().is_err());

        let shrinking = RetryPolicy::default().with_backoff(0.5, Duration::from_secs(1));
        assert!(shrinking.validate().is_err());
    }
}

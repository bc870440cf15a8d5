use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    Constant,
    Linear,
    Exponential,
}

/// Retry policy for both the consumer delivery protocol and the pipeline's
/// retry decorator.
///
/// `max_attempts` is defined as *additional retries after the first
/// attempt*: `max_attempts = k` means the handler is invoked `k + 1` times
/// total before the envelope is dead-lettered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicyConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff: BackoffType,
    pub max_delay: Option<Duration>,
    pub jitter: bool,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(10),
            backoff: BackoffType::Constant,
            max_delay: None,
            jitter: false,
        }
    }
}

impl RetryPolicyConfig {
    /// Computes the back-off delay before the given retry attempt (1-based:
    /// the delay before the *second* invocation is `delay_for(1)`).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = match self.backoff {
            BackoffType::Constant => self.initial_delay,
            BackoffType::Linear => self.initial_delay * attempt.max(1),
            BackoffType::Exponential => {
                self.initial_delay.saturating_mul(1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX))
            }
        };
        let base = match self.max_delay {
            Some(max) if base > max => max,
            _ => base,
        };
        if self.jitter {
            let jitter_fraction = fastrand::f64() * 0.25;
            base.mul_f64(1.0 - jitter_fraction)
        } else {
            base
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_backoff_does_not_grow() {
        let policy = RetryPolicyConfig {
            backoff: BackoffType::Constant,
            initial_delay: Duration::from_millis(10),
            ..Default::default()
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(10));
        assert_eq!(policy.delay_for(5), Duration::from_millis(10));
    }

    #[test]
    fn linear_backoff_grows_proportionally() {
        let policy = RetryPolicyConfig {
            backoff: BackoffType::Linear,
            initial_delay: Duration::from_millis(10),
            ..Default::default()
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(10));
        assert_eq!(policy.delay_for(3), Duration::from_millis(30));
    }

    #[test]
    fn exponential_backoff_doubles() {
        let policy = RetryPolicyConfig {
            backoff: BackoffType::Exponential,
            initial_delay: Duration::from_millis(10),
            ..Default::default()
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(10));
        assert_eq!(policy.delay_for(2), Duration::from_millis(20));
        assert_eq!(policy.delay_for(3), Duration::from_millis(40));
    }

    #[test]
    fn max_delay_caps_growth() {
        let policy = RetryPolicyConfig {
            backoff: BackoffType::Exponential,
            initial_delay: Duration::from_millis(10),
            max_delay: Some(Duration::from_millis(25)),
            ..Default::default()
        };
        assert_eq!(policy.delay_for(4), Duration::from_millis(25));
    }
}

//! Retry policy for conditional writes
//!
//! A draw is a read-modify-write keyed on the document version. When another
//! writer commits in between, the draw re-reads and tries again; this policy
//! bounds how many times and how long to wait between attempts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backoff strategy for retry delays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed,
    /// Linear increase: delay * attempt
    Linear,
    /// Exponential increase: delay * 2^attempt
    Exponential,
    /// Exponential with jitter so racing writers spread out
    ExponentialWithJitter,
}

impl BackoffStrategy {
    /// Calculate delay for a given attempt number
    ///
    /// # Arguments
    /// - `attempt`: Zero-based retry number (0 = first retry)
    /// - `initial_delay`: Base delay duration
    /// - `max_delay`: Maximum delay duration
    pub fn calculate_delay(
        &self,
        attempt: u32,
        initial_delay: Duration,
        max_delay: Duration,
    ) -> Duration {
        use rand::Rng;

        let delay = match self {
            BackoffStrategy::Fixed => initial_delay,
            BackoffStrategy::Linear => initial_delay.saturating_mul(attempt.saturating_add(1)),
            BackoffStrategy::Exponential => {
                initial_delay.saturating_mul(2u32.saturating_pow(attempt))
            }
            BackoffStrategy::ExponentialWithJitter => {
                let base_delay = initial_delay.saturating_mul(2u32.saturating_pow(attempt));
                let jitter =
                    (base_delay.as_millis() as f64 * 0.1 * rand::thread_rng().gen::<f64>()) as u64;
                base_delay.saturating_add(Duration::from_millis(jitter))
            }
        };

        delay.min(max_delay)
    }
}

/// Bounded retry configuration.
///
/// `max_attempts` counts every conditional write, including the first, and is
/// never less than one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of conditional write attempts
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds
    pub initial_delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds
    pub max_delay_ms: u64,
    /// Backoff strategy to use
    pub strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential()
    }
}

impl RetryPolicy {
    /// Exponential backoff with jitter, five attempts
    pub fn exponential() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 10,
            max_delay_ms: 500,
            strategy: BackoffStrategy::ExponentialWithJitter,
        }
    }

    /// Fixed delay between attempts
    pub fn fixed(delay_ms: u64) -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: delay_ms,
            max_delay_ms: delay_ms,
            strategy: BackoffStrategy::Fixed,
        }
    }

    /// Set maximum attempts
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set initial delay
    pub fn with_initial_delay_ms(mut self, delay_ms: u64) -> Self {
        self.initial_delay_ms = delay_ms;
        self
    }

    /// Set maximum delay
    pub fn with_max_delay_ms(mut self, delay_ms: u64) -> Self {
        self.max_delay_ms = delay_ms;
        self
    }

    /// Set backoff strategy
    pub fn with_strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Attempt bound, never less than one
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after the given zero-based failed attempt
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        self.strategy.calculate_delay(
            attempt,
            Duration::from_millis(self.initial_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_is_capped() {
        let policy = RetryPolicy::exponential()
            .with_strategy(BackoffStrategy::Exponential)
            .with_initial_delay_ms(10)
            .with_max_delay_ms(50);

        assert_eq!(policy.calculate_delay(0), Duration::from_millis(10));
        assert_eq!(policy.calculate_delay(1), Duration::from_millis(20));
        assert_eq!(policy.calculate_delay(2), Duration::from_millis(40));
        assert_eq!(policy.calculate_delay(3), Duration::from_millis(50));
        assert_eq!(policy.calculate_delay(40), Duration::from_millis(50));
    }

    #[test]
    fn test_linear_and_fixed() {
        let linear = RetryPolicy::fixed(5).with_strategy(BackoffStrategy::Linear).with_max_delay_ms(100);
        assert_eq!(linear.calculate_delay(2), Duration::from_millis(15));

        let fixed = RetryPolicy::fixed(7);
        assert_eq!(fixed.calculate_delay(9), Duration::from_millis(7));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = RetryPolicy::exponential();
        for attempt in 0..4 {
            let delay = policy.calculate_delay(attempt);
            let base = Duration::from_millis(10 * 2u64.pow(attempt));
            assert!(delay >= base.min(Duration::from_millis(500)));
            assert!(delay <= Duration::from_millis(500));
        }
    }

    #[test]
    fn test_attempts_never_zero() {
        assert_eq!(RetryPolicy::exponential().with_max_attempts(0).attempts(), 1);
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let policy: RetryPolicy = serde_json::from_str(r#"{"max_attempts": 2, "strategy": "fixed"}"#).unwrap();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.strategy, BackoffStrategy::Fixed);
        assert_eq!(policy.initial_delay_ms, 10);
    }
}

//! Store configuration
//!
//! Every field has a default, so a configuration file only needs to name the
//! values it changes.

use countkun_core::{RetryPolicy, DEFAULT_DOCUMENT_KEY};
use serde::{Deserialize, Serialize};

/// Errors raised while validating a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A field holds an unusable value
    #[error("Invalid configuration for {field}: {message}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        message: String,
    },
}

/// Configuration for [`SharedCounterStore`](crate::SharedCounterStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Identifier of the shared inventory document
    pub document_key: String,
    /// Bound and backoff for the conditional write behind a draw
    pub retry: RetryPolicy,
    /// Wait before re-establishing a lost observation link, in milliseconds
    pub reconnect_delay_ms: u64,
    /// Counts at or below this (and above zero) are flagged as low stock
    pub low_stock_threshold: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            document_key: DEFAULT_DOCUMENT_KEY.to_string(),
            retry: RetryPolicy::exponential(),
            reconnect_delay_ms: 1_000,
            low_stock_threshold: 3,
        }
    }
}

impl StoreConfig {
    /// Configuration tuned for tests: no jitter, short delays
    pub fn for_testing() -> Self {
        Self {
            retry: RetryPolicy::fixed(1),
            reconnect_delay_ms: 10,
            ..Self::default()
        }
    }

    /// Use a different document key
    pub fn with_document_key(mut self, key: impl Into<String>) -> Self {
        self.document_key = key.into();
        self
    }

    /// Use a different retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Use a different reconnect delay
    pub fn with_reconnect_delay_ms(mut self, delay_ms: u64) -> Self {
        self.reconnect_delay_ms = delay_ms;
        self
    }

    /// Use a different low-stock threshold
    pub fn with_low_stock_threshold(mut self, threshold: u32) -> Self {
        self.low_stock_threshold = threshold;
        self
    }

    /// Reject configurations the store cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.document_key.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "document_key",
                message: "must not be empty".to_string(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "retry.max_attempts",
                message: "must allow at least one attempt".to_string(),
            });
        }
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Invalid {
                field: "retry.initial_delay_ms",
                message: format!(
                    "{} exceeds max_delay_ms {}",
                    self.retry.initial_delay_ms, self.retry.max_delay_ms
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_defaults_are_valid() {
        assert!(StoreConfig::default().validate().is_ok());
        assert!(StoreConfig::for_testing().validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_key() {
        let config = StoreConfig::default().with_document_key("  ");
        assert_matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "document_key", .. })
        );
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let config = StoreConfig::default().with_retry(RetryPolicy::fixed(1).with_max_attempts(0));
        assert_matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "retry.max_attempts", .. })
        );
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"low_stock_threshold": 5, "retry": {"max_attempts": 2}}"#)
                .unwrap();
        assert_eq!(config.low_stock_threshold, 5);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.document_key, DEFAULT_DOCUMENT_KEY);
    }
}

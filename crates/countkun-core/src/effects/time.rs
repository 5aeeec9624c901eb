//! Wall-clock time effects
//!
//! History entries are stamped in milliseconds since the Unix epoch, and the
//! store's retry and reconnect loops sleep through this trait so simulated
//! clocks can drive them deterministically.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Error type for time operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum TimeError {
    /// Clock could not be read
    #[error("Clock unavailable: {reason}")]
    ClockUnavailable {
        /// Why the clock could not be read
        reason: String,
    },
}

/// Physical clock provider.
#[async_trait]
pub trait PhysicalTimeEffects: Send + Sync {
    /// Milliseconds since the Unix epoch.
    async fn now_ms(&self) -> Result<u64, TimeError>;

    /// Suspend the caller for `ms` milliseconds.
    async fn sleep_ms(&self, ms: u64) -> Result<(), TimeError>;
}

/// Blanket implementation for Arc<T> where T: PhysicalTimeEffects
#[async_trait]
impl<T: PhysicalTimeEffects + ?Sized> PhysicalTimeEffects for Arc<T> {
    async fn now_ms(&self) -> Result<u64, TimeError> {
        (**self).now_ms().await
    }

    async fn sleep_ms(&self, ms: u64) -> Result<(), TimeError> {
        (**self).sleep_ms(ms).await
    }
}

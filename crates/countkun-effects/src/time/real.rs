//! Real time effect handler for production use

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use countkun_core::effects::{PhysicalTimeEffects, TimeError};
use tokio::time;

/// Real time handler for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct RealTimeHandler;

impl RealTimeHandler {
    /// Create a new real time handler
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PhysicalTimeEffects for RealTimeHandler {
    async fn now_ms(&self) -> Result<u64, TimeError> {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| TimeError::ClockUnavailable {
                reason: format!("system clock is before the Unix epoch: {e}"),
            })?;
        Ok(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
    }

    async fn sleep_ms(&self, ms: u64) -> Result<(), TimeError> {
        time::sleep(Duration::from_millis(ms)).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clock_moves_forward() {
        let handler = RealTimeHandler::new();
        let before = handler.now_ms().await.unwrap();
        handler.sleep_ms(5).await.unwrap();
        let after = handler.now_ms().await.unwrap();
        assert!(after >= before + 5);
    }
}

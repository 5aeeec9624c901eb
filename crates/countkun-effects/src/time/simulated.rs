//! Simulated time effect handler for testing

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use countkun_core::effects::{PhysicalTimeEffects, TimeError};

/// Simulated clock shared by every clone.
///
/// Sleeping advances the clock instead of waiting, so retry and reconnect
/// delays cost no wall time. With a non-zero step, every reading also
/// advances the clock so consecutive history entries get distinct times.
#[derive(Debug, Clone)]
pub struct SimulatedTimeHandler {
    /// Current simulated time in milliseconds
    current_time: Arc<AtomicU64>,
    /// Milliseconds added after every reading
    step_ms: u64,
}

impl SimulatedTimeHandler {
    /// Create a simulated clock starting at the given time
    pub fn new(start_time_ms: u64) -> Self {
        Self {
            current_time: Arc::new(AtomicU64::new(start_time_ms)),
            step_ms: 0,
        }
    }

    /// Create a simulated clock that advances `step_ms` after every reading
    pub fn with_step(start_time_ms: u64, step_ms: u64) -> Self {
        Self {
            current_time: Arc::new(AtomicU64::new(start_time_ms)),
            step_ms,
        }
    }

    /// Advance simulated time
    pub fn advance_time(&self, duration_ms: u64) {
        self.current_time.fetch_add(duration_ms, Ordering::SeqCst);
    }

    /// Set the absolute simulated time
    pub fn set_time(&self, time_ms: u64) {
        self.current_time.store(time_ms, Ordering::SeqCst);
    }

    /// Current simulated time without advancing it
    pub fn get_time(&self) -> u64 {
        self.current_time.load(Ordering::SeqCst)
    }
}

impl Default for SimulatedTimeHandler {
    fn default() -> Self {
        Self::new(0)
    }
}

#[async_trait]
impl PhysicalTimeEffects for SimulatedTimeHandler {
    async fn now_ms(&self) -> Result<u64, TimeError> {
        Ok(self.current_time.fetch_add(self.step_ms, Ordering::SeqCst))
    }

    async fn sleep_ms(&self, ms: u64) -> Result<(), TimeError> {
        self.advance_time(ms);
        tokio::task::yield_now().await;
        Ok(())
    }
}

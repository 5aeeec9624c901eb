//! Clock handlers
//!
//! - [`RealTimeHandler`]: system clock and tokio timers
//! - [`SimulatedTimeHandler`]: manually driven clock for tests and simulations

mod real;
mod simulated;

pub use real::RealTimeHandler;
pub use simulated::SimulatedTimeHandler;

//! Countkun Effects: Handlers for the Store's Collaborators
//!
//! Concrete implementations of the effect traits declared in `countkun-core`:
//!
//! - **Document stores**: [`MemoryDocumentStore`] (shared in-process, with
//!   simulated link loss) and [`FileDocumentStore`] (JSON on disk)
//! - **Clocks**: [`RealTimeHandler`] and [`SimulatedTimeHandler`]
//! - **Sign-in gate**: [`SessionGate`]

#![forbid(unsafe_code)]

pub mod authorization;
pub mod document;
pub mod time;

pub use authorization::SessionGate;
pub use document::{FileDocumentStore, MemoryDocumentStore, DEFAULT_FEED_CAPACITY};
pub use time::{RealTimeHandler, SimulatedTimeHandler};

//! Countkun Sync: Shared Counter Store
//!
//! Composes the effect traits from `countkun-core` into
//! [`SharedCounterStore`], the single authority over the shared prize
//! inventory.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized --subscribe--> Syncing --first snapshot--> Synchronized
//!                                                           ^        |
//!                                         reconnect/sign-in |        | link lost/sign-out
//!                                                           |        v
//!                                                          Disconnected
//! any phase --last unsubscribe / teardown--> Uninitialized
//! ```
//!
//! Mutations are only accepted while `Synchronized`. Observers see a change
//! only after the backing store has committed it.

#![forbid(unsafe_code)]

pub mod config;
mod link;
pub mod store;
pub mod subscription;
pub mod view;

pub use config::{ConfigError, StoreConfig};
pub use store::SharedCounterStore;
pub use subscription::Subscription;
pub use view::{summarize, RankSummary, StoreView, SyncPhase};

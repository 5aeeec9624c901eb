//! Countkun Core: Shared Prize Inventory Foundation
//!
//! Foundation layer for the shared prize inventory: five counters ("ranks")
//! plus an append-only history of complete snapshots, synchronized across
//! every connected client through a single versioned document.
//!
//! # Architecture Overview
//!
//! - **Value types** ([`Rank`], [`CounterVector`], [`Version`]) make the
//!   fixed length and non-negativity of the inventory type-level facts.
//! - **History** ([`HistoryEntry`], [`HistoryLog`]) records every change as a
//!   full snapshot in non-decreasing time order.
//! - **State** ([`SharedState`]) is the only unit of consistency: counts and
//!   history are always replaced together.
//! - **Effects** ([`effects`]) describe the collaborators the store depends on
//!   (document store, wall clock, sign-in gate) without choosing an
//!   implementation.
//! - **Reliability** ([`RetryPolicy`]) bounds the conditional-write retry loop.
//!
//! Handlers for the effect traits live in `countkun-effects`; the store that
//! composes them lives in `countkun-sync`.

#![forbid(unsafe_code)]

pub mod effects;
pub mod errors;
pub mod history;
pub mod reliability;
pub mod state;
pub mod types;

pub use effects::{
    AuthState, AuthorizationEffects, DocumentError, DocumentEvent, DocumentStoreEffects,
    DocumentStream, PhysicalTimeEffects, TimeError, VersionedDocument,
};
pub use errors::{StoreError, StoreResult};
pub use history::{ChartPoint, HistoryEntry, HistoryError, HistoryLog};
pub use reliability::{BackoffStrategy, RetryPolicy};
pub use state::SharedState;
pub use types::{CounterVector, Rank, Version, RANK_COUNT};

/// Identifier of the one shared inventory document.
pub const DEFAULT_DOCUMENT_KEY: &str = "prizes/current";

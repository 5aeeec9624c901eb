//! Consumer-facing view of the store
//!
//! [`StoreView`] is what presentation code reads: the sync phase, the last
//! authoritative document, and the derived chart rows and per-rank summaries.

use countkun_core::{
    ChartPoint, CounterVector, HistoryEntry, Rank, SharedState, Version, VersionedDocument,
};
use serde::Serialize;

/// Lifecycle phase of one store instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SyncPhase {
    /// Nobody is subscribed; no observation link exists
    #[default]
    Uninitialized,
    /// Link started, no authoritative snapshot yet
    Syncing,
    /// At least one authoritative snapshot received and the link is up
    Synchronized,
    /// Link lost or no signed-in actor; the last snapshot is stale
    Disconnected {
        /// What took the link down
        reason: String,
    },
}

impl SyncPhase {
    /// Short lowercase name for logs and status lines
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Syncing => "syncing",
            Self::Synchronized => "synchronized",
            Self::Disconnected { .. } => "disconnected",
        }
    }
}

/// Snapshot of what an observer currently knows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreView {
    /// Current phase
    pub phase: SyncPhase,
    /// Last authoritative document, kept while disconnected
    pub document: Option<VersionedDocument>,
}

impl StoreView {
    /// Whether no authoritative snapshot has arrived yet
    pub fn loading(&self) -> bool {
        matches!(self.phase, SyncPhase::Uninitialized | SyncPhase::Syncing)
    }

    /// Whether the shown state may be out of date
    pub fn is_stale(&self) -> bool {
        matches!(self.phase, SyncPhase::Disconnected { .. })
    }

    /// Version of the shown document
    pub fn version(&self) -> Option<Version> {
        self.document.as_ref().map(|document| document.version)
    }

    /// Shown state, if any
    pub fn state(&self) -> Option<&SharedState> {
        self.document.as_ref().map(|document| &document.state)
    }

    /// Shown counts; all zero before the first snapshot
    pub fn counts(&self) -> CounterVector {
        self.state()
            .map_or_else(CounterVector::zero, SharedState::counts)
    }

    /// Shown history; empty before the first snapshot
    pub fn history(&self) -> &[HistoryEntry] {
        match self.state() {
            Some(state) => state.history().entries(),
            None => &[],
        }
    }

    /// History rows for a line chart
    pub fn chart_points(&self) -> Vec<ChartPoint> {
        self.state()
            .map(|state| state.history().chart_points())
            .unwrap_or_default()
    }

    /// Per-rank summary rows
    pub fn summaries(&self, low_stock_threshold: u32) -> Vec<RankSummary> {
        summarize(self.counts(), low_stock_threshold)
    }
}

/// One rank as presented next to its draw button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankSummary {
    /// Rank
    pub rank: Rank,
    /// Display label, e.g. `1等`
    pub label: String,
    /// Remaining count
    pub count: u32,
    /// Still available but running low
    pub low_stock: bool,
    /// Nothing left to draw
    pub exhausted: bool,
}

/// Summarize every rank of `counts`.
pub fn summarize(counts: CounterVector, low_stock_threshold: u32) -> Vec<RankSummary> {
    counts
        .iter()
        .map(|(rank, count)| RankSummary {
            rank,
            label: rank.label(),
            count,
            low_stock: count > 0 && count <= low_stock_threshold,
            exhausted: count == 0,
        })
        .collect()
}

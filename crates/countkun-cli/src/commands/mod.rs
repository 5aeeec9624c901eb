//! Command handlers
//!
//! Every command opens the file-backed store, subscribes, waits for the first
//! authoritative snapshot, and only then reads or mutates.

/// Inventory and history display
pub mod show;

/// Draw, reset and reseed
pub mod mutate;

/// In-process multi-client simulation
pub mod simulate;

use std::time::Duration;

use anyhow::{bail, Context};
use countkun_core::StoreError;
use countkun_effects::{FileDocumentStore, RealTimeHandler, SessionGate};
use countkun_sync::{SharedCounterStore, StoreView, Subscription, SyncPhase};

use crate::config::CliConfig;

/// How long to wait for the first snapshot before giving up
const SYNC_TIMEOUT: Duration = Duration::from_secs(10);

/// A synchronized store plus the subscription keeping it alive.
pub struct Session {
    pub store: SharedCounterStore,
    pub subscription: Subscription,
}

/// Open the configured store and wait until it is synchronized.
pub async fn open_session(config: &CliConfig) -> anyhow::Result<Session> {
    let Some(actor) = config.actor.clone() else {
        bail!("No signed-in actor: pass --actor or set `actor` in the config file");
    };

    let documents = FileDocumentStore::open(&config.store_path)
        .await
        .with_context(|| format!("Failed to open store at {}", config.store_path.display()))?;
    let store = SharedCounterStore::new(
        config.store.clone(),
        documents,
        RealTimeHandler::new(),
        SessionGate::signed_in(actor),
    )?;

    let mut subscription = store.subscribe();
    let view = tokio::time::timeout(
        SYNC_TIMEOUT,
        subscription.wait_for(|view| !view.loading()),
    )
    .await
    .context("Timed out waiting for the first snapshot")?;

    match view.map(|view| view.phase) {
        Some(SyncPhase::Synchronized) => Ok(Session {
            store,
            subscription,
        }),
        Some(SyncPhase::Disconnected { reason }) => bail!("Store is disconnected: {reason}"),
        _ => bail!("Store was torn down before it synchronized"),
    }
}

/// Turn a store error into a report, adding a hint for transient failures.
pub fn report(err: StoreError) -> anyhow::Error {
    if err.is_try_again() {
        anyhow::Error::new(err).context("Store is not available right now; try again")
    } else {
        anyhow::Error::new(err)
    }
}

/// Print the per-rank table for `view`.
pub fn print_inventory(view: &StoreView, low_stock_threshold: u32) {
    let version = view
        .version()
        .map_or_else(|| "-".to_string(), |version| version.to_string());
    println!("Phase:    {} ({version})", view.phase.name());
    println!();

    for row in view.summaries(low_stock_threshold) {
        let flag = if row.exhausted {
            "  exhausted"
        } else if row.low_stock {
            "  low"
        } else {
            ""
        };
        println!("  {:<4} {:>6}{flag}", row.label, row.count);
    }

    println!();
    println!("Total:    {}", view.counts().total());
    println!("History:  {} entries", view.history().len());
}

// Draw, reset and reseed commands

use anyhow::Context;
use countkun_core::{CounterVector, Rank, Version};
use tracing::info;

use super::{open_session, print_inventory, report, Session};
use crate::config::CliConfig;

/// Draw one prize of the one-based rank `number`
pub async fn draw(config: &CliConfig, number: usize) -> anyhow::Result<()> {
    let rank = Rank::from_number(number).map_err(report)?;
    let session = open_session(config).await?;
    let version = session.store.draw_one(rank).await.map_err(report)?;
    info!(%rank, %version, "Draw committed");
    println!("Drew one {rank}");
    finish(config, session, version).await
}

/// Zero every count and clear the history
pub async fn reset(config: &CliConfig) -> anyhow::Result<()> {
    let session = open_session(config).await?;
    let version = session.store.reset_all().await.map_err(report)?;
    println!("Inventory reset");
    finish(config, session, version).await
}

/// Start a new round from five form-style fields
pub async fn reseed(config: &CliConfig, fields: &[String]) -> anyhow::Result<()> {
    let initial = CounterVector::parse_inputs(fields).map_err(report)?;
    let session = open_session(config).await?;
    let version = session.store.reseed(initial).await.map_err(report)?;
    println!("New round started with {initial} ({} items)", initial.total());
    finish(config, session, version).await
}

/// Wait for the commit to come back through the link, then print it.
async fn finish(config: &CliConfig, mut session: Session, version: Version) -> anyhow::Result<()> {
    let view = session
        .subscription
        .wait_for(|view| view.version().is_some_and(|seen| seen >= version))
        .await
        .context("Store was torn down before the commit was observed")?;
    println!();
    print_inventory(&view, config.store.low_stock_threshold);
    Ok(())
}

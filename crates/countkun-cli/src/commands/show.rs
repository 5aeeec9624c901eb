// Inventory and history display

use countkun_core::ChartPoint;

use super::{open_session, print_inventory};
use crate::config::CliConfig;

/// Print the current inventory, as a table or as JSON
pub async fn show(config: &CliConfig, json: bool) -> anyhow::Result<()> {
    let session = open_session(config).await?;
    let view = session.store.view();

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_inventory(&view, config.store.low_stock_threshold);
    }
    Ok(())
}

/// Print the history as chart rows
pub async fn history(config: &CliConfig, json: bool) -> anyhow::Result<()> {
    let session = open_session(config).await?;
    let points = session.store.chart_points();

    if json {
        println!("{}", serde_json::to_string_pretty(&points)?);
        return Ok(());
    }

    if points.is_empty() {
        println!("No history yet");
        return Ok(());
    }

    println!("  time        1等   2等   3等   4等   5等");
    for point in &points {
        println!("  {}", format_row(point));
    }
    Ok(())
}

fn format_row(point: &ChartPoint) -> String {
    format!(
        "{}  {:>4}  {:>4}  {:>4}  {:>4}  {:>4}",
        point.time, point.p1, point.p2, point.p3, point.p4, point.p5
    )
}

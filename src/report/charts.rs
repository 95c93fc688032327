//! Chart export.
//!
//! Pixels are left to an external renderer. This module writes the
//! plot-ready series and, when configured, hands the output table to the
//! renderer command.

use crate::ingest::CleanedTable;
use crate::report::summary::{csv_escape, write_atomic};
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// Agent balances over time; legend order follows the schema.
pub const PERFORMANCE_SERIES: &str = "bots_performance.csv";

/// Best bid and ask over time.
pub const QUOTES_SERIES: &str = "bid_ask.csv";

/// Write both series files into `dir`, returning their paths.
pub fn write_chart_series(table: &CleanedTable, dir: &Path) -> Result<Vec<PathBuf>> {
    let performance = dir.join(PERFORMANCE_SERIES);
    write_atomic(&performance, render_performance(table).as_bytes())?;

    let quotes = dir.join(QUOTES_SERIES);
    write_atomic(&quotes, render_quotes(table).as_bytes())?;

    debug!("Wrote chart series to {}", dir.display());
    Ok(vec![performance, quotes])
}

fn render_performance(table: &CleanedTable) -> String {
    let mut out = String::from("time");
    for (agent, _) in &table.agents {
        out.push(',');
        out.push_str(&csv_escape(agent));
    }
    out.push('\n');

    for row in 0..table.rows() {
        out.push_str(&table.time[row].to_string());
        for (_, values) in &table.agents {
            out.push(',');
            out.push_str(&values[row].to_string());
        }
        out.push('\n');
    }
    out
}

fn render_quotes(table: &CleanedTable) -> String {
    let mut out = String::from("time,bid,ask\n");
    for row in 0..table.rows() {
        out.push_str(&format!(
            "{},{},{}\n",
            table.time[row], table.bid[row], table.ask[row]
        ));
    }
    out
}

/// Run the external renderer with `table_path` appended, waiting for it to
/// exit.
pub async fn run_chart_command(command: &[String], table_path: &Path, cwd: &Path) -> Result<()> {
    let Some((program, args)) = command.split_first() else {
        bail!("chart command is empty");
    };

    info!("Running chart command: {} {:?}", program, args);
    let status = Command::new(program)
        .args(args)
        .arg(table_path)
        .current_dir(cwd)
        .status()
        .await
        .with_context(|| format!("Failed to start chart command `{}`", program))?;

    if !status.success() {
        bail!("chart command `{}` exited with {}", program, status);
    }
    Ok(())
}

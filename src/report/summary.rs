//! Agent statistics summary CSV.
//!
//! Layout: one column per agent, one row per statistic, with the statistic
//! label in the first column.
//!
//! ```text
//! ,GVWY,ZIP
//! count,3,3
//! mean,20,12.5
//! ...
//! ```

use crate::ingest::stats::STAT_LABELS;
use crate::ingest::table::RawTable;
use crate::ingest::AgentStats;
use anyhow::{bail, Context, Result};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Statistics for several agents as read back from a summary file.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryTable {
    /// Agent names in column order.
    pub agents: Vec<String>,
    /// `values[stat][agent]`, stats in [`STAT_LABELS`] order.
    pub values: Vec<Vec<f64>>,
}

impl SummaryTable {
    /// Value of `label` for `agent`.
    pub fn value(&self, agent: &str, label: &str) -> Option<f64> {
        let a = self.agents.iter().position(|name| name == agent)?;
        let s = STAT_LABELS.iter().position(|l| *l == label)?;
        self.values.get(s).and_then(|row| row.get(a)).copied()
    }
}

/// Render statistics as summary CSV text.
pub fn render_summary_csv(stats: &AgentStats) -> String {
    let mut output = String::new();

    let header: Vec<String> = stats.iter().map(|(name, _)| csv_escape(name)).collect();
    output.push(',');
    output.push_str(&header.join(","));
    output.push('\n');

    let rows: Vec<[f64; 8]> = stats.iter().map(|(_, s)| s.as_row()).collect();
    for (i, label) in STAT_LABELS.iter().enumerate() {
        output.push_str(label);
        for row in &rows {
            output.push(',');
            output.push_str(&format_value(row[i]));
        }
        output.push('\n');
    }

    output
}

/// Write the summary CSV, creating parent directories.
pub fn write_summary_csv(stats: &AgentStats, path: &Path) -> Result<()> {
    write_atomic(path, render_summary_csv(stats).as_bytes())
}

/// Read a summary CSV written by [`write_summary_csv`].
pub fn read_summary_csv(path: &Path) -> Result<SummaryTable> {
    let table = RawTable::load(path)?;
    parse_summary(&table).with_context(|| format!("Invalid summary file: {}", path.display()))
}

fn parse_summary(table: &RawTable) -> Result<SummaryTable> {
    if table.row_count() == 0 {
        bail!("summary is empty");
    }

    let agents: Vec<String> = (1..table.column_count())
        .map(|col| table.cell(0, col).unwrap_or("").trim().to_string())
        .collect();

    let mut values = Vec::with_capacity(STAT_LABELS.len());
    for label in STAT_LABELS {
        let row = (1..table.row_count())
            .find(|&r| table.cell(r, 0).map(str::trim) == Some(label))
            .with_context(|| format!("missing '{}' row", label))?;

        let parsed = (1..=agents.len())
            .map(|col| {
                let cell = table.cell(row, col).unwrap_or("").trim();
                match cell {
                    "" | "NaN" | "nan" => Ok(f64::NAN),
                    _ => cell
                        .parse::<f64>()
                        .with_context(|| format!("bad '{}' value: {}", label, cell)),
                }
            })
            .collect::<Result<Vec<f64>>>()?;
        values.push(parsed);
    }

    Ok(SummaryTable { agents, values })
}

fn format_value(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else {
        v.to_string()
    }
}

pub(crate) fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Write `bytes` to `path` through a temp file in the same directory.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create directory {}", parent.display()))?;

    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
    tmp.write_all(bytes)?;
    tmp.persist(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

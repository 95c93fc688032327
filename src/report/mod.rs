//! Report generation and export.

pub mod charts;
pub mod generator;
pub mod summary;

pub use generator::{generate_comparison_markdown, generate_json_report, generate_markdown_report};

use crate::ingest::Ingested;
use crate::models::{ReportMetadata, RunId, RunReport};
use chrono::Utc;
use std::path::Path;

/// Assemble a report from an ingested table.
pub fn build_report(source: &Path, run: Option<RunId>, ingested: &Ingested) -> RunReport {
    RunReport {
        metadata: ReportMetadata {
            source: source.display().to_string(),
            generated_at: Utc::now(),
            run,
            rows: ingested.rows,
            columns: ingested.columns,
        },
        agents: ingested.schema.agents().to_vec(),
        stats: ingested.aggregation.stats.clone(),
        warnings: ingested.warnings.clone(),
        coercion_loss: ingested.aggregation.coercion_loss.clone(),
    }
}

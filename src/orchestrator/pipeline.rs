//! Post-processing chain run after a clean simulator exit:
//! discovery, then ingestion, then export. Each stage is awaited before the
//! next starts; a failed stage stops the chain and is reported as a
//! `StageFailed` event.

use crate::error::{IngestError, RunError};
use crate::ingest::{ingest_file, Ingested};
use crate::models::{RunEvent, RunId, Stage};
use crate::orchestrator::observer::RunObserver;
use crate::report::{self, charts, summary};
use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Where the pipeline reads from and writes to.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub working_dir: PathBuf,
    /// Output table file-name suffix.
    pub suffix: String,
    pub summary_path: PathBuf,
    pub report_path: PathBuf,
    pub charts_dir: PathBuf,
    /// External chart renderer; empty disables it.
    pub chart_command: Vec<String>,
}

impl PipelineOptions {
    /// `path` relative to the working directory, unless absolute.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        }
    }
}

/// Output tables found in a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub chosen: PathBuf,
    pub candidates: usize,
}

/// Find files in `dir` (not its subdirectories) whose name ends with
/// `suffix`. With several matches the first in file-name order wins.
pub fn discover_output(dir: &Path, suffix: &str) -> Result<Discovery, RunError> {
    let matches: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(suffix))
        .map(|entry| entry.into_path())
        .collect();

    match matches.first() {
        Some(chosen) => Ok(Discovery {
            chosen: chosen.clone(),
            candidates: matches.len(),
        }),
        None => Err(RunError::OutputNotFound {
            dir: dir.to_path_buf(),
            pattern: suffix.to_string(),
        }),
    }
}

struct Reporter<'a> {
    run: RunId,
    observer: &'a dyn RunObserver,
}

impl Reporter<'_> {
    fn started(&self, stage: Stage) {
        debug!("[{}] {} started", self.run, stage);
        self.observer.notify(RunEvent::StageStarted {
            run: self.run,
            stage,
        });
    }

    fn completed(&self, stage: Stage, detail: String) {
        info!("[{}] {} completed: {}", self.run, stage, detail);
        self.observer.notify(RunEvent::StageCompleted {
            run: self.run,
            stage,
            detail,
        });
    }

    fn failed(&self, stage: Stage, message: String) {
        warn!("[{}] {} failed: {}", self.run, stage, message);
        self.observer.notify(RunEvent::StageFailed {
            run: self.run,
            stage,
            message,
        });
    }

    fn warning(&self, stage: Stage, message: String) {
        warn!("[{}] {}: {}", self.run, stage, message);
        self.observer.notify(RunEvent::Warning {
            run: self.run,
            stage,
            message,
        });
    }
}

/// Run discovery (in `search_dir`), ingestion and export for `run`.
pub(crate) async fn run_pipeline(
    run: RunId,
    observer: &dyn RunObserver,
    options: &PipelineOptions,
    search_dir: &Path,
) {
    let reporter = Reporter { run, observer };

    reporter.started(Stage::Discovery);
    let discovery = match discover_output(search_dir, &options.suffix) {
        Ok(d) => d,
        Err(e) => return reporter.failed(Stage::Discovery, e.to_string()),
    };
    if discovery.candidates > 1 {
        reporter.warning(
            Stage::Discovery,
            format!(
                "{} files match '*{}', using {}",
                discovery.candidates,
                options.suffix,
                discovery.chosen.display()
            ),
        );
    }
    reporter.completed(Stage::Discovery, discovery.chosen.display().to_string());

    reporter.started(Stage::Ingestion);
    let ingested = match ingest(&reporter, discovery.chosen.clone()).await {
        Ok(i) => i,
        Err(e) => return reporter.failed(Stage::Ingestion, e.to_string()),
    };
    let loss = &ingested.aggregation.coercion_loss;
    reporter.completed(
        Stage::Ingestion,
        format!(
            "{} agent(s), {} row(s), {} cell(s) coerced to zero",
            ingested.schema.len(),
            ingested.rows,
            loss.total
        ),
    );

    reporter.started(Stage::Export);
    match export(run, options, &discovery.chosen, &ingested).await {
        Ok(summary_path) => reporter.completed(
            Stage::Export,
            format!("summary written to {}", summary_path.display()),
        ),
        Err(e) => reporter.failed(Stage::Export, format!("{:#}", e)),
    }
}

/// Load and aggregate the table off the async runtime, then forward schema
/// warnings and coercion loss as `Warning` events.
async fn ingest(reporter: &Reporter<'_>, path: PathBuf) -> Result<Ingested, IngestError> {
    let ingested = tokio::task::spawn_blocking(move || ingest_file(&path))
        .await
        .map_err(|e| IngestError::MalformedTable(format!("table loader panicked: {}", e)))??;

    for warning in &ingested.warnings {
        reporter.warning(Stage::Ingestion, warning.to_string());
    }

    let loss = &ingested.aggregation.coercion_loss;
    if loss.total > 0 {
        let columns: Vec<String> = loss
            .by_column
            .iter()
            .map(|(column, count)| format!("{}: {}", column, count))
            .collect();
        reporter.warning(
            Stage::Ingestion,
            format!(
                "{} non-numeric cell(s) replaced with zero ({})",
                loss.total,
                columns.join(", ")
            ),
        );
    }

    Ok(ingested)
}

async fn export(
    run: RunId,
    options: &PipelineOptions,
    table_path: &Path,
    ingested: &Ingested,
) -> anyhow::Result<PathBuf> {
    let summary_path = options.resolve(&options.summary_path);
    summary::write_summary_csv(&ingested.aggregation.stats, &summary_path)
        .context("Failed to export agent statistics")?;

    charts::write_chart_series(&ingested.aggregation.table, &options.resolve(&options.charts_dir))
        .context("Failed to export chart series")?;

    let report = report::build_report(table_path, Some(run), ingested);
    let report_path = options.resolve(&options.report_path);
    summary::write_atomic(&report_path, report::generate_markdown_report(&report).as_bytes())
        .context("Failed to write run report")?;

    if !options.chart_command.is_empty() {
        charts::run_chart_command(&options.chart_command, table_path, &options.working_dir).await?;
    }

    Ok(summary_path)
}

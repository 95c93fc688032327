//! Error types for the orchestrator and the ingestion pipeline.
//!
//! Stage errors never change a run's terminal status; they are surfaced to
//! the observer as `StageFailed` events carrying the `Display` text below.

use std::path::PathBuf;
use thiserror::Error;

use crate::models::RunId;

/// Errors returned by [`crate::orchestrator::RunOrchestrator`].
#[derive(Debug, Error)]
pub enum RunError {
    /// A run is already active; the existing run is left untouched.
    #[error("run {active} is still active")]
    AlreadyRunning { active: RunId },

    /// The simulator process could not be started.
    #[error("failed to spawn simulator `{program}`: {source}")]
    SpawnFailure {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The simulator configuration artifact could not be written.
    #[error("failed to write simulator config {}: {message}", path.display())]
    ConfigPersist { path: PathBuf, message: String },

    /// No output table was found after the simulator exited.
    #[error("no '*{pattern}' file found in {}", dir.display())]
    OutputNotFound { dir: PathBuf, pattern: String },
}

/// Errors raised while loading, inferring or aggregating an output table.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The table is structurally unusable.
    #[error("malformed table: {0}")]
    MalformedTable(String),

    /// Schema inference found no usable agent blocks.
    #[error("no agent columns identified, nothing to aggregate")]
    EmptySchema,
}

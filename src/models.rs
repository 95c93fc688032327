//! Data models shared by the orchestrator, the ingestion pipeline and the
//! report generators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ingest::{AgentStats, CoercionLoss, SchemaWarning};

/// Identifier of one `start` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(pub u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{:04}", self.0)
    }
}

/// Lifecycle status of a run.
///
/// `Idle` is only ever reported by the orchestrator when no run exists;
/// a handle starts in `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    Running,
    Completed,
    Canceled,
    Failed,
}

impl RunStatus {
    /// Terminal states are absorbing until the next `start`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Canceled | RunStatus::Failed
        )
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            RunStatus::Idle => "💤",
            RunStatus::Running => "🏃",
            RunStatus::Completed => "✅",
            RunStatus::Canceled => "🛑",
            RunStatus::Failed => "❌",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Idle => write!(f, "Idle"),
            RunStatus::Running => write!(f, "Running"),
            RunStatus::Completed => write!(f, "Completed"),
            RunStatus::Canceled => write!(f, "Canceled"),
            RunStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// Post-processing stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// The simulator process itself (spawn and exit).
    Simulation,
    /// Locating the output table.
    Discovery,
    /// Schema inference, cleaning and statistics.
    Ingestion,
    /// Summary export, chart series and the optional chart command.
    Export,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Simulation => write!(f, "simulation"),
            Stage::Discovery => write!(f, "discovery"),
            Stage::Ingestion => write!(f, "ingestion"),
            Stage::Export => write!(f, "export"),
        }
    }
}

/// A notification delivered to a [`crate::orchestrator::observer::RunObserver`].
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    StateChanged {
        run: RunId,
        status: RunStatus,
        /// Exit code of the simulator, attached to `Completed` only.
        exit_code: Option<i32>,
    },
    StageStarted {
        run: RunId,
        stage: Stage,
    },
    StageCompleted {
        run: RunId,
        stage: Stage,
        detail: String,
    },
    StageFailed {
        run: RunId,
        stage: Stage,
        message: String,
    },
    Warning {
        run: RunId,
        stage: Stage,
        message: String,
    },
    /// The run's pipeline is over; no further events follow for `run`.
    Finished {
        run: RunId,
    },
}

impl RunEvent {
    pub fn run(&self) -> RunId {
        match self {
            RunEvent::StateChanged { run, .. }
            | RunEvent::StageStarted { run, .. }
            | RunEvent::StageCompleted { run, .. }
            | RunEvent::StageFailed { run, .. }
            | RunEvent::Warning { run, .. }
            | RunEvent::Finished { run } => *run,
        }
    }
}

/// Metadata about an ingested output table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Path of the ingested CSV.
    pub source: String,
    /// Date and time the report was produced.
    pub generated_at: DateTime<Utc>,
    /// Run that produced the table, if it came from an orchestrated run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<RunId>,
    pub rows: usize,
    pub columns: usize,
}

/// The complete ingestion report.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub metadata: ReportMetadata,
    /// Agent identifiers in block order.
    pub agents: Vec<String>,
    pub stats: AgentStats,
    pub warnings: Vec<SchemaWarning>,
    pub coercion_loss: CoercionLoss,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!RunStatus::Idle.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Canceled.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }

    #[test]
    fn test_run_id_display() {
        assert_eq!(RunId(7).to_string(), "run-0007");
    }

    #[test]
    fn test_event_run_accessor() {
        let event = RunEvent::StageFailed {
            run: RunId(3),
            stage: Stage::Discovery,
            message: "missing".to_string(),
        };
        assert_eq!(event.run(), RunId(3));
        assert_eq!(Stage::Discovery.to_string(), "discovery");
    }
}

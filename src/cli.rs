//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// bse-runner - launch and summarize Bristol Stock Exchange simulations
///
/// Writes the simulator configuration, runs the simulator, and turns its
/// average-balance output into per-agent statistics, chart series and a
/// report.
///
/// Examples:
///   bse-runner run
///   bse-runner run --settings experiments/zip_vs_zic.json
///   bse-runner analyze bse_d001_i10_0001_avg_balance.csv --format json
///   bse-runner compare run1/agent_stats_summary.csv run2/agent_stats_summary.csv
///   bse-runner settings init
///   bse-runner init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    ///
    /// If not specified, looks for .bserunner.toml in the current directory
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Simulation settings document (JSON)
    ///
    /// Defaults to the `general.settings` entry of the config file.
    #[arg(short, long, global = true, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Interpreter used to run the simulator
    #[arg(long, global = true, value_name = "PROGRAM", env = "BSE_INTERPRETER")]
    pub interpreter: Option<String>,

    /// Simulator entry script
    #[arg(long, global = true, value_name = "FILE", env = "BSE_ENTRY")]
    pub entry: Option<String>,

    /// Directory the simulator runs in
    #[arg(long, global = true, value_name = "DIR")]
    pub working_dir: Option<PathBuf>,

    /// External chart command (comma-separated); the output table path is
    /// appended
    ///
    /// Example: --chart-command python3,processResults.py
    #[arg(long, global = true, value_name = "CMD", value_delimiter = ',')]
    pub chart_command: Option<Vec<String>>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the simulator and post-process its output
    Run,

    /// Summarize an existing average-balance table
    Analyze {
        /// Average-balance CSV written by the simulator
        #[arg(value_name = "CSV")]
        csv: PathBuf,

        /// Output format (markdown, json)
        #[arg(long, default_value = "markdown", value_name = "FORMAT")]
        format: OutputFormat,

        /// Write the report here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Also export the statistics summary CSV
        #[arg(long, value_name = "FILE")]
        summary: Option<PathBuf>,
    },

    /// Compare exported summaries across runs
    Compare {
        /// Summary CSVs, one per run
        #[arg(value_name = "SUMMARY", required = true, num_args = 1..)]
        summaries: Vec<PathBuf>,

        /// Write the comparison here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Manage the simulation settings document
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Generate a default .bserunner.toml configuration file
    InitConfig,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum SettingsAction {
    /// Write the default settings document
    Init {
        /// Overwrite an existing document
        #[arg(long)]
        force: bool,
    },
    /// Print the settings and the generated simulator config
    Show,
    /// Check the settings describe a runnable simulation
    Validate,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref dir) = self.working_dir {
            if !dir.is_dir() {
                return Err(format!(
                    "Working directory does not exist: {}",
                    dir.display()
                ));
            }
        }

        if let Some(ref command) = self.chart_command {
            if command.iter().all(|part| part.trim().is_empty()) {
                return Err("Chart command cannot be empty".to_string());
            }
        }

        match &self.command {
            Command::Analyze { csv, .. } if !csv.is_file() => {
                Err(format!("Table not found: {}", csv.display()))
            }
            Command::Compare { summaries, .. } => {
                match summaries.iter().find(|path| !path.is_file()) {
                    Some(missing) => Err(format!("Summary not found: {}", missing.display())),
                    None => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

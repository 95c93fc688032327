//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.bserunner.toml` files.

use anyhow::{Context, Result};
use crate::orchestrator::PipelineOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".bserunner.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Simulator invocation.
    #[serde(default)]
    pub simulator: SimulatorConfig,

    /// Output discovery and export locations.
    #[serde(default)]
    pub output: OutputConfig,

    /// Chart generation.
    #[serde(default)]
    pub charts: ChartsConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Settings document used by `run` when `--settings` is not given.
    #[serde(default = "default_settings")]
    pub settings: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            settings: default_settings(),
            verbose: false,
        }
    }
}

fn default_settings() -> String {
    "bse_settings.json".to_string()
}

/// How the simulator is launched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Interpreter executable.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Simulator entry script, passed as the interpreter's only argument.
    #[serde(default = "default_entry")]
    pub entry: String,

    /// Directory the simulator runs in and writes its output to.
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,

    /// Generated configuration module, relative to `working_dir`.
    #[serde(default = "default_config_file")]
    pub config_file: String,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            entry: default_entry(),
            working_dir: default_working_dir(),
            config_file: default_config_file(),
        }
    }
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_entry() -> String {
    "BSE.py".to_string()
}

fn default_working_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_config_file() -> String {
    "bse_config.py".to_string()
}

/// Output discovery and export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// File-name suffix identifying the average-balance table.
    #[serde(default = "default_suffix")]
    pub suffix: String,

    /// Summary CSV, relative to the working directory.
    #[serde(default = "default_summary_path")]
    pub summary_path: String,

    /// Markdown run report, relative to the working directory.
    #[serde(default = "default_report_path")]
    pub report_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            suffix: default_suffix(),
            summary_path: default_summary_path(),
            report_path: default_report_path(),
        }
    }
}

fn default_suffix() -> String {
    "_avg_balance.csv".to_string()
}

fn default_summary_path() -> String {
    "output/raw/agent_stats_summary.csv".to_string()
}

fn default_report_path() -> String {
    "output/run_report.md".to_string()
}

/// Chart settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartsConfig {
    /// Directory for plot-ready series, relative to the working directory.
    #[serde(default = "default_charts_dir")]
    pub dir: String,

    /// External renderer; the output table path is appended as the last
    /// argument. Empty disables it.
    #[serde(default)]
    pub command: Vec<String>,
}

impl Default for ChartsConfig {
    fn default() -> Self {
        Self {
            dir: default_charts_dir(),
            command: Vec::new(),
        }
    }
}

fn default_charts_dir() -> String {
    "graphs".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref interpreter) = args.interpreter {
            self.simulator.interpreter = interpreter.clone();
        }
        if let Some(ref entry) = args.entry {
            self.simulator.entry = entry.clone();
        }
        if let Some(ref dir) = args.working_dir {
            self.simulator.working_dir = dir.clone();
        }
        if let Some(ref command) = args.chart_command {
            self.charts.command = command.clone();
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Pipeline locations, resolved against the simulator working directory.
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            working_dir: self.simulator.working_dir.clone(),
            suffix: self.output.suffix.clone(),
            summary_path: PathBuf::from(&self.output.summary_path),
            report_path: PathBuf::from(&self.output.report_path),
            charts_dir: PathBuf::from(&self.charts.dir),
            chart_command: self.charts.command.clone(),
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.simulator.interpreter, "python3");
        assert_eq!(config.simulator.entry, "BSE.py");
        assert_eq!(config.output.suffix, "_avg_balance.csv");
        assert_eq!(
            config.output.summary_path,
            "output/raw/agent_stats_summary.csv"
        );
        assert!(config.charts.command.is_empty());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[simulator]
interpreter = "/usr/bin/python3.11"
working_dir = "sim"

[charts]
command = ["python3", "processResults.py"]
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.simulator.interpreter, "/usr/bin/python3.11");
        assert_eq!(config.simulator.entry, "BSE.py");
        assert_eq!(config.simulator.working_dir, PathBuf::from("sim"));
        assert_eq!(config.charts.command, vec!["python3", "processResults.py"]);
        assert_eq!(config.charts.dir, "graphs");
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[simulator]"));
        assert!(toml_str.contains("[output]"));
        assert!(toml_str.contains("[charts]"));
    }

    #[test]
    fn test_merge_with_args() {
        use crate::cli::Args;
        use clap::Parser;

        let args = Args::try_parse_from([
            "bse-runner",
            "run",
            "--entry",
            "BSE2.py",
            "--working-dir",
            "sim",
            "--chart-command",
            "python3,plot.py",
        ])
        .unwrap();

        let mut config = Config::default();
        config.merge_with_args(&args);
        assert_eq!(config.simulator.entry, "BSE2.py");
        assert_eq!(config.simulator.working_dir, PathBuf::from("sim"));
        assert_eq!(config.charts.command, vec!["python3", "plot.py"]);
        assert!(!config.general.verbose);

        let options = config.pipeline_options();
        assert_eq!(options.working_dir, PathBuf::from("sim"));
        assert_eq!(
            options.resolve(Path::new("graphs")),
            PathBuf::from("sim/graphs")
        );
    }
}

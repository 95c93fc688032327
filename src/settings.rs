//! Simulation settings (`RunConfig`) persistence.
//!
//! Settings are stored as a flat JSON document and handed to the simulator
//! as a generated `bse_config.py` module.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::report::summary::write_atomic;

/// Trader types the simulator understands.
pub const TRADER_TYPES: [&str; 6] = ["GVWY", "SHVR", "ZIC", "ZIP", "PRZI", "SNPR"];

/// One trader population entry: `(type tag, count)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraderSpec(pub String, pub u32);

impl TraderSpec {
    pub fn new(kind: &str, count: u32) -> Self {
        Self(kind.to_string(), count)
    }

    pub fn kind(&self) -> &str {
        &self.0
    }

    pub fn count(&self) -> u32 {
        self.1
    }
}

/// Named output dumps the simulator can produce.
///
/// Missing keys in a loaded document fall back to the per-field defaults
/// below, which differ from [`DumpFlags::default`] (the fresh-settings
/// defaults).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpFlags {
    #[serde(default = "default_true")]
    pub dump_blotters: bool,
    #[serde(default)]
    pub dump_lobs: bool,
    #[serde(default = "default_true")]
    pub dump_strats: bool,
    #[serde(default = "default_true")]
    pub dump_avgbals: bool,
    #[serde(default = "default_true")]
    pub dump_tape: bool,
}

impl Default for DumpFlags {
    fn default() -> Self {
        Self {
            dump_blotters: false,
            dump_lobs: false,
            dump_strats: false,
            dump_avgbals: true,
            dump_tape: false,
        }
    }
}

impl DumpFlags {
    fn loaded_default() -> Self {
        Self {
            dump_blotters: true,
            dump_lobs: false,
            dump_strats: true,
            dump_avgbals: true,
            dump_tape: true,
        }
    }

    fn entries(&self) -> [(&'static str, bool); 5] {
        [
            ("dump_blotters", self.dump_blotters),
            ("dump_lobs", self.dump_lobs),
            ("dump_strats", self.dump_strats),
            ("dump_avgbals", self.dump_avgbals),
            ("dump_tape", self.dump_tape),
        ]
    }
}

fn default_true() -> bool {
    true
}

/// One simulation invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Simulated duration in days.
    #[serde(default = "default_n_days")]
    pub n_days: f64,

    #[serde(default = "default_hours")]
    pub hours_in_a_day: f64,

    #[serde(default = "default_one")]
    pub n_trials: u32,

    #[serde(default = "default_one")]
    pub n_trials_recorded: u32,

    #[serde(default)]
    pub verbose: bool,

    #[serde(default)]
    pub buyers_spec: Vec<TraderSpec>,

    #[serde(default)]
    pub sellers_spec: Vec<TraderSpec>,

    /// Sellers mirror the buyer population.
    #[serde(default = "default_true")]
    pub same_traders: bool,

    #[serde(default = "DumpFlags::loaded_default")]
    pub dump_flags: DumpFlags,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

fn default_n_days() -> f64 {
    0.01
}

fn default_hours() -> f64 {
    24.0
}

fn default_one() -> u32 {
    1
}

impl Default for RunConfig {
    fn default() -> Self {
        let buyers = vec![
            TraderSpec::new("SHVR", 5),
            TraderSpec::new("GVWY", 5),
            TraderSpec::new("ZIC", 2),
            TraderSpec::new("ZIP", 13),
        ];
        Self {
            n_days: default_n_days(),
            hours_in_a_day: default_hours(),
            n_trials: 1,
            n_trials_recorded: 1,
            verbose: false,
            sellers_spec: buyers.clone(),
            buyers_spec: buyers,
            same_traders: true,
            dump_flags: DumpFlags::default(),
            output_dir: None,
        }
    }
}

impl RunConfig {
    /// Load settings from a JSON document.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))
    }

    /// Save settings as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        write_atomic(path, json.as_bytes())
    }

    /// Drop trader entries with a blank type or a zero count.
    pub fn normalized(&self) -> Self {
        let keep = |specs: &[TraderSpec]| -> Vec<TraderSpec> {
            specs
                .iter()
                .filter(|s| !s.kind().trim().is_empty() && s.count() > 0)
                .map(|s| TraderSpec::new(s.kind().trim(), s.count()))
                .collect()
        };
        Self {
            buyers_spec: keep(&self.buyers_spec),
            sellers_spec: keep(&self.sellers_spec),
            ..self.clone()
        }
    }

    /// Seller population actually handed to the simulator.
    pub fn effective_sellers(&self) -> &[TraderSpec] {
        if self.same_traders {
            &self.buyers_spec
        } else {
            &self.sellers_spec
        }
    }

    /// Check the settings describe a runnable simulation.
    pub fn validate(&self) -> Result<()> {
        if !(self.n_days > 0.0) {
            bail!("n_days must be positive, got {}", self.n_days);
        }
        if !(self.hours_in_a_day > 0.0 && self.hours_in_a_day <= 24.0) {
            bail!(
                "hours_in_a_day must be in (0, 24], got {}",
                self.hours_in_a_day
            );
        }
        if self.n_trials == 0 {
            bail!("n_trials must be at least 1");
        }
        if self.n_trials_recorded > self.n_trials {
            bail!(
                "n_trials_recorded ({}) cannot exceed n_trials ({})",
                self.n_trials_recorded,
                self.n_trials
            );
        }
        if self.buyers_spec.is_empty() {
            bail!("at least one buyer population is required");
        }
        if self.effective_sellers().is_empty() {
            bail!("at least one seller population is required");
        }
        for spec in self.buyers_spec.iter().chain(self.effective_sellers()) {
            if !is_type_tag(spec.kind()) {
                bail!(
                    "trader type {:?} must contain only letters, digits and '_'",
                    spec.kind()
                );
            }
            if !TRADER_TYPES.contains(&spec.kind()) {
                warn!("Unknown trader type '{}', passing it through", spec.kind());
            }
        }
        Ok(())
    }

    /// Render the `bse_config.py` module read by the simulator.
    pub fn render_simulator_config(&self) -> String {
        let mut out = String::new();
        out.push_str("# BSE Configuration File - Generated by bse-runner\n\n");

        let _ = writeln!(out, "n_days = {:?}", self.n_days);
        let _ = writeln!(out, "hours_in_a_day = {:?}\n", self.hours_in_a_day);

        out.push_str("# Trader specifications\n");
        let _ = writeln!(out, "buyers_spec = {}", py_spec_list(&self.buyers_spec));
        if self.same_traders {
            out.push_str("sellers_spec = buyers_spec\n\n");
        } else {
            let _ = writeln!(out, "sellers_spec = {}\n", py_spec_list(&self.sellers_spec));
        }

        out.push_str("# Output settings\n");
        let _ = writeln!(out, "n_trials = {}", self.n_trials);
        let _ = writeln!(out, "n_trials_recorded = {}", self.n_trials_recorded);
        let flags: Vec<String> = self
            .dump_flags
            .entries()
            .iter()
            .map(|(name, on)| format!("'{}': {}", name, if *on { "True" } else { "False" }))
            .collect();
        let _ = writeln!(out, "dump_flags = {{{}}}", flags.join(", "));

        out
    }

    /// Write `bse_config.py` to `path`.
    pub fn write_simulator_config(&self, path: &Path) -> Result<()> {
        write_atomic(path, self.render_simulator_config().as_bytes())
    }
}

fn is_type_tag(kind: &str) -> bool {
    !kind.is_empty() && kind.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn py_spec_list(specs: &[TraderSpec]) -> String {
    let items: Vec<String> = specs
        .iter()
        .map(|s| format!("({}, {})", py_str(s.kind()), s.count()))
        .collect();
    format!("[{}]", items.join(", "))
}

/// Single-quoted Python string literal.
fn py_str(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.n_days, 0.01);
        assert_eq!(config.hours_in_a_day, 24.0);
        assert_eq!(config.buyers_spec.len(), 4);
        assert_eq!(config.buyers_spec[3], TraderSpec::new("ZIP", 13));
        assert!(config.same_traders);
        assert!(config.dump_flags.dump_avgbals);
        assert!(!config.dump_flags.dump_tape);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");

        let config = RunConfig {
            n_days: 2.5,
            hours_in_a_day: 8.5,
            n_trials: 10,
            n_trials_recorded: 3,
            verbose: true,
            buyers_spec: vec![TraderSpec::new("PRZI", 7)],
            sellers_spec: vec![TraderSpec::new("SNPR", 1), TraderSpec::new("ZIC", 4)],
            same_traders: false,
            dump_flags: DumpFlags {
                dump_blotters: true,
                dump_lobs: true,
                dump_strats: false,
                dump_avgbals: false,
                dump_tape: true,
            },
            output_dir: Some(PathBuf::from("runs/out")),
        };
        config.save(&path).unwrap();
        assert_eq!(RunConfig::load(&path).unwrap(), config);

        let defaults = RunConfig::default();
        defaults.save(&path).unwrap();
        assert_eq!(RunConfig::load(&path).unwrap(), defaults);
    }

    #[test]
    fn test_missing_keys_use_loader_defaults() {
        let config: RunConfig = serde_json::from_str(r#"{"n_trials": 5}"#).unwrap();
        assert_eq!(config.n_trials, 5);
        assert_eq!(config.n_days, 0.01);
        assert!(config.buyers_spec.is_empty());
        assert!(config.dump_flags.dump_blotters);
        assert!(!config.dump_flags.dump_lobs);
        assert!(config.dump_flags.dump_tape);

        let partial: RunConfig =
            serde_json::from_str(r#"{"dump_flags": {"dump_lobs": true}}"#).unwrap();
        assert!(partial.dump_flags.dump_lobs);
        assert!(partial.dump_flags.dump_strats);
    }

    #[test]
    fn test_trader_spec_is_a_pair() {
        let json = serde_json::to_string(&TraderSpec::new("ZIP", 13)).unwrap();
        assert_eq!(json, r#"["ZIP",13]"#);
    }

    #[test]
    fn test_normalized_drops_empty_entries() {
        let config = RunConfig {
            buyers_spec: vec![
                TraderSpec::new("ZIP", 3),
                TraderSpec::new("", 4),
                TraderSpec::new("GVWY", 0),
            ],
            ..RunConfig::default()
        };
        assert_eq!(config.normalized().buyers_spec, vec![TraderSpec::new("ZIP", 3)]);
    }

    #[test]
    fn test_validation() {
        let mut config = RunConfig::default();
        config.n_trials_recorded = 2;
        assert!(config.validate().is_err());

        let mut config = RunConfig::default();
        config.hours_in_a_day = 25.0;
        assert!(config.validate().is_err());

        let mut config = RunConfig::default();
        config.same_traders = false;
        config.sellers_spec.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_simulator_config_text() {
        let config = RunConfig {
            buyers_spec: vec![TraderSpec::new("ZIP", 2), TraderSpec::new("GVWY", 1)],
            ..RunConfig::default()
        };
        let text = config.render_simulator_config();

        assert!(text.contains("n_days = 0.01\n"));
        assert!(text.contains("hours_in_a_day = 24.0\n"));
        assert!(text.contains("buyers_spec = [('ZIP', 2), ('GVWY', 1)]\n"));
        assert!(text.contains("sellers_spec = buyers_spec\n"));
        assert!(text.contains("n_trials = 1\n"));
        assert!(text.contains(
            "dump_flags = {'dump_blotters': False, 'dump_lobs': False, 'dump_strats': False, 'dump_avgbals': True, 'dump_tape': False}\n"
        ));
    }

    #[test]
    fn test_type_tags_are_quoted_safely() {
        let config = RunConfig {
            buyers_spec: vec![
                TraderSpec::new("ZI\\", 1),
                TraderSpec::new("O'K", 2),
                TraderSpec::new("A\nB", 3),
            ],
            ..RunConfig::default()
        };
        let text = config.render_simulator_config();
        assert!(text.contains(r"buyers_spec = [('ZI\\', 1), ('O\'K', 2), ('A\nB', 3)]"));
        assert_eq!(text.lines().filter(|l| l.starts_with("buyers_spec")).count(), 1);
    }

    #[test]
    fn test_validate_rejects_unsafe_type_tags() {
        for kind in ["ZI\\", "O'K", "A\nB", "Z P"] {
            let config = RunConfig {
                buyers_spec: vec![TraderSpec::new(kind, 1)],
                ..RunConfig::default()
            };
            assert!(config.validate().is_err(), "accepted {:?}", kind);
        }

        let custom = RunConfig {
            buyers_spec: vec![TraderSpec::new("MY_TRADER2", 1)],
            ..RunConfig::default()
        };
        assert!(custom.validate().is_ok());
    }

    #[test]
    fn test_simulator_config_separate_sellers() {
        let config = RunConfig {
            same_traders: false,
            sellers_spec: vec![TraderSpec::new("SHVR", 4)],
            ..RunConfig::default()
        };
        let text = config.render_simulator_config();
        assert!(text.contains("sellers_spec = [('SHVR', 4)]\n"));
    }
}

//! Markdown and JSON report generation.
//!
//! This module renders ingestion results and cross-run comparisons.

use crate::ingest::crossrun::AgentComparison;
use crate::ingest::stats::STAT_LABELS;
use crate::models::{ReportMetadata, RunReport};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &RunReport) -> String {
    let mut output = String::new();

    output.push_str("# BSE Run Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_agents_section(report));
    output.push_str(&generate_stats_section(report));
    output.push_str(&generate_data_quality_section(report));
    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    if let Some(run) = metadata.run {
        section.push_str(&format!("- **Run:** {}\n", run));
    }
    section.push_str(&format!("- **Source:** `{}`\n", metadata.source));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Rows:** {}\n", metadata.rows));
    section.push_str(&format!("- **Columns:** {}\n", metadata.columns));
    section.push('\n');

    section
}

fn generate_agents_section(report: &RunReport) -> String {
    let mut section = String::new();

    section.push_str("## Agents\n\n");
    if report.agents.is_empty() {
        section.push_str("No agent columns were identified.\n\n");
        return section;
    }
    for agent in &report.agents {
        section.push_str(&format!("- {}\n", agent));
    }
    section.push('\n');

    section
}

/// Statistics table: one row per agent, one column per statistic.
fn generate_stats_section(report: &RunReport) -> String {
    let mut section = String::new();

    section.push_str("## Average Balance Statistics\n\n");
    section.push_str("| Agent |");
    for label in STAT_LABELS {
        section.push_str(&format!(" {} |", label));
    }
    section.push('\n');
    section.push_str("|-------|");
    for _ in STAT_LABELS {
        section.push_str("------:|");
    }
    section.push('\n');

    for (agent, stats) in report.stats.iter() {
        section.push_str(&format!("| {} |", agent));
        for (i, value) in stats.as_row().iter().enumerate() {
            if i == 0 {
                section.push_str(&format!(" {} |", stats.count));
            } else {
                section.push_str(&format!(" {} |", format_stat(*value)));
            }
        }
        section.push('\n');
    }
    section.push('\n');

    section
}

fn generate_data_quality_section(report: &RunReport) -> String {
    let mut section = String::new();

    section.push_str("## Data Quality\n\n");
    section.push_str(&format!(
        "- **Cells coerced to zero:** {}\n",
        report.coercion_loss.total
    ));
    for (column, count) in &report.coercion_loss.by_column {
        section.push_str(&format!("  - `{}`: {}\n", column, count));
    }

    if report.warnings.is_empty() {
        section.push_str("- **Schema warnings:** none\n");
    } else {
        section.push_str(&format!(
            "- **Schema warnings:** {}\n",
            report.warnings.len()
        ));
        for warning in &report.warnings {
            section.push_str(&format!("  - ⚠️ {}\n", warning));
        }
    }
    section.push('\n');

    section
}

fn generate_footer() -> String {
    format!(
        "---\n\n*Generated by bse-runner v{}*\n",
        env!("CARGO_PKG_VERSION")
    )
}

/// Generate a JSON report.
pub fn generate_json_report(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Render a cross-run comparison as Markdown.
pub fn generate_comparison_markdown(rows: &[AgentComparison], runs: usize) -> String {
    let mut output = String::new();

    output.push_str("# Agent Comparison Across Runs\n\n");
    output.push_str(&format!("- **Summaries compared:** {}\n\n", runs));
    output.push_str("| Agent | Runs | Mean | 95% CI | Std | Min | Q1 | Median | Q3 | Max |\n");
    output.push_str("|-------|-----:|-----:|-------:|----:|----:|---:|-------:|---:|----:|\n");

    for row in rows {
        let get = |label: &str| format_stat(row.average(label).unwrap_or(f64::NAN));
        output.push_str(&format!(
            "| {} | {} | {} | ±{} | {} | {} | {} | {} | {} | {} |\n",
            row.agent,
            row.runs,
            get("mean"),
            format_stat(row.mean_ci95),
            get("std"),
            get("min"),
            get("25%"),
            get("50%"),
            get("75%"),
            get("max"),
        ));
    }

    output
}

fn format_stat(value: f64) -> String {
    if value.is_nan() {
        "n/a".to_string()
    } else {
        format!("{:.2}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{ingest_table, RawTable};
    use crate::report::build_report;
    use std::path::Path;

    fn sample_report() -> RunReport {
        let table = RawTable::parse(
            "r,1,1,1,GVWY,a,b,10,,a,b,1\n\
             r,2,1,1,GVWY,a,b,oops,,a,b,2\n",
        );
        let ingested = ingest_table(&table).unwrap();
        build_report(Path::new("bse_d000_avg_balance.csv"), None, &ingested)
    }

    #[test]
    fn test_markdown_sections() {
        let md = generate_markdown_report(&sample_report());
        assert!(md.starts_with("# BSE Run Report"));
        assert!(md.contains("## Metadata"));
        assert!(md.contains("`bse_d000_avg_balance.csv`"));
        assert!(md.contains("| GVWY | 2 | 5.00 |"));
        assert!(md.contains("- **Cells coerced to zero:** 1"));
        assert!(md.contains("agent name at column 8 is empty"));
    }

    #[test]
    fn test_json_report() {
        let json = generate_json_report(&sample_report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["agents"][0], "GVWY");
        assert_eq!(value["coercion_loss"]["total"], 1);
        assert_eq!(value["warnings"][0]["kind"], "blank_agent_name");
    }

    #[test]
    fn test_comparison_table() {
        let rows = vec![AgentComparison {
            agent: "ZIP".to_string(),
            runs: 2,
            averages: vec![3.0, 700.5, 400.0, 0.0, 350.0, 720.0, 1050.0, 1400.0],
            mean_ci95: 12.25,
        }];
        let md = generate_comparison_markdown(&rows, 2);
        assert!(md.contains("| ZIP | 2 | 700.50 | ±12.25 | 400.00 |"));
    }
}

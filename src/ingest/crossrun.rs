//! Comparison of agent statistics across several runs.
//!
//! Each exported summary contributes one observation per statistic; the
//! comparison averages them and reports a 95% confidence half-width for
//! the mean of means.

use crate::ingest::stats::STAT_LABELS;
use crate::report::summary::SummaryTable;
use serde::Serialize;

/// z-value for a two-sided 95% interval.
const Z_95: f64 = 1.96;

/// Averaged statistics for one agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentComparison {
    pub agent: String,
    /// Number of summaries that contained this agent.
    pub runs: usize,
    /// Average of each statistic, in [`STAT_LABELS`] order.
    pub averages: Vec<f64>,
    /// 95% confidence half-width of the averaged mean.
    pub mean_ci95: f64,
}

impl AgentComparison {
    pub fn average(&self, label: &str) -> Option<f64> {
        let idx = STAT_LABELS.iter().position(|l| *l == label)?;
        self.averages.get(idx).copied()
    }
}

/// Compare summaries. Agents appear in first-seen order.
pub fn compare_runs(summaries: &[SummaryTable]) -> Vec<AgentComparison> {
    let mut agents: Vec<&str> = Vec::new();
    for summary in summaries {
        for agent in &summary.agents {
            if !agents.contains(&agent.as_str()) {
                agents.push(agent);
            }
        }
    }

    agents
        .into_iter()
        .map(|agent| {
            let per_stat: Vec<Vec<f64>> = STAT_LABELS
                .iter()
                .map(|label| {
                    summaries
                        .iter()
                        .filter_map(|s| s.value(agent, label))
                        .filter(|v| !v.is_nan())
                        .collect()
                })
                .collect();

            let means = &per_stat[1];
            let runs = summaries
                .iter()
                .filter(|s| s.agents.iter().any(|a| a == agent))
                .count();

            AgentComparison {
                agent: agent.to_string(),
                runs,
                averages: per_stat.iter().map(|v| average(v)).collect(),
                mean_ci95: confidence_half_width(means),
            }
        })
        .collect()
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// `1.96 * sd / sqrt(n)` with the sample standard deviation; zero below two
/// observations.
pub fn confidence_half_width(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = average(values);
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    Z_95 * var.sqrt() / (n as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(agents: &[&str], mean: &[f64]) -> SummaryTable {
        let mut values = vec![vec![1.0; agents.len()]; STAT_LABELS.len()];
        values[1] = mean.to_vec();
        SummaryTable {
            agents: agents.iter().map(|a| a.to_string()).collect(),
            values,
        }
    }

    #[test]
    fn test_average_and_ci() {
        let runs = vec![
            summary(&["GVWY", "ZIP"], &[10.0, 100.0]),
            summary(&["GVWY", "ZIP"], &[20.0, 100.0]),
            summary(&["GVWY", "ZIP"], &[30.0, 100.0]),
        ];
        let result = compare_runs(&runs);

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].agent, "GVWY");
        assert_eq!(result[0].runs, 3);
        assert_eq!(result[0].average("mean"), Some(20.0));
        let expected = 1.96 * 10.0 / 3f64.sqrt();
        assert!((result[0].mean_ci95 - expected).abs() < 1e-9);
        assert_eq!(result[1].mean_ci95, 0.0);
    }

    #[test]
    fn test_agents_in_first_seen_order() {
        let runs = vec![
            summary(&["ZIP"], &[1.0]),
            summary(&["SNPR", "ZIP"], &[2.0, 3.0]),
        ];
        let result = compare_runs(&runs);
        let names: Vec<_> = result.iter().map(|c| c.agent.as_str()).collect();
        assert_eq!(names, vec!["ZIP", "SNPR"]);
        assert_eq!(result[1].runs, 1);
        assert_eq!(result[1].mean_ci95, 0.0);
        assert_eq!(result[0].average("mean"), Some(2.0));
    }
}

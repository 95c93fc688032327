//! Descriptive statistics.
//!
//! Reductions always run in a fixed order: sums left to right over the
//! input, percentiles over an ascending copy. Identical inputs therefore
//! give bit-identical outputs.

use serde::{Deserialize, Serialize};

/// Summary of one numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DescriptiveStats {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (`n - 1`); absent below two samples.
    pub std: Option<f64>,
    pub min: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub max: f64,
}

/// Row labels used when exporting, in export order.
pub const STAT_LABELS: [&str; 8] = ["count", "mean", "std", "min", "25%", "50%", "75%", "max"];

impl DescriptiveStats {
    /// Values in [`STAT_LABELS`] order; an absent `std` is `NaN`.
    pub fn as_row(&self) -> [f64; 8] {
        [
            self.count as f64,
            self.mean,
            self.std.unwrap_or(f64::NAN),
            self.min,
            self.p25,
            self.p50,
            self.p75,
            self.max,
        ]
    }
}

/// Describe a column. Returns `None` for an empty slice.
pub fn describe(values: &[f64]) -> Option<DescriptiveStats> {
    if values.is_empty() {
        return None;
    }

    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;
    let std = if n < 2 {
        None
    } else {
        let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        Some((sum_sq / (n - 1) as f64).sqrt())
    };

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    Some(DescriptiveStats {
        count: n,
        mean,
        std,
        min: sorted[0],
        p25: quantile_sorted(&sorted, 0.25),
        p50: quantile_sorted(&sorted, 0.50),
        p75: quantile_sorted(&sorted, 0.75),
        max: sorted[n - 1],
    })
}

/// Linear interpolation between order statistics at `h = p * (n - 1)`.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let n = sorted.len();
    let p = p.clamp(0.0, 1.0);
    let idx = p * (n - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let w = idx - lo as f64;
    sorted[lo] * (1.0 - w) + sorted[hi] * w
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_basic() {
        let stats = describe(&[10.0, 20.0, 30.0]).unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.mean, 20.0);
        assert_eq!(stats.std, Some(10.0));
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.p25, 15.0);
        assert_eq!(stats.p50, 20.0);
        assert_eq!(stats.p75, 25.0);
        assert_eq!(stats.max, 30.0);
    }

    #[test]
    fn test_percentiles_interpolate() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        let stats = describe(&values).unwrap();
        assert!((stats.p25 - 3.25).abs() < 1e-12);
        assert!((stats.p50 - 5.5).abs() < 1e-12);
        assert!((stats.p75 - 7.75).abs() < 1e-12);
    }

    #[test]
    fn test_single_value_has_no_std() {
        let stats = describe(&[4.0]).unwrap();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.std, None);
        assert_eq!(stats.p50, 4.0);
        assert!(stats.as_row()[2].is_nan());
    }

    #[test]
    fn test_empty_is_none() {
        assert!(describe(&[]).is_none());
    }

    #[test]
    fn test_order_independent_percentiles() {
        let a = describe(&[3.0, 1.0, 2.0, 5.0]).unwrap();
        let b = describe(&[5.0, 2.0, 1.0, 3.0]).unwrap();
        assert_eq!(a.p25.to_bits(), b.p25.to_bits());
        assert_eq!(a.p75.to_bits(), b.p75.to_bits());
    }
}

//! Descriptive statistics over minute-valued samples.

use crate::config::HistogramConfig;
use serde::Serialize;

/// Multiplier on the IQR for Tukey fences
pub const IQR_FENCE: f64 = 1.5;

/// Quantile of an ascending slice by linear interpolation between closest ranks.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let weight = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * weight)
}

/// Count, quartiles and Tukey outlier fences of one population.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub iqr: f64,
    /// Q1 - 1.5 * IQR
    pub lower_fence: f64,
    /// Q3 + 1.5 * IQR
    pub upper_fence: f64,
    /// Values strictly outside the fences
    pub outliers: usize,
}

impl SummaryStats {
    /// `None` for an empty population.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let q1 = quantile(&sorted, 0.25)?;
        let median = quantile(&sorted, 0.5)?;
        let q3 = quantile(&sorted, 0.75)?;
        let iqr = q3 - q1;
        let lower_fence = q1 - IQR_FENCE * iqr;
        let upper_fence = q3 + IQR_FENCE * iqr;
        let outliers = sorted
            .iter()
            .filter(|&&v| v < lower_fence || v > upper_fence)
            .count();

        Some(Self {
            count,
            mean,
            min: sorted[0],
            q1,
            median,
            q3,
            max: sorted[count - 1],
            iqr,
            lower_fence,
            upper_fence,
            outliers,
        })
    }

    pub fn is_outlier(&self, value: f64) -> bool {
        value < self.lower_fence || value > self.upper_fence
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistogramBin {
    /// Inclusive lower edge (minutes)
    pub lower: i64,
    /// Exclusive upper edge, inclusive for the last bin
    pub upper: i64,
    pub count: usize,
}

/// Fixed-width histogram; values outside the bounds are clipped into the edge bins.
pub fn histogram(values: &[i64], config: &HistogramConfig) -> Vec<HistogramBin> {
    let width = config.bin_width.max(1);
    let mut bins: Vec<HistogramBin> = Vec::new();
    let mut lower = config.clip_min;
    while lower < config.clip_max {
        let upper = (lower + width).min(config.clip_max);
        bins.push(HistogramBin {
            lower,
            upper,
            count: 0,
        });
        lower = upper;
    }
    if bins.is_empty() {
        return bins;
    }

    let last = bins.len() - 1;
    for &value in values {
        let clipped = value.clamp(config.clip_min, config.clip_max);
        let idx = (((clipped - config.clip_min) / width) as usize).min(last);
        bins[idx].count += 1;
    }
    bins
}

// src/stats.rs

use serde::Serialize;

/// Summary statistics of one channel's per-frame scores.
///
/// Every field is NaN when the series is empty. Scores are expected to be
/// strictly positive but are not checked: a zero collapses the geometric mean
/// to 0 (through `ln(0) = -inf`) and a negative score makes it NaN.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct ChannelStatistics {
    pub mean: f64,
    pub geometric_mean: f64,
    pub min: f64,
    pub max: f64,
    /// Population standard deviation (divisor `n`).
    pub standard_deviation: f64,
}

impl ChannelStatistics {
    pub const UNDEFINED: Self = Self {
        mean: f64::NAN,
        geometric_mean: f64::NAN,
        min: f64::NAN,
        max: f64::NAN,
        standard_deviation: f64::NAN,
    };

    pub fn from_scores(scores: &[f64]) -> Self {
        let Some(&first) = scores.first() else {
            return Self::UNDEFINED;
        };
        let n = scores.len() as f64;

        let mut sum = 0.0;
        let mut log_sum = 0.0;
        let mut min = first;
        let mut max = first;
        for &score in scores {
            sum += score;
            log_sum += score.ln();
            if score < min {
                min = score;
            }
            if score > max {
                max = score;
            }
        }

        let mean = sum / n;
        let variance = scores.iter().map(|s| (s - mean) * (s - mean)).sum::<f64>() / n;

        Self {
            mean,
            geometric_mean: (log_sum / n).exp(),
            min,
            max,
            standard_deviation: variance.sqrt(),
        }
    }

    pub fn is_defined(&self) -> bool {
        !self.mean.is_nan()
    }
}

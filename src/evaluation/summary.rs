//! Summary statistics of per-fold R² scores

use serde::{Deserialize, Serialize};

/// Mean and dispersion of cross-validation scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct R2Summary {
    pub scores: Vec<f64>,
    pub mean: f64,
    /// Half of (max - min)
    pub half_range: f64,
    pub min: f64,
    pub max: f64,
}

impl R2Summary {
    /// Summarize fold scores; `None` when there are none
    pub fn from_scores(scores: Vec<f64>) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }

        let n = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / n;
        // A NaN fold makes every statistic NaN, matching the mean
        let (min, max) = if scores.iter().any(|s| s.is_nan()) {
            (f64::NAN, f64::NAN)
        } else {
            (
                scores.iter().cloned().fold(f64::INFINITY, f64::min),
                scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            )
        };

        Some(Self {
            scores,
            mean,
            half_range: (max - min) / 2.0,
            min,
            max,
        })
    }

    /// `mean ± half_range` at three decimals
    pub fn summary(&self) -> String {
        format!("{:.3} ± {:.3}", self.mean, self.half_range)
    }
}

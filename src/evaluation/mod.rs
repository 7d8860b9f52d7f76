//! Evaluation metrics for fold results
//!
//! Includes metrics for:
//! - Regression: R², Pearson correlation, MSE
//! - Classification after thresholding: accuracy, precision, recall, F1,
//!   AUC, MCC, sensitivity, specificity
//! - Cross-fold R² summary

mod classification;
mod regression;
mod summary;

pub use classification::{roc_auc, ClassificationMetrics, ConfusionMatrix};
pub use regression::{mse, pearson, r2_score};
pub use summary::R2Summary;

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Metrics of one fold's best checkpoint on its test split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FoldMetrics {
    pub r2: f64,
    pub pearson: f64,
    pub test_loss: f64,
    pub classification: ClassificationMetrics,
}

impl FoldMetrics {
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>, test_loss: f64, threshold: f64) -> Self {
        Self {
            r2: r2_score(y_true, y_pred),
            pearson: pearson(y_true, y_pred),
            test_loss,
            classification: ClassificationMetrics::calculate(y_true, y_pred, threshold),
        }
    }
}

impl fmt::Display for FoldMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.classification;
        write!(
            f,
            "R2: {:.3}, test loss: {:.3}, Pearson: {:.3}, Accuracy: {:.3}, Precision: {:.3}, \
             Recall: {:.3}, F1: {:.3}, AUC: {:.3}, MCC: {:.3}, Sensitivity: {:.3}, Specificity: {:.3}",
            self.r2,
            self.test_loss,
            self.pearson,
            c.accuracy,
            c.precision,
            c.recall,
            c.f1,
            c.auc,
            c.mcc,
            c.sensitivity,
            c.specificity
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fold_metrics_display() {
        let y_true = array![0.9, 0.1, 0.7, 0.2];
        let y_pred = array![0.8, 0.2, 0.6, 0.3];
        let metrics = FoldMetrics::compute(&y_true, &y_pred, 0.0126, 0.5);

        assert_eq!(metrics.classification.accuracy, 1.0);
        assert_eq!(metrics.classification.auc, 1.0);
        let line = metrics.to_string();
        assert!(line.starts_with("R2: 0.911, test loss: 0.013, Pearson:"));
        assert!(line.ends_with("Sensitivity: 1.000, Specificity: 1.000"));
    }
}

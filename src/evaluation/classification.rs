//! Binary classification metrics over thresholded regression outputs

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Confusion matrix for binary classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// True positives
    pub tp: usize,
    /// True negatives
    pub tn: usize,
    /// False positives
    pub fp: usize,
    /// False negatives
    pub fn_: usize,
}

impl ConfusionMatrix {
    /// Count outcomes after labelling both sides `>= threshold` as positive
    pub fn from_scores(y_true: &Array1<f64>, y_score: &Array1<f64>, threshold: f64) -> Self {
        assert_eq!(y_true.len(), y_score.len(), "Arrays must have same length");

        let mut cm = Self::default();
        for (&t, &p) in y_true.iter().zip(y_score.iter()) {
            match (t >= threshold, p >= threshold) {
                (true, true) => cm.tp += 1,
                (false, false) => cm.tn += 1,
                (false, true) => cm.fp += 1,
                (true, false) => cm.fn_ += 1,
            }
        }
        cm
    }

    /// Total samples
    pub fn total(&self) -> usize {
        self.tp + self.tn + self.fp + self.fn_
    }
}

/// Collection of classification metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub confusion_matrix: ConfusionMatrix,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// ROC AUC over raw scores
    pub auc: f64,
    /// Matthews correlation coefficient
    pub mcc: f64,
    pub sensitivity: f64,
    pub specificity: f64,
}

impl ClassificationMetrics {
    /// Threshold truth and predictions, then score; AUC uses the raw predictions
    pub fn calculate(y_true: &Array1<f64>, y_score: &Array1<f64>, threshold: f64) -> Self {
        let cm = ConfusionMatrix::from_scores(y_true, y_score, threshold);
        let labels: Vec<bool> = y_true.iter().map(|&t| t >= threshold).collect();

        let precision = ratio_or_zero(cm.tp, cm.tp + cm.fp);
        let recall = ratio_or_zero(cm.tp, cm.tp + cm.fn_);

        Self {
            confusion_matrix: cm,
            accuracy: ratio_or_zero(cm.tp + cm.tn, cm.total()),
            precision,
            recall,
            f1: if precision + recall == 0.0 {
                0.0
            } else {
                2.0 * precision * recall / (precision + recall)
            },
            auc: roc_auc(&labels, y_score),
            mcc: mcc(&cm),
            sensitivity: ratio_or_nan(cm.tp, cm.tp + cm.fn_),
            specificity: ratio_or_nan(cm.tn, cm.tn + cm.fp),
        }
    }
}

fn ratio_or_zero(num: usize, denom: usize) -> f64 {
    if denom == 0 {
        0.0
    } else {
        num as f64 / denom as f64
    }
}

fn ratio_or_nan(num: usize, denom: usize) -> f64 {
    if denom == 0 {
        f64::NAN
    } else {
        num as f64 / denom as f64
    }
}

/// Matthews Correlation Coefficient
fn mcc(cm: &ConfusionMatrix) -> f64 {
    let tp = cm.tp as f64;
    let tn = cm.tn as f64;
    let fp = cm.fp as f64;
    let fn_ = cm.fn_ as f64;

    let denom = ((tp + fp) * (tp + fn_) * (tn + fp) * (tn + fn_)).sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    (tp * tn - fp * fn_) / denom
}

/// Area under the ROC curve via the Mann-Whitney U statistic
///
/// Tied scores share their average rank. NaN when only one class is present.
pub fn roc_auc(labels: &[bool], scores: &Array1<f64>) -> f64 {
    assert_eq!(labels.len(), scores.len(), "Arrays must have same length");

    let n_pos = labels.iter().filter(|&&l| l).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return f64::NAN;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    // Sum of 1-based ranks of the positives, ties averaged
    let mut rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        let average_rank = (start + end + 1) as f64 / 2.0;
        let positives = order[start..end].iter().filter(|&&i| labels[i]).count();
        rank_sum += average_rank * positives as f64;
        start = end;
    }

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    (rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_confusion_matrix() {
        let y_true = array![0.9, 0.1, 0.7, 0.2, 0.5];
        let y_pred = array![0.8, 0.6, 0.3, 0.1, 0.5];
        let cm = ConfusionMatrix::from_scores(&y_true, &y_pred, 0.5);
        assert_eq!(
            cm,
            ConfusionMatrix {
                tp: 2,
                tn: 1,
                fp: 1,
                fn_: 1
            }
        );
        assert_eq!(cm.total(), 5);
    }

    #[test]
    fn test_metrics_values() {
        let y_true = array![0.9, 0.1, 0.7, 0.2, 0.5];
        let y_pred = array![0.8, 0.6, 0.3, 0.1, 0.5];
        let m = ClassificationMetrics::calculate(&y_true, &y_pred, 0.5);

        assert_relative_eq!(m.accuracy, 0.6);
        assert_relative_eq!(m.precision, 2.0 / 3.0);
        assert_relative_eq!(m.recall, 2.0 / 3.0);
        assert_relative_eq!(m.f1, 2.0 / 3.0);
        assert_relative_eq!(m.sensitivity, 2.0 / 3.0);
        assert_relative_eq!(m.specificity, 0.5);
        // (2*1 - 1*1) / sqrt(3*3*2*2)
        assert_relative_eq!(m.mcc, 1.0 / 6.0, epsilon = 1e-12);
        // positives scored 0.8, 0.3, 0.5 vs negatives 0.6, 0.1: 4 of 6 pairs
        assert_relative_eq!(m.auc, 4.0 / 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_auc_ties_count_half() {
        let labels = [true, false, true, false];
        let scores = array![0.5, 0.5, 0.9, 0.1];
        // pairs: (0.5 vs 0.5) = 0.5, (0.5 vs 0.1) = 1, (0.9 vs both) = 2
        assert_relative_eq!(roc_auc(&labels, &scores), 3.5 / 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_single_class() {
        let y_true = array![0.9, 0.8];
        let y_pred = array![0.7, 0.2];
        let m = ClassificationMetrics::calculate(&y_true, &y_pred, 0.5);
        assert!(m.auc.is_nan());
        assert!(m.specificity.is_nan());
        assert_eq!(m.mcc, 0.0);
        assert_relative_eq!(m.recall, 0.5);
    }
}

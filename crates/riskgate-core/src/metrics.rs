//! Offline evaluation metrics over labelled runs.
//!
//! All functions take parallel sequences; pairs beyond the shorter sequence
//! are ignored.

use serde::{Deserialize, Serialize};

use crate::types::RiskLevel;

/// Share of positions where prediction and label agree. 0.0 when there are
/// no pairs.
pub fn decision_accuracy<T: PartialEq>(predictions: &[T], labels: &[T]) -> f64 {
    let pairs = predictions.len().min(labels.len());
    if pairs == 0 {
        return 0.0;
    }
    let correct = predictions
        .iter()
        .zip(labels)
        .filter(|(p, l)| p == l)
        .count();
    correct as f64 / pairs as f64
}

/// Binary scores with [`RiskLevel::High`] as the positive class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinaryMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub tp: usize,
    pub fp: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
    pub tn: usize,
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Precision, recall and F1 for detecting high-risk transactions.
pub fn precision_recall_f1(predictions: &[RiskLevel], ground_truth: &[RiskLevel]) -> BinaryMetrics {
    let (mut tp, mut fp, mut fn_, mut tn) = (0, 0, 0, 0);

    for (pred, truth) in predictions.iter().zip(ground_truth) {
        match (*pred == RiskLevel::High, *truth == RiskLevel::High) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, true) => fn_ += 1,
            (false, false) => tn += 1,
        }
    }

    let precision = ratio(tp as f64, (tp + fp) as f64);
    let recall = ratio(tp as f64, (tp + fn_) as f64);
    let f1 = ratio(2.0 * precision * recall, precision + recall);

    BinaryMetrics {
        precision,
        recall,
        f1,
        tp,
        fp,
        fn_,
        tn,
    }
}

/// Multi-class confusion counts, indexed `[truth][prediction]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix<T> {
    pub labels: Vec<T>,
    pub counts: Vec<Vec<usize>>,
}

impl<T: PartialEq> ConfusionMatrix<T> {
    fn index_of(&self, label: &T) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Count of transactions labelled `truth` that were predicted `predicted`.
    pub fn get(&self, truth: &T, predicted: &T) -> usize {
        match (self.index_of(truth), self.index_of(predicted)) {
            (Some(t), Some(p)) => self.counts[t][p],
            _ => 0,
        }
    }

    /// Pairs that landed on the diagonal.
    pub fn correct(&self) -> usize {
        (0..self.labels.len()).map(|i| self.counts[i][i]).sum()
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }
}

/// Build a confusion matrix over `labels`. Pairs with a value outside
/// `labels` are skipped.
pub fn confusion_matrix<T: PartialEq + Clone>(
    predictions: &[T],
    ground_truth: &[T],
    labels: &[T],
) -> ConfusionMatrix<T> {
    let mut matrix = ConfusionMatrix {
        labels: labels.to_vec(),
        counts: vec![vec![0; labels.len()]; labels.len()],
    };

    for (pred, truth) in predictions.iter().zip(ground_truth) {
        if let (Some(t), Some(p)) = (matrix.index_of(truth), matrix.index_of(pred)) {
            matrix.counts[t][p] += 1;
        }
    }

    matrix
}

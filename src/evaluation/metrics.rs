//! Classification metrics over `(true, predicted)` label sequences.
//!
//! All functions are order-insensitive: they only depend on the multiset of
//! `(true, predicted)` pairs.

use crate::core::{Error, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Fraction of exact matches; 0 for empty input.
pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> f32 {
    if y_true.is_empty() {
        return 0.0;
    }
    let hits = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    hits as f32 / y_true.len() as f32
}

/// Counts indexed `[true, predicted]`.
pub fn confusion_matrix(y_true: &[usize], y_pred: &[usize], num_classes: usize) -> Array2<usize> {
    let mut cm = Array2::zeros((num_classes, num_classes));
    for (&t, &p) in y_true.iter().zip(y_pred) {
        if t < num_classes && p < num_classes {
            cm[[t, p]] += 1;
        }
    }
    cm
}

/// Divide each row by its sum. Rows without support stay zero.
pub fn normalize_rows(cm: &Array2<usize>) -> Array2<f32> {
    let mut out = cm.mapv(|c| c as f32);
    for mut row in out.outer_iter_mut() {
        let total: f32 = row.sum();
        if total > 0.0 {
            row /= total;
        }
    }
    out
}

/// Recall ("detection rate") per class. Classes without support get 0.
pub fn per_class_recall(cm: &Array2<usize>) -> Vec<f32> {
    cm.outer_iter()
        .enumerate()
        .map(|(c, row)| {
            let support: usize = row.sum();
            if support == 0 {
                0.0
            } else {
                row[c] as f32 / support as f32
            }
        })
        .collect()
}

/// Mean recall over the classes that occur in `y_true`.
pub fn balanced_accuracy(y_true: &[usize], y_pred: &[usize], num_classes: usize) -> f32 {
    let cm = confusion_matrix(y_true, y_pred, num_classes);
    let recalls: Vec<f32> = cm
        .outer_iter()
        .zip(per_class_recall(&cm))
        .filter(|(row, _)| row.sum() > 0)
        .map(|(_, r)| r)
        .collect();
    if recalls.is_empty() {
        0.0
    } else {
        recalls.iter().sum::<f32>() / recalls.len() as f32
    }
}

/// Precision, recall and F1 of one class.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassScore {
    pub precision: f32,
    pub recall: f32,
    pub f1: f32,
    pub support: usize,
}

/// Full metric set for one evaluation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f32,
    pub balanced_accuracy: f32,
    /// Raw counts `[true, predicted]`
    pub confusion: Array2<usize>,
    /// Confusion normalized by true-class row
    pub normalized_confusion: Array2<f32>,
    /// Detection rate per class
    pub recall: Vec<f32>,
    pub per_class: Vec<ClassScore>,
}

impl ClassificationMetrics {
    /// Compute every metric; inputs must be equally long and in range.
    pub fn compute(y_true: &[usize], y_pred: &[usize], num_classes: usize) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(Error::DataIntegrity(format!(
                "{} true labels but {} predictions",
                y_true.len(),
                y_pred.len()
            )));
        }
        if let Some(&bad) = y_true.iter().chain(y_pred).find(|&&c| c >= num_classes) {
            return Err(Error::DataIntegrity(format!(
                "class {} outside label space of {}",
                bad, num_classes
            )));
        }

        let confusion = confusion_matrix(y_true, y_pred, num_classes);
        let recall = per_class_recall(&confusion);
        let per_class = (0..num_classes)
            .map(|c| {
                let tp = confusion[[c, c]] as f32;
                let support: usize = confusion.row(c).sum();
                let predicted: usize = confusion.column(c).sum();
                let precision = if predicted == 0 { 0.0 } else { tp / predicted as f32 };
                let f1 = if precision + recall[c] == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall[c] / (precision + recall[c])
                };
                ClassScore {
                    precision,
                    recall: recall[c],
                    f1,
                    support,
                }
            })
            .collect();

        Ok(Self {
            accuracy: accuracy(y_true, y_pred),
            balanced_accuracy: balanced_accuracy(y_true, y_pred, num_classes),
            normalized_confusion: normalize_rows(&confusion),
            confusion,
            recall,
            per_class,
        })
    }

    /// Text table with one row per class, followed by the aggregate scores.
    pub fn report(&self, class_names: &[String]) -> String {
        let width = class_names
            .iter()
            .map(|n| n.len())
            .max()
            .unwrap_or(0)
            .max(12);
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:>width$} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        );
        for (c, score) in self.per_class.iter().enumerate() {
            let name = class_names
                .get(c)
                .cloned()
                .unwrap_or_else(|| format!("class {}", c));
            let _ = writeln!(
                out,
                "{:>width$} {:>9.4} {:>9.4} {:>9.4} {:>9}",
                name, score.precision, score.recall, score.f1, score.support
            );
        }
        let total: usize = self.per_class.iter().map(|s| s.support).sum();
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:>width$} {:>9} {:>9} {:>9.4} {:>9}",
            "accuracy", "", "", self.accuracy, total
        );
        let _ = writeln!(
            out,
            "{:>width$} {:>9} {:>9.4} {:>9} {:>9}",
            "balanced acc", "", self.balanced_accuracy, "", total
        );
        out
    }
}

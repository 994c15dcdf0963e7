//! Evaluation Module
//!
//! Provides full-graph inference and metrics:
//! - Partition-wise prediction in inference mode
//! - Accuracy, balanced accuracy and per-class detection rates
//! - Row-normalized confusion matrices

pub mod metrics;
pub mod predict;

pub use metrics::{
    accuracy, balanced_accuracy, confusion_matrix, normalize_rows, per_class_recall, ClassScore,
    ClassificationMetrics,
};
pub use predict::{argmax_rows, predict};

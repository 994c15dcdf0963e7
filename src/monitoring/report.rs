//! Handing evaluation results to reporting collaborators.
//!
//! The core never renders plots. It emits the numeric arrays and the
//! class-name order; a [`Reporter`] decides what to do with them.

use crate::core::{now, Result, Timestamp};
use crate::evaluation::ClassificationMetrics;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Everything a plotter needs for one evaluation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Artifact name, e.g. `node-classification_0_hid_2048_convs_16_aug`
    pub name: String,
    /// Class names in label order
    pub class_names: Vec<String>,
    pub y_true: Vec<usize>,
    pub y_pred: Vec<usize>,
    pub metrics: ClassificationMetrics,
    /// Generated timestamp
    pub generated: Timestamp,
}

impl EvaluationReport {
    /// Create a report stamped with the current time.
    pub fn new(
        name: &str,
        class_names: Vec<String>,
        y_true: Vec<usize>,
        y_pred: Vec<usize>,
        metrics: ClassificationMetrics,
    ) -> Self {
        Self {
            name: name.to_string(),
            class_names,
            y_true,
            y_pred,
            metrics,
            generated: now(),
        }
    }
}

/// Consumer of evaluation reports.
pub trait Reporter {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Publish one report.
    fn report(&self, report: &EvaluationReport) -> Result<()>;
}

/// Writes metrics and the classification table to the log.
#[derive(Clone, Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn name(&self) -> &str {
        "log"
    }

    fn report(&self, report: &EvaluationReport) -> Result<()> {
        let metrics = &report.metrics;
        info!(
            report = %report.name,
            samples = report.y_true.len(),
            accuracy = metrics.accuracy,
            balanced_accuracy = metrics.balanced_accuracy,
            "Evaluation finished"
        );
        for (name, recall) in report.class_names.iter().zip(&metrics.recall) {
            info!(
                report = %report.name,
                class = %name,
                detection_rate = recall,
                "Per-class recall"
            );
        }
        info!("Classification report:\n{}", metrics.report(&report.class_names));
        Ok(())
    }
}

/// Writes `<dir>/<name>.json` for an external plotter.
#[derive(Clone, Debug)]
pub struct JsonReporter {
    dir: PathBuf,
}

impl JsonReporter {
    /// Create a reporter writing into `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a report with `name` is written to.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }
}

impl Reporter for JsonReporter {
    fn name(&self) -> &str {
        "json"
    }

    fn report(&self, report: &EvaluationReport) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&report.name);
        fs::write(&path, serde_json::to_string_pretty(report)?)?;
        info!(path = %path.display(), "Report written");
        Ok(())
    }
}

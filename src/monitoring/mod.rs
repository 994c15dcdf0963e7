//! Monitoring Module
//!
//! Provides observability for training runs:
//! - Tracing subscriber setup
//! - Evaluation reporters (log, JSON)

pub mod logging;
pub mod report;

pub use logging::{init_tracing, init_with, LogFormat, LoggerConfig, TRAINING_TARGET};
pub use report::{EvaluationReport, JsonReporter, LogReporter, Reporter};

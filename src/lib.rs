//! # flowgnn - Graph Neural Network Node Classification for Network Flows
//!
//! Detects attacks in network traffic by classifying flow records as nodes
//! of a graph whose edges connect flows sharing a host:
//! - **Dataset**: per-split graph construction, neighbor sampling, minority augmentation
//! - **Loader**: random node partitions as mini-batches
//! - **GNN**: deep propagation classifier with initial residual and identity mapping
//! - **Training**: weighted loss, Adadelta, early stopping, checkpoints
//! - **Evaluation**: accuracy, balanced accuracy, confusion matrix, detection rates
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flowgnn::dataset::CsvSource;
//! use flowgnn::monitoring::{init_tracing, LogReporter};
//! use flowgnn::pipeline::{run_node_classification, RunConfig};
//!
//! fn main() -> flowgnn::Result<()> {
//!     init_tracing("info");
//!     let config = RunConfig::default().with_neighbors(2).with_hidden(256);
//!     let source = CsvSource::new("dataset/raw");
//!     let outcome = run_node_classification(&config, &source, &[&LogReporter])?;
//!     println!("Balanced accuracy: {}", outcome.report.metrics.balanced_accuracy);
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod dataset;
pub mod evaluation;
pub mod gnn;
pub mod loader;
pub mod monitoring;
pub mod pipeline;
pub mod training;

pub use core::error::{Error, Result};

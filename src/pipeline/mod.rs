//! Pipeline Module
//!
//! Provides the end-to-end run:
//! - Serde-backed run configuration
//! - Build, train-or-resume, evaluate and report

pub mod config;
pub mod runner;

pub use config::RunConfig;
pub use runner::{run_node_classification, RunOutcome};

//! Graph Neural Network (GNN) Module
//!
//! Provides the propagation classifier for flow nodes:
//! - Symmetric-normalized adjacency with self loops
//! - Deep propagation blocks with initial residual and identity mapping
//! - Node classifier with hand-written backward pass

pub mod adjacency;
pub mod conv;
pub mod model;

pub use adjacency::NormalizedAdjacency;
pub use conv::{layer_beta, PropagationBlock};
pub use model::{ForwardCache, ModelConfig, ModelParams, NodeClassifier};

//! Mini-batch Loader Module
//!
//! Random node partitioning of a graph into induced subgraphs.

pub mod partition;

pub use partition::{PartitionIter, RandomNodeLoader, Subgraph};

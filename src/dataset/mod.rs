//! Graph Dataset Module
//!
//! Builds attributed flow graphs for node classification:
//! - Flow records and the attack-category label space
//! - CSV ingestion of per-split record files
//! - Shared-endpoint edges with bounded neighbor sampling
//! - Minority-class augmentation of the training split

pub mod augmentation;
pub mod builder;
pub mod graph;
pub mod record;
pub mod sampling;
pub mod source;

pub use augmentation::{AugmentationConfig, AugmentationSummary, MinorityAugmenter};
pub use builder::{BuilderConfig, GraphBuilder, GraphSchema};
pub use graph::{Graph, NodeOrigin};
pub use record::{
    ClassMapping, FlowRecord, InMemorySource, LabelMode, RecordSource, ATTACK_CATEGORIES,
};
pub use sampling::NeighborSampler;
pub use source::{CategoryVocabulary, CsvLayout, CsvSource};

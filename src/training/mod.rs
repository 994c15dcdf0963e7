//! Training Module
//!
//! Provides the optimization loop for the node classifier:
//! - Class-weighted cross entropy
//! - Adadelta and SGD update rules
//! - Patience-based early stopping
//! - Compressed, digest-verified checkpoints

pub mod checkpoint;
pub mod early_stop;
pub mod loss;
pub mod optimizer;
pub mod trainer;

pub use checkpoint::{CheckpointMeta, CheckpointStore};
pub use early_stop::{EarlyStopping, StopState};
pub use loss::{balanced_class_weights, LossFunction, LossOutput, WeightedCrossEntropy};
pub use optimizer::{Adadelta, AdadeltaConfig, Optimizer, Sgd};
pub use trainer::{EpochRecord, StopReason, TrainedModel, Trainer, TrainerConfig, TrainingHistory};

//! Run configuration.
//!
//! Every field has a default, so a JSON file only needs the values it
//! changes. The four control-surface parameters (neighbor bound,
//! augmentation, hidden width, block count) fix the checkpoint identity.

use crate::core::{Error, Result};
use crate::dataset::{AugmentationConfig, BuilderConfig, LabelMode};
use crate::gnn::ModelConfig;
use crate::training::{AdadeltaConfig, TrainerConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration of one node-classification run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Neighbor bound per node (0 = full neighborhood)
    pub neighbors: usize,
    /// Augment minority classes of the training split
    pub augmentation: bool,
    /// Hidden width
    pub hidden: usize,
    /// Number of propagation blocks
    pub num_convs: usize,
    /// Partitions per traversal
    pub num_parts: usize,
    pub alpha: f32,
    pub theta: f32,
    pub dropout: f32,
    pub max_epochs: usize,
    pub patience: usize,
    /// Validate every epoch
    pub evaluation: bool,
    /// Label space
    pub label_mode: LabelMode,
    /// Root seed for sampling, partitioning, initialization and dropout
    pub seed: u64,
    /// Checkpoint directory
    pub checkpoint_dir: PathBuf,
    /// Report output directory
    pub report_dir: PathBuf,
    pub augmentation_policy: AugmentationConfig,
    pub optimizer: AdadeltaConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            neighbors: 0,
            augmentation: true,
            hidden: 2048,
            num_convs: 16,
            num_parts: 64,
            alpha: 0.5,
            theta: 0.7,
            dropout: 0.5,
            max_epochs: 1000,
            patience: 20,
            evaluation: true,
            label_mode: LabelMode::default(),
            seed: 42,
            checkpoint_dir: PathBuf::from("models"),
            report_dir: PathBuf::from("results"),
            augmentation_policy: AugmentationConfig::default(),
            optimizer: AdadeltaConfig::default(),
        }
    }
}

impl RunConfig {
    /// Load from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Set the neighbor bound.
    pub fn with_neighbors(mut self, neighbors: usize) -> Self {
        self.neighbors = neighbors;
        self
    }

    /// Enable or disable augmentation.
    pub fn with_augmentation(mut self, augmentation: bool) -> Self {
        self.augmentation = augmentation;
        self
    }

    /// Set the hidden width.
    pub fn with_hidden(mut self, hidden: usize) -> Self {
        self.hidden = hidden;
        self
    }

    /// Set the number of propagation blocks.
    pub fn with_num_convs(mut self, num_convs: usize) -> Self {
        self.num_convs = num_convs;
        self
    }

    /// Set the label mode.
    pub fn with_label_mode(mut self, label_mode: LabelMode) -> Self {
        self.label_mode = label_mode;
        self
    }

    /// Set the checkpoint directory.
    pub fn with_checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = dir.into();
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.num_parts == 0 {
            return Err(Error::InvalidConfig("num_parts must be at least 1".to_string()));
        }
        // Feature width and class count are placeholders here.
        self.model_config(1, 2).validate()?;
        self.trainer_config().validate()?;
        self.augmentation_policy.validate()
    }

    fn suffix(&self) -> String {
        let mut suffix = String::new();
        if self.augmentation {
            suffix.push_str("_aug");
        }
        if self.label_mode == LabelMode::Binary {
            suffix.push_str("_binary");
        }
        suffix
    }

    /// Checkpoint identity.
    pub fn model_name(&self) -> String {
        format!(
            "gc_model_test_attack_{}_hid_{}_convs_{}{}",
            self.neighbors,
            self.hidden,
            self.num_convs,
            self.suffix()
        )
    }

    /// Name of the evaluation artifacts.
    pub fn report_name(&self) -> String {
        format!(
            "node-classification_{}_hid_{}_convs_{}{}",
            self.neighbors,
            self.hidden,
            self.num_convs,
            self.suffix()
        )
    }

    /// Model architecture for a given input schema.
    pub fn model_config(&self, feature_width: usize, num_classes: usize) -> ModelConfig {
        ModelConfig::new(feature_width, num_classes, self.num_convs, self.hidden)
            .with_alpha(self.alpha)
            .with_theta(self.theta)
            .with_dropout(self.dropout)
    }

    /// Training loop settings.
    pub fn trainer_config(&self) -> TrainerConfig {
        TrainerConfig::default()
            .with_max_epochs(self.max_epochs)
            .with_patience(self.patience)
            .with_evaluation(self.evaluation)
            .with_seed(self.seed)
    }

    /// Graph builder settings.
    pub fn builder_config(&self) -> BuilderConfig {
        BuilderConfig {
            seed: self.seed,
            augmentation: self.augmentation_policy.clone(),
        }
    }
}

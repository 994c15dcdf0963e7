//! Minority-class augmentation for the training graph.
//!
//! Synthetic nodes interpolate between two members of the same class and
//! inherit the neighborhood of the first one. Existing nodes are never removed.

use crate::core::{Error, Result};
use crate::dataset::graph::NodeOrigin;
use crate::dataset::sampling::NeighborSampler;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for minority-class augmentation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AugmentationConfig {
    /// Each class is grown to at least this fraction of the majority class
    pub target_ratio: f32,
    /// Upper bound on synthetic nodes per class, as a multiple of its original size
    pub max_growth: usize,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            target_ratio: 0.25,
            max_growth: 10,
        }
    }
}

impl AugmentationConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !(self.target_ratio > 0.0 && self.target_ratio <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "augmentation target_ratio must be in (0, 1], got {}",
                self.target_ratio
            )));
        }
        Ok(())
    }
}

/// Mutable node table the builder assembles before freezing it into a graph.
#[derive(Clone, Debug, Default)]
pub struct NodeTable {
    pub features: Vec<Vec<f32>>,
    pub labels: Vec<usize>,
    pub neighbors: Vec<Vec<usize>>,
    pub origins: Vec<NodeOrigin>,
}

impl NodeTable {
    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the table has no nodes.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Node count per class.
    pub fn class_counts(&self, num_classes: usize) -> Vec<usize> {
        let mut counts = vec![0usize; num_classes];
        for &y in &self.labels {
            counts[y] += 1;
        }
        counts
    }
}

/// Outcome of an augmentation pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AugmentationSummary {
    /// Synthetic nodes added per class
    pub added_per_class: Vec<usize>,
}

impl AugmentationSummary {
    /// Total synthetic nodes added.
    pub fn total_added(&self) -> usize {
        self.added_per_class.iter().sum()
    }
}

/// Synthesizes minority-class nodes.
#[derive(Clone, Debug, Default)]
pub struct MinorityAugmenter {
    config: AugmentationConfig,
}

impl MinorityAugmenter {
    /// Create a new augmenter.
    pub fn new(config: AugmentationConfig) -> Self {
        Self { config }
    }

    /// Target node count for every minority class given the class counts.
    pub fn target_count(&self, counts: &[usize]) -> usize {
        let majority = counts.iter().copied().max().unwrap_or(0);
        (majority as f32 * self.config.target_ratio).ceil() as usize
    }

    /// Grow minority classes in `table` towards the target balance.
    pub fn augment<R: Rng + ?Sized>(
        &self,
        table: &mut NodeTable,
        num_classes: usize,
        sampler: &NeighborSampler,
        rng: &mut R,
    ) -> AugmentationSummary {
        let counts = table.class_counts(num_classes);
        let target = self.target_count(&counts);
        let mut added_per_class = vec![0usize; num_classes];

        for class in 0..num_classes {
            let count = counts[class];
            if count == 0 || count >= target {
                continue;
            }
            let needed = (target - count).min(count.saturating_mul(self.config.max_growth));
            let members: Vec<usize> = (0..table.len())
                .filter(|&i| table.labels[i] == class)
                .collect();

            for _ in 0..needed {
                let parent = members[rng.gen_range(0..members.len())];
                let partner = if members.len() > 1 {
                    loop {
                        let q = members[rng.gen_range(0..members.len())];
                        if q != parent {
                            break q;
                        }
                    }
                } else {
                    parent
                };

                let lambda: f32 = rng.gen();
                let features: Vec<f32> = table.features[parent]
                    .iter()
                    .zip(table.features[partner].iter())
                    .map(|(a, b)| a + lambda * (b - a))
                    .collect();

                let mut candidates = table.neighbors[parent].clone();
                candidates.push(parent);
                let neighbors = sampler.sample(&candidates, rng);

                let node = table.len();
                table.features.push(features);
                table.labels.push(class);
                table.neighbors.push(neighbors);
                table.origins.push(NodeOrigin::Synthetic { parent });
                if !sampler.is_bounded() {
                    table.neighbors[parent].push(node);
                }
            }

            debug!(class, original = count, added = needed, "Augmented minority class");
            added_per_class[class] = needed;
        }

        AugmentationSummary { added_per_class }
    }
}

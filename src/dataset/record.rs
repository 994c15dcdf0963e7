//! Flow records and the attack-category label space.
//!
//! Raw ingestion lives outside this crate; collaborators hand records over
//! through [`RecordSource`].

use crate::core::{Error, Result, SplitRole};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// UNSW-NB15 attack categories in their canonical order.
pub const ATTACK_CATEGORIES: [&str; 10] = [
    "Normal",
    "Generic",
    "Exploits",
    "Fuzzers",
    "DoS",
    "Reconnaissance",
    "Analysis",
    "Backdoor",
    "Shellcode",
    "Worms",
];

/// One network flow, already encoded to numeric features.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    /// Source host address
    pub src_addr: String,
    /// Destination host address
    pub dst_addr: String,
    /// Encoded traffic features
    pub features: Vec<f32>,
    /// Category name
    pub label: String,
}

impl FlowRecord {
    /// Create a new flow record.
    pub fn new(src_addr: &str, dst_addr: &str, features: Vec<f32>, label: &str) -> Self {
        Self {
            src_addr: src_addr.to_string(),
            dst_addr: dst_addr.to_string(),
            features,
            label: label.to_string(),
        }
    }
}

/// How category names project onto class indices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelMode {
    /// Normal vs attack
    Binary,
    /// One class per attack category
    #[default]
    Multiclass,
}

/// Mapping from category names to class indices.
#[derive(Clone, Debug)]
pub struct ClassMapping {
    mode: LabelMode,
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl ClassMapping {
    /// Build the mapping for a label mode over the UNSW-NB15 categories.
    pub fn unsw_nb15(mode: LabelMode) -> Self {
        let names: Vec<String> = match mode {
            LabelMode::Binary => vec!["Normal".to_string(), "Attack".to_string()],
            LabelMode::Multiclass => ATTACK_CATEGORIES.iter().map(|s| s.to_string()).collect(),
        };
        let index = ATTACK_CATEGORIES
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let class = match mode {
                    LabelMode::Binary => usize::from(i != 0),
                    LabelMode::Multiclass => i,
                };
                (name.to_lowercase(), class)
            })
            .collect();

        Self { mode, names, index }
    }

    /// Build a mapping from an explicit list of class names.
    pub fn from_names(names: &[&str]) -> Self {
        let index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_lowercase(), i))
            .collect();
        Self {
            mode: LabelMode::Multiclass,
            names: names.iter().map(|s| s.to_string()).collect(),
            index,
        }
    }

    /// Resolve a category name (case-insensitive) to its class index.
    pub fn class_of(&self, label: &str) -> Result<usize> {
        self.index
            .get(&label.trim().to_lowercase())
            .copied()
            .ok_or_else(|| Error::DataIntegrity(format!("unknown label '{}'", label)))
    }

    /// Number of classes in the label space.
    pub fn num_classes(&self) -> usize {
        self.names.len()
    }

    /// Class names ordered by class index.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Label mode this mapping was built for.
    pub fn mode(&self) -> LabelMode {
        self.mode
    }
}

/// Supplier of per-split flow records.
pub trait RecordSource {
    /// Load all records of a split.
    fn load(&self, role: SplitRole) -> Result<Vec<FlowRecord>>;
}

/// Record source backed by vectors held in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemorySource {
    splits: HashMap<SplitRole, Vec<FlowRecord>>,
}

impl InMemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the records of a split.
    pub fn with_split(mut self, role: SplitRole, records: Vec<FlowRecord>) -> Self {
        self.splits.insert(role, records);
        self
    }
}

impl RecordSource for InMemorySource {
    fn load(&self, role: SplitRole) -> Result<Vec<FlowRecord>> {
        Ok(self.splits.get(&role).cloned().unwrap_or_default())
    }
}

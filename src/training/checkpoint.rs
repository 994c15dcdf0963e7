//! Durable model checkpoints.
//!
//! File layout: LZ4 (size-prepended) over a bincode-encoded
//! `{ metadata, parameter bytes }` record. The metadata carries a SHA3-256
//! digest of the parameter bytes, checked on load.

use crate::core::{now, Error, Hash256, Result, Timestamp};
use crate::gnn::{ModelConfig, ModelParams, NodeClassifier};
use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const CHECKPOINT_EXTENSION: &str = "ckpt";

/// Metadata stored alongside checkpointed parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    /// Checkpoint identity
    pub model_name: String,
    /// Epoch the snapshot was taken at (0 if unknown)
    pub epoch: usize,
    /// Monitored loss at that epoch
    pub val_loss: f32,
    /// Write time
    pub saved_at: Timestamp,
    /// Architecture the parameters belong to
    pub architecture: ModelConfig,
    /// Hex SHA3-256 of the encoded parameters
    pub digest: String,
}

#[derive(Serialize, Deserialize)]
struct CheckpointFile {
    meta: CheckpointMeta,
    params: Vec<u8>,
}

/// Checkpoint directory keyed by model name.
#[derive(Clone, Debug)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for a model name.
    pub fn path_for(&self, model_name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", model_name, CHECKPOINT_EXTENSION))
    }

    /// Whether a checkpoint exists for `model_name`.
    pub fn exists(&self, model_name: &str) -> bool {
        self.path_for(model_name).is_file()
    }

    /// Persist the model's current parameters.
    ///
    /// Writes to a temporary file and renames it into place, so an interrupted
    /// write never replaces the previous checkpoint.
    pub fn save(
        &self,
        model_name: &str,
        model: &NodeClassifier,
        epoch: usize,
        val_loss: f32,
    ) -> Result<CheckpointMeta> {
        let params = bincode::serialize(model.params())
            .map_err(|e| Error::CheckpointIo(format!("cannot encode {}: {}", model_name, e)))?;
        let meta = CheckpointMeta {
            model_name: model_name.to_string(),
            epoch,
            val_loss,
            saved_at: now(),
            architecture: model.config().clone(),
            digest: Hash256::digest(&params).to_hex(),
        };
        let encoded = bincode::serialize(&CheckpointFile {
            meta: meta.clone(),
            params,
        })
        .map_err(|e| Error::CheckpointIo(format!("cannot encode {}: {}", model_name, e)))?;
        let compressed = compress_prepend_size(&encoded);

        fs::create_dir_all(&self.dir).map_err(|e| {
            Error::CheckpointIo(format!("cannot create {}: {}", self.dir.display(), e))
        })?;
        let path = self.path_for(model_name);
        let tmp = path.with_extension(format!("{}.tmp", CHECKPOINT_EXTENSION));
        fs::write(&tmp, &compressed)
            .map_err(|e| Error::CheckpointIo(format!("cannot write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &path).map_err(|e| {
            Error::CheckpointIo(format!("cannot move checkpoint into {}: {}", path.display(), e))
        })?;

        debug!(
            model = model_name,
            epoch,
            val_loss,
            bytes = compressed.len(),
            "Checkpoint written"
        );
        Ok(meta)
    }

    /// Read and verify a checkpoint.
    pub fn load(&self, model_name: &str) -> Result<(CheckpointMeta, ModelParams)> {
        let path = self.path_for(model_name);
        let corrupt = |e: &dyn std::fmt::Display| {
            Error::CheckpointIo(format!("corrupt checkpoint {}: {}", path.display(), e))
        };

        let compressed = fs::read(&path)
            .map_err(|e| Error::CheckpointIo(format!("cannot read {}: {}", path.display(), e)))?;
        let encoded = decompress_size_prepended(&compressed).map_err(|e| corrupt(&e))?;
        let file: CheckpointFile = bincode::deserialize(&encoded).map_err(|e| corrupt(&e))?;

        let stored = Hash256::from_hex(&file.meta.digest).map_err(|e| corrupt(&e))?;
        let computed = Hash256::digest(&file.params);
        if stored != computed {
            return Err(Error::CheckpointIo(format!(
                "digest mismatch in {}: stored {}, computed {}",
                path.display(),
                stored,
                computed
            )));
        }
        let params: ModelParams = bincode::deserialize(&file.params).map_err(|e| corrupt(&e))?;
        Ok((file.meta, params))
    }

    /// Load a checkpoint into `model`; the stored architecture must match.
    pub fn restore(
        &self,
        model_name: &str,
        model: &mut NodeClassifier,
    ) -> Result<CheckpointMeta> {
        let (meta, params) = self.load(model_name)?;
        if &meta.architecture != model.config() {
            return Err(Error::CheckpointIo(format!(
                "checkpoint {} was saved for {:?}, model is {:?}",
                model_name,
                meta.architecture,
                model.config()
            )));
        }
        model.load_params(params)?;
        Ok(meta)
    }
}

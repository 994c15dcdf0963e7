//! Error types for flowgnn.

use thiserror::Error;

/// Result type alias for flowgnn operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, training or evaluating.
#[derive(Error, Debug)]
pub enum Error {
    // Dataset errors
    #[error("Data integrity violated: {0}")]
    DataIntegrity(String),

    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    // Training errors
    #[error("Training diverged at epoch {epoch}: loss = {loss}")]
    DivergedTraining { epoch: usize, loss: f32 },

    // Checkpoint errors
    #[error("Checkpoint IO failed: {0}")]
    CheckpointIo(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

//! Error types for the GAT homology library

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Checkpoint encoding or decoding failed
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] bincode::Error),

    /// Configuration file could not be parsed
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration could not be written
    #[error("Failed to serialize configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// Array shape error
    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// A graph sample file is malformed
    #[error("Invalid sample {path}: {reason}")]
    InvalidSample { path: PathBuf, reason: String },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A graph's structure is inconsistent
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    /// Not enough samples for the requested operation
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Model dimensions disagree with the data or a checkpoint
    #[error("Architecture mismatch: {0}")]
    ArchitectureMismatch(String),
}

impl Error {
    /// Build an [`Error::InvalidSample`] for the given file
    pub fn invalid_sample(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::InvalidSample {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

//! Error types for mijia-store.

use std::path::PathBuf;

/// Result type for mijia-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in mijia-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to read a state file.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write a state file.
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A state file exists but could not be parsed.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A reading timestamp could not be formatted as a history key.
    #[error("invalid timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}

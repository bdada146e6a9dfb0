//! Error types for the pool-object registry and its adapters.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during pool-object operations.
#[derive(Error, Debug)]
pub enum PoolObjError {
    /// The request conflicts with an existing object (identity clash,
    /// duplicate storage source, missing parent device, ...).
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    /// The object is in a state that forbids the request.
    #[error("Requested operation is not valid: {0}")]
    OperationInvalid(String),

    /// Malformed input.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Secret exists but has no value.
    #[error("Secret has no value: {0}")]
    NoSecret(String),

    /// A per-entry clone callback failed while cloning a table.
    #[error("Failed to clone table entry: {0}")]
    CloneFailed(String),

    /// A list callback aborted the traversal.
    #[error("List callback failed: {0}")]
    Callback(String),

    /// Filesystem error on a config, state or value file.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Definition could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PoolObjError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PoolObjError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for PoolObjError {
    fn from(e: serde_json::Error) -> Self {
        PoolObjError::Serialization(e.to_string())
    }
}

/// Result type alias for pool-object operations.
pub type Result<T> = std::result::Result<T, PoolObjError>;

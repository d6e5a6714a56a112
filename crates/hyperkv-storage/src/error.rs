//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in the storage backend, append log, or snapshot store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode record: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode record at line {line}: {source}")]
    Decode {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed append-log record: {0:?}")]
    MalformedLine(String),

    #[error("snapshot directory has no snapshots")]
    NoSnapshot,

    #[error("snapshot file name {0:?} does not match the expected pattern")]
    MalformedSnapshotName(String),
}

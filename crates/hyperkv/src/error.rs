//! Facade error type.

use hyperkv_keyspace::KeyspaceError;
use hyperkv_storage::StorageError;
use thiserror::Error;

/// Result type for the embeddable `HyperKV` API.
pub type Result<T> = std::result::Result<T, HyperkvError>;

/// Errors surfaced by the embeddable [`Hyperkv`](crate::Hyperkv) handle.
#[derive(Debug, Error)]
pub enum HyperkvError {
    /// Keyspace-level error (wrong type, OOM, corrupted value, ...).
    #[error("keyspace error: {0}")]
    Keyspace(#[from] KeyspaceError),

    /// Storage-level error (append log, snapshot I/O).
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Filesystem error while preparing the data directory.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value (e.g. an unrecognized eviction policy).
    #[error("configuration error: {0}")]
    Config(String),
}

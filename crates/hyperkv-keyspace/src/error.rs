//! Keyspace-level error taxonomy.

use hyperkv_crdt::MergeError;
use hyperkv_storage::StorageError;
use thiserror::Error;

pub type KeyspaceResult<T> = Result<T, KeyspaceError>;

#[derive(Debug, Error)]
pub enum KeyspaceError {
    #[error("syntax error")]
    Syntax,

    #[error("WRONGTYPE {0}")]
    WrongType(String),

    #[error("command not allowed when used memory > 'maxmemory'")]
    Oom,

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("crdt merge error: {0}")]
    Merge(#[from] MergeError),

    #[error("corrupted value record: {0}")]
    Codec(#[source] serde_json::Error),
}

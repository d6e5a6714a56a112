//! Storage backend, append-only command log, and snapshot store for `HyperKV`.

mod aof;
mod error;
mod snapshot;
mod storage;

pub use aof::{AppendLog, FsyncPolicy, LogCommand};
pub use error::{StorageError, StorageResult};
pub use snapshot::{LoadedSnapshot, SnapshotStore};
pub use storage::{MemoryBackend, StorageBackend, glob_matches};

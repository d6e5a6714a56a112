//! Embeddable entry point: an in-process `HyperKV` keyspace with the same
//! persistence and eviction machinery the network daemon uses, minus the
//! RESP listener.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use hyperkv_keyspace::{EvictionEngine, EvictionPolicy, Keyspace, KeyspaceConfig, SetOptions};
use hyperkv_storage::{AppendLog, FsyncPolicy, MemoryBackend, SnapshotStore};
use hyperkv_types::{Key, NodeId, Timestamp};

use crate::error::{HyperkvError, Result};

/// Configuration for opening an embedded `HyperKV` keyspace.
#[derive(Debug, Clone)]
pub struct HyperkvConfig {
    /// Directory holding `appendonly.log` and `snapshots/`.
    pub data_dir: PathBuf,
    /// Memory budget in bytes. `0` disables eviction.
    pub max_memory: usize,
    /// Eviction policy: `lru`, `lfu`, `arc`, `random`, `volatile-lru`, `volatile-lfu`.
    pub eviction_policy: String,
    /// Fraction of `max_memory` at which eviction starts.
    pub eviction_threshold: f64,
    /// Keys evicted per pass once the threshold is crossed.
    pub eviction_batch_size: usize,
    /// Whether to open and replay an append-only log.
    pub aof_enabled: bool,
    /// Fsync policy for the append log: `always`, `everysec`, `no`.
    pub aof_fsync_policy: String,
    /// Whether a snapshot is loaded at startup (if present).
    pub snapshot_enabled: bool,
    /// Whether snapshots are gzip-compressed.
    pub snapshot_compression: bool,
    /// How many snapshot generations to retain.
    pub snapshot_retention: usize,
    /// This node's id, stamped into HLC timestamps for CRDT values.
    pub node_id: u64,
}

impl HyperkvConfig {
    /// Builds a config rooted at `data_dir`, persistence disabled by default.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            max_memory: 0,
            eviction_policy: "lru".to_string(),
            eviction_threshold: 0.9,
            eviction_batch_size: 16,
            aof_enabled: false,
            aof_fsync_policy: "everysec".to_string(),
            snapshot_enabled: false,
            snapshot_compression: true,
            snapshot_retention: 3,
            node_id: 0,
        }
    }

    /// Enables the append log with the given fsync policy.
    pub fn with_aof(mut self, fsync_policy: impl Into<String>) -> Self {
        self.aof_enabled = true;
        self.aof_fsync_policy = fsync_policy.into();
        self
    }

    /// Enables startup/shutdown snapshots.
    pub fn with_snapshots(mut self, compress: bool, retention: usize) -> Self {
        self.snapshot_enabled = true;
        self.snapshot_compression = compress;
        self.snapshot_retention = retention;
        self
    }

    pub fn with_max_memory(mut self, bytes: usize) -> Self {
        self.max_memory = bytes;
        self
    }

    pub fn with_eviction_policy(mut self, policy: impl Into<String>) -> Self {
        self.eviction_policy = policy.into();
        self
    }
}

struct Inner {
    keyspace: Keyspace,
    snapshot_store: Option<SnapshotStore>,
}

/// A `HyperKV` keyspace embedded directly in the host process.
///
/// Cheaply clonable: clones share the same underlying keyspace behind a
/// mutex, the same way the network daemon's `Dispatcher` exposes one
/// keyspace to many connections, except here callers serialize through
/// `Mutex` instead of a single event loop thread.
#[derive(Clone)]
pub struct Hyperkv {
    inner: Arc<Mutex<Inner>>,
}

impl Hyperkv {
    /// Opens (or creates) a keyspace at `data_dir` with default settings and
    /// no persistence enabled.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(HyperkvConfig::new(data_dir.as_ref()))
    }

    /// Opens a keyspace backed by a fresh temporary directory that is
    /// removed when the returned handle is dropped. Useful for tests and
    /// short-lived tools that don't need durability.
    pub fn in_memory() -> Result<Self> {
        let dir = tempfile::tempdir().map_err(HyperkvError::Io)?;
        let config = HyperkvConfig::new(dir.into_path());
        Self::open_with_config(config)
    }

    /// Opens a keyspace with explicit configuration, replaying the append
    /// log and loading the latest snapshot (if either is enabled).
    pub fn open_with_config(config: HyperkvConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let eviction_policy = EvictionPolicy::from_str(&config.eviction_policy).map_err(HyperkvError::Config)?;
        let keyspace_config = KeyspaceConfig {
            max_memory: config.max_memory,
            eviction_threshold: config.eviction_threshold,
            node_id: NodeId::new(config.node_id),
        };

        let backend: Box<dyn hyperkv_storage::StorageBackend> = Box::new(MemoryBackend::new());
        let eviction = EvictionEngine::with_batch_size(eviction_policy, config.eviction_batch_size);
        let mut keyspace = Keyspace::new(backend, eviction, keyspace_config);

        let snapshot_store = if config.snapshot_enabled {
            let store = SnapshotStore::new(config.data_dir.join("snapshots"), config.snapshot_retention, config.snapshot_compression);
            if let Some(loaded) = store.load_latest()? {
                for (key, raw) in loaded.entries {
                    keyspace.restore_raw(key, raw, Timestamp::now())?;
                }
            }
            Some(store)
        } else {
            None
        };

        if config.aof_enabled {
            let append_log_path = config.data_dir.join("appendonly.log");
            let fsync_policy = match config.aof_fsync_policy.as_str() {
                "always" => FsyncPolicy::Always,
                "no" => FsyncPolicy::No,
                _ => FsyncPolicy::EverySec,
            };
            let now = Timestamp::now();
            let mut replay_error = None;
            AppendLog::replay(&append_log_path, |command| {
                if replay_error.is_some() {
                    return;
                }
                if let Err(e) = keyspace.apply_log_command(command, now) {
                    tracing::error!(error = %e, "append-log replay failed on a corrupted or invalid record");
                    replay_error = Some(e);
                }
            })?;
            if let Some(e) = replay_error {
                return Err(HyperkvError::from(e));
            }
            let log = AppendLog::open(&append_log_path, fsync_policy)?;
            keyspace = keyspace.with_append_log(log);
        }

        Ok(Self {
            inner: Arc::new(Mutex::new(Inner { keyspace, snapshot_store })),
        })
    }

    /// Reads a key's current value.
    pub fn get(&self, key: impl Into<Key>) -> Result<Option<Bytes>> {
        let mut inner = self.lock();
        inner.keyspace.get(&key.into(), Timestamp::now()).map_err(HyperkvError::from)
    }

    /// Batched `get` over several keys.
    pub fn mget(&self, keys: &[Key]) -> Result<Vec<Option<Bytes>>> {
        let mut inner = self.lock();
        inner.keyspace.mget(keys, Timestamp::now()).map_err(HyperkvError::from)
    }

    /// Sets `key` to `value`, returning whether the write took effect (a
    /// failed `NX`/`XX` precondition returns `false` rather than erroring).
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Bytes>, options: SetOptions) -> Result<bool> {
        let mut inner = self.lock();
        inner.keyspace.set(key.into(), value.into(), options, Timestamp::now()).map_err(HyperkvError::from)
    }

    /// Deletes the given keys, returning how many existed.
    pub fn del(&self, keys: &[Key]) -> usize {
        let mut inner = self.lock();
        inner.keyspace.del(keys, Timestamp::now())
    }

    /// Counts how many of the given keys currently exist.
    pub fn exists(&self, keys: &[Key]) -> usize {
        let mut inner = self.lock();
        inner.keyspace.exists(keys, Timestamp::now())
    }

    /// Sets a TTL in seconds. A non-positive value deletes the key
    /// immediately. Returns whether the key existed.
    pub fn expire(&self, key: &Key, seconds: i64) -> bool {
        let mut inner = self.lock();
        inner.keyspace.expire(key, seconds, Timestamp::now())
    }

    /// Remaining TTL in seconds, `-1` if persistent, `-2` if absent.
    pub fn ttl(&self, key: &Key) -> i64 {
        let mut inner = self.lock();
        inner.keyspace.ttl(key, Timestamp::now())
    }

    /// Clears a key's TTL. Returns whether the key existed and had one.
    pub fn persist(&self, key: &Key) -> bool {
        let mut inner = self.lock();
        inner.keyspace.persist(key, Timestamp::now())
    }

    /// All keys matching a glob pattern. O(n) full scan, matching the
    /// network daemon's `KEYS` command.
    pub fn keys(&self, pattern: &[u8]) -> Vec<Key> {
        self.lock().keyspace.keys(pattern)
    }

    /// Cursor-based scan, matching the network daemon's `SCAN` command.
    pub fn scan(&self, cursor: u64, pattern: Option<&[u8]>, count: usize) -> (u64, Vec<Key>) {
        self.lock().keyspace.scan(cursor, pattern, count)
    }

    /// Removes every key.
    pub fn flushdb(&self) {
        self.lock().keyspace.flushdb(Timestamp::now());
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.lock().keyspace.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().keyspace.is_empty()
    }

    /// Bytes of payload currently tracked against the memory budget.
    pub fn used_memory(&self) -> usize {
        self.lock().keyspace.used_memory()
    }

    /// Writes a snapshot of the current keyspace. Requires
    /// `HyperkvConfig::with_snapshots` to have been used at open time.
    pub fn snapshot(&self) -> Result<PathBuf> {
        let mut inner = self.lock();
        let entries = inner.keyspace.iter_raw();
        let now = Timestamp::now();
        let store = inner.snapshot_store.as_ref().ok_or_else(|| HyperkvError::Config("snapshots are not enabled for this keyspace".to_string()))?;
        let metadata = serde_json::json!({ "reason": "manual" });
        store.create(&entries, metadata, now).map_err(HyperkvError::from)
    }

    /// Fsyncs the append log, if one is attached. A no-op otherwise.
    pub fn fsync(&self) -> Result<()> {
        self.lock().keyspace.fsync_append_log().map_err(HyperkvError::from)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_roundtrips_get_and_set() {
        let kv = Hyperkv::in_memory().expect("in_memory");
        assert_eq!(kv.get("missing").unwrap(), None);

        assert!(kv.set("k", "v", SetOptions::default()).unwrap());
        assert_eq!(kv.get("k").unwrap().as_deref(), Some(&b"v"[..]));
        assert_eq!(kv.len(), 1);
    }

    #[test]
    fn clone_shares_the_same_keyspace() {
        let kv = Hyperkv::in_memory().expect("in_memory");
        let clone = kv.clone();
        kv.set("k", "v", SetOptions::default()).unwrap();
        assert_eq!(clone.get("k").unwrap().as_deref(), Some(&b"v"[..]));
    }

    #[test]
    fn ttl_and_persist_round_trip() {
        let kv = Hyperkv::in_memory().expect("in_memory");
        kv.set("k", "v", SetOptions::default()).unwrap();
        assert_eq!(kv.ttl(&"k".into()), -1);

        assert!(kv.expire(&"k".into(), 100));
        assert!(kv.ttl(&"k".into()) > 0);

        assert!(kv.persist(&"k".into()));
        assert_eq!(kv.ttl(&"k".into()), -1);
    }

    #[test]
    fn expire_with_non_positive_seconds_deletes_the_key() {
        let kv = Hyperkv::in_memory().expect("in_memory");
        kv.set("k", "v", SetOptions::default()).unwrap();
        assert!(kv.expire(&"k".into(), 0));
        assert_eq!(kv.get("k").unwrap(), None);
    }

    #[test]
    fn flushdb_clears_everything() {
        let kv = Hyperkv::in_memory().expect("in_memory");
        kv.set("a", "1", SetOptions::default()).unwrap();
        kv.set("b", "2", SetOptions::default()).unwrap();
        kv.flushdb();
        assert!(kv.is_empty());
    }

    #[test]
    fn unknown_eviction_policy_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = HyperkvConfig::new(dir.path()).with_eviction_policy("not-a-policy");
        let err = Hyperkv::open_with_config(config).unwrap_err();
        assert!(matches!(err, HyperkvError::Config(_)));
    }

    #[test]
    fn snapshot_requires_opt_in() {
        let kv = Hyperkv::in_memory().expect("in_memory");
        let err = kv.snapshot().unwrap_err();
        assert!(matches!(err, HyperkvError::Config(_)));
    }

    #[test]
    fn snapshot_and_reopen_restores_data() {
        let dir = tempfile::tempdir().unwrap();
        let config = HyperkvConfig::new(dir.path()).with_snapshots(false, 3);
        let kv = Hyperkv::open_with_config(config.clone()).expect("open");
        kv.set("k", "v", SetOptions::default()).unwrap();
        kv.snapshot().expect("snapshot");
        drop(kv);

        let reopened = Hyperkv::open_with_config(config).expect("reopen");
        assert_eq!(reopened.get("k").unwrap().as_deref(), Some(&b"v"[..]));
    }

    #[test]
    fn aof_replay_restores_writes_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = HyperkvConfig::new(dir.path()).with_aof("always");
        let kv = Hyperkv::open_with_config(config.clone()).expect("open");
        kv.set("k", "v", SetOptions::default()).unwrap();
        drop(kv);

        let reopened = Hyperkv::open_with_config(config).expect("reopen");
        assert_eq!(reopened.get("k").unwrap().as_deref(), Some(&b"v"[..]));
    }

    #[test]
    fn corrupted_replay_record_aborts_open() {
        use hyperkv_storage::LogCommand;

        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("appendonly.log");
        let mut log = AppendLog::open(&log_path, FsyncPolicy::Always).expect("open append log");
        log.append(&LogCommand::crdt_merge(b"k", b"not valid json"), Timestamp::from_nanos(1))
            .expect("seed a bad record");
        drop(log);

        let config = HyperkvConfig::new(dir.path()).with_aof("always");
        let err = Hyperkv::open_with_config(config).unwrap_err();
        assert!(matches!(err, HyperkvError::Keyspace(_)));
    }
}

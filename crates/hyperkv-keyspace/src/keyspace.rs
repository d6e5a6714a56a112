//! Keyspace core: ties the storage backend, TTL index, eviction engine, and
//! CRDT merge dispatcher together behind the command vocabulary the
//! dispatcher consumes.

use std::collections::HashMap;

use bytes::Bytes;
use hyperkv_crdt::{HlcClock, Value};
use hyperkv_storage::{AppendLog, LogCommand, StorageBackend};
use hyperkv_types::{CrdtKind, Key, KeyMetadata, NodeId, Timestamp};

use crate::eviction::{AccessInfo, EvictionEngine};
use crate::error::{KeyspaceError, KeyspaceResult};
use crate::ttl::TtlIndex;

/// Keyspace-change notifications. Always emitted; a server with no
/// subscribers simply has no sink wired in, so the call is a no-op.
///
/// Implemented by the pub/sub layer and injected at construction time,
/// keeping this crate free of any dependency on it.
pub trait NotificationSink: Send {
    fn notify(&mut self, event: KeyspaceEvent, key: &Key);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyspaceEvent {
    Set,
    Del,
    Expired,
    Evicted,
}

impl KeyspaceEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            KeyspaceEvent::Set => "set",
            KeyspaceEvent::Del => "del",
            KeyspaceEvent::Expired => "expired",
            KeyspaceEvent::Evicted => "evicted",
        }
    }
}

/// Options accepted by `SET`.
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    pub nx: bool,
    pub xx: bool,
    pub ttl: Option<Timestamp>,
    pub crdt: Option<CrdtKind>,
}

pub struct KeyspaceConfig {
    pub max_memory: usize,
    pub eviction_threshold: f64,
    pub node_id: NodeId,
}

impl Default for KeyspaceConfig {
    fn default() -> Self {
        Self {
            max_memory: 0,
            eviction_threshold: 0.9,
            node_id: NodeId::new(0),
        }
    }
}

/// The live keyspace: primary map (via the storage backend), TTL index,
/// eviction bookkeeping, and append-log recording.
pub struct Keyspace {
    backend: Box<dyn StorageBackend>,
    metadata: HashMap<Key, KeyMetadata>,
    ttl: TtlIndex,
    eviction: EvictionEngine,
    append_log: Option<AppendLog>,
    notifications: Option<Box<dyn NotificationSink>>,
    config: KeyspaceConfig,
    used_memory: usize,
    hlc: HlcClock,
}

impl Keyspace {
    pub fn new(backend: Box<dyn StorageBackend>, eviction: EvictionEngine, config: KeyspaceConfig) -> Self {
        let hlc = HlcClock::new(config.node_id);
        Self {
            backend,
            metadata: HashMap::new(),
            ttl: TtlIndex::new(),
            eviction,
            append_log: None,
            notifications: None,
            config,
            used_memory: 0,
            hlc,
        }
    }

    pub fn with_append_log(mut self, log: AppendLog) -> Self {
        self.append_log = Some(log);
        self
    }

    pub fn with_notifications(mut self, sink: Box<dyn NotificationSink>) -> Self {
        self.notifications = Some(sink);
        self
    }

    pub fn used_memory(&self) -> usize {
        self.used_memory
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    fn notify(&mut self, event: KeyspaceEvent, key: &Key) {
        if let Some(sink) = &mut self.notifications {
            sink.notify(event, key);
        }
    }

    fn log(&mut self, command: LogCommand, now: Timestamp) {
        if let Some(log) = &mut self.append_log {
            if let Err(err) = log.append(&command, now) {
                tracing::warn!(error = %err, "failed to append to the command log");
            }
        }
    }

    /// Drops a key from every structure: backend, metadata, TTL index, and
    /// eviction bookkeeping.
    fn purge(&mut self, key: &Key) {
        self.backend.delete(key);
        if let Some(meta) = self.metadata.remove(key) {
            self.used_memory = self.used_memory.saturating_sub(meta.size_bytes);
        }
        self.ttl.remove_ttl(key);
        self.eviction.forget(key);
    }

    /// Lazy-expires `key` if it has a passed TTL. Returns whether it was
    /// expired (and therefore no longer present).
    fn lazy_expire(&mut self, key: &Key, now: Timestamp) -> bool {
        let expired = self.metadata.get(key).is_some_and(|meta| meta.is_expired(now));
        if expired {
            self.purge(key);
            self.notify(KeyspaceEvent::Expired, key);
        }
        expired
    }

    fn decode_value(&self, _key: &Key, raw: Bytes) -> KeyspaceResult<Value> {
        serde_json::from_slice(&raw).map_err(KeyspaceError::Codec)
    }

    fn encode_value(value: &Value) -> Bytes {
        Bytes::from(serde_json::to_vec(value).expect("Value always serializes"))
    }

    /// `GET k`: the primitive projection of whatever value kind `k` holds.
    pub fn get(&mut self, key: &Key, now: Timestamp) -> KeyspaceResult<Option<Bytes>> {
        if self.lazy_expire(key, now) {
            return Ok(None);
        }
        let Some(raw) = self.backend.get(key) else {
            return Ok(None);
        };
        let value = self.decode_value(key, raw)?;
        if let Some(meta) = self.metadata.get_mut(key) {
            meta.touch(now);
        }
        self.eviction.touch(key);
        Ok(Some(value.project()))
    }

    pub fn mget(&mut self, keys: &[Key], now: Timestamp) -> KeyspaceResult<Vec<Option<Bytes>>> {
        keys.iter().map(|k| self.get(k, now)).collect()
    }

    /// `SET k v [options]`. Returns `true` if the write happened, `false`
    /// if an `NX`/`XX` condition suppressed it.
    pub fn set(&mut self, key: Key, payload: Bytes, options: SetOptions, now: Timestamp) -> KeyspaceResult<bool> {
        self.lazy_expire(&key, now);
        let exists = self.backend.exists(&key);
        if (options.nx && exists) || (options.xx && !exists) {
            return Ok(false);
        }

        let kind = options.crdt.unwrap_or(CrdtKind::Plain);
        let value = match kind {
            CrdtKind::Plain => Value::Plain(payload.clone()),
            CrdtKind::Lww => {
                let hlc = self.hlc.tick_at(now);
                Value::Lww(hyperkv_crdt::LwwRegister::new(payload.clone(), hlc))
            }
            CrdtKind::OrSet => {
                let mut set = hyperkv_crdt::OrSet::new();
                set.add(payload.clone(), self.config.node_id, 0);
                Value::OrSet(set)
            }
            CrdtKind::Counter => {
                let mut counter = hyperkv_crdt::GCounter::new();
                if let Ok(amount) = std::str::from_utf8(&payload).unwrap_or("0").parse::<u64>() {
                    counter.increment_by(self.config.node_id, amount);
                }
                Value::Counter(counter)
            }
        };

        let encoded = Self::encode_value(&value);
        let size = encoded.len();
        self.backend.put(key.clone(), encoded);

        let meta = self.metadata.entry(key.clone()).or_insert_with(|| KeyMetadata::new(now, size, kind));
        meta.size_bytes = size;
        meta.crdt_kind = kind;
        meta.touch(now);
        self.used_memory = self.used_memory.saturating_add(size);

        if let Some(deadline) = options.ttl {
            meta.ttl = Some(deadline);
            self.ttl.set_ttl(key.clone(), deadline);
            self.log(LogCommand::expire(&key, deadline), now);
        } else {
            meta.ttl = None;
            self.ttl.remove_ttl(&key);
        }

        self.eviction.touch(&key);
        self.log(LogCommand::set(&key, &payload), now);
        self.notify(KeyspaceEvent::Set, &key);
        self.maybe_evict(now);
        Ok(true)
    }

    /// Applies an inbound CRDT merge record (from replication).
    pub fn crdt_merge(&mut self, key: Key, incoming: Value, now: Timestamp) -> KeyspaceResult<()> {
        self.lazy_expire(&key, now);
        let merged = match self.backend.get(&key) {
            Some(raw) => {
                let mut current = self.decode_value(&key, raw)?;
                current.merge(&incoming)?;
                current
            }
            None => incoming,
        };

        let encoded = Self::encode_value(&merged);
        let size = encoded.len();
        let kind = merged.kind();
        self.backend.put(key.clone(), encoded.clone());

        let meta = self.metadata.entry(key.clone()).or_insert_with(|| KeyMetadata::new(now, size, kind));
        self.used_memory = self.used_memory.saturating_sub(meta.size_bytes) + size;
        meta.size_bytes = size;
        meta.crdt_kind = kind;
        meta.touch(now);

        self.eviction.touch(&key);
        self.log(LogCommand::crdt_merge(&key, &encoded), now);
        self.notify(KeyspaceEvent::Set, &key);
        Ok(())
    }

    pub fn del(&mut self, keys: &[Key], now: Timestamp) -> usize {
        let mut removed = 0;
        for key in keys {
            if self.lazy_expire(key, now) {
                continue;
            }
            if self.backend.exists(key) {
                self.purge(key);
                self.log(LogCommand::del(key), now);
                self.notify(KeyspaceEvent::Del, key);
                removed += 1;
            }
        }
        removed
    }

    pub fn exists(&mut self, keys: &[Key], now: Timestamp) -> usize {
        keys.iter()
            .filter(|key| !self.lazy_expire(key, now) && self.backend.exists(key))
            .count()
    }

    /// `EXPIRE k seconds`. A non-positive `seconds` deletes the key
    /// immediately. Returns whether a TTL (or deletion) was applied.
    pub fn expire(&mut self, key: &Key, seconds: i64, now: Timestamp) -> bool {
        if self.lazy_expire(key, now) || !self.backend.exists(key) {
            return false;
        }
        if seconds <= 0 {
            self.purge(key);
            self.log(LogCommand::del(key), now);
            self.notify(KeyspaceEvent::Del, key);
            return true;
        }
        let deadline = now.plus_secs(seconds);
        if let Some(meta) = self.metadata.get_mut(key) {
            meta.ttl = Some(deadline);
        }
        self.ttl.set_ttl(key.clone(), deadline);
        self.log(LogCommand::expire(key, deadline), now);
        true
    }

    /// `TTL k`: remaining seconds, `-1` if no TTL, `-2` if the key is missing.
    pub fn ttl(&mut self, key: &Key, now: Timestamp) -> i64 {
        if self.lazy_expire(key, now) || !self.backend.exists(key) {
            return -2;
        }
        match self.metadata.get(key).and_then(|meta| meta.ttl) {
            Some(deadline) => deadline.remaining_secs(now).max(0),
            None => -1,
        }
    }

    /// `PERSIST k`: removes a TTL. Returns whether one was removed.
    pub fn persist(&mut self, key: &Key, now: Timestamp) -> bool {
        if self.lazy_expire(key, now) {
            return false;
        }
        let had_ttl = self.metadata.get(key).is_some_and(|meta| meta.ttl.is_some());
        if had_ttl {
            if let Some(meta) = self.metadata.get_mut(key) {
                meta.ttl = None;
            }
            self.ttl.remove_ttl(key);
            self.log(LogCommand::persist(key), now);
        }
        had_ttl
    }

    /// `KEYS pattern`: a full scan, discouraged for large keyspaces.
    pub fn keys(&self, pattern: &[u8]) -> Vec<Key> {
        self.metadata
            .keys()
            .filter(|key| hyperkv_storage::glob_matches(pattern, key))
            .cloned()
            .collect()
    }

    /// `SCAN cursor [MATCH pattern] [COUNT count]`.
    pub fn scan(&self, cursor: u64, pattern: Option<&[u8]>, count: usize) -> (u64, Vec<Key>) {
        self.backend.scan_from(cursor, pattern, count.max(1))
    }

    pub fn flushdb(&mut self, now: Timestamp) {
        self.backend.clear();
        self.metadata.clear();
        self.ttl = TtlIndex::new();
        self.eviction = EvictionEngine::with_batch_size(self.eviction.policy(), self.eviction.batch_size());
        self.used_memory = 0;
        self.log(LogCommand::Clear, now);
    }

    /// Active expiration: sweeps the TTL index and purges everything it
    /// reports, firing `expired` notifications. Called periodically by the
    /// server's TTL sweeper task.
    pub fn sweep_expired(&mut self, now: Timestamp, budget: usize) -> Vec<Key> {
        let expired = self.ttl.sweep(now, budget);
        for key in &expired {
            self.backend.delete(key);
            if let Some(meta) = self.metadata.remove(key) {
                self.used_memory = self.used_memory.saturating_sub(meta.size_bytes);
            }
            self.eviction.forget(key);
            self.notify(KeyspaceEvent::Expired, key);
        }
        expired
    }

    /// Runs eviction batches until memory usage falls back under
    /// `threshold * max_memory`, or there is nothing left to evict.
    ///
    /// A `max_memory` of `0` disables eviction entirely.
    fn maybe_evict(&mut self, now: Timestamp) {
        if self.config.max_memory == 0 {
            return;
        }
        let limit = (self.config.max_memory as f64 * self.config.eviction_threshold) as usize;
        while self.used_memory > limit {
            let access_info: HashMap<Key, AccessInfo> = self
                .metadata
                .iter()
                .map(|(k, meta)| {
                    (
                        k.clone(),
                        AccessInfo {
                            access_count: meta.access_count(),
                            has_ttl: meta.ttl.is_some(),
                        },
                    )
                })
                .collect();
            if access_info.is_empty() {
                break;
            }
            let victims = self.eviction.select_victims(&access_info);
            if victims.is_empty() {
                break;
            }
            for key in victims {
                self.purge(&key);
                self.log(LogCommand::del(&key), now);
                self.notify(KeyspaceEvent::Evicted, &key);
            }
        }
    }

    /// Returns `Err(KeyspaceError::Oom)` if a write of `additional_bytes`
    /// would exceed `max_memory` even after eviction. Call before
    /// performing a write whose size is known ahead of time.
    pub fn check_oom(&mut self, additional_bytes: usize, now: Timestamp) -> KeyspaceResult<()> {
        if self.config.max_memory == 0 {
            return Ok(());
        }
        self.maybe_evict(now);
        if self.used_memory + additional_bytes > self.config.max_memory {
            Err(KeyspaceError::Oom)
        } else {
            Ok(())
        }
    }

    /// Rebuilds the keyspace from a replayed append-log command. Used at
    /// startup; does not re-record to the log or fire notifications.
    pub fn apply_log_command(&mut self, command: LogCommand, now: Timestamp) -> KeyspaceResult<()> {
        match command {
            LogCommand::Set { .. } => {
                if let (Some(key), Some(value)) = (command.key_bytes(), command.value_bytes()) {
                    let value = Value::Plain(value);
                    let encoded = Self::encode_value(&value);
                    let size = encoded.len();
                    self.backend.put(key.clone(), encoded);
                    let meta = self
                        .metadata
                        .entry(key)
                        .or_insert_with(|| KeyMetadata::new(now, size, CrdtKind::Plain));
                    meta.size_bytes = size;
                    self.used_memory = self.used_memory.saturating_add(size);
                }
            }
            LogCommand::Del { .. } => {
                if let Some(key) = command.key_bytes() {
                    self.purge(&key);
                }
            }
            LogCommand::Expire { deadline_nanos, .. } => {
                if let Some(key) = command.key_bytes() {
                    let deadline = Timestamp::from_nanos(deadline_nanos);
                    if let Some(meta) = self.metadata.get_mut(&key) {
                        meta.ttl = Some(deadline);
                    }
                    self.ttl.set_ttl(key, deadline);
                }
            }
            LogCommand::Persist { .. } => {
                if let Some(key) = command.key_bytes() {
                    if let Some(meta) = self.metadata.get_mut(&key) {
                        meta.ttl = None;
                    }
                    self.ttl.remove_ttl(&key);
                }
            }
            LogCommand::Clear => {
                self.backend.clear();
                self.metadata.clear();
                self.ttl = TtlIndex::new();
                self.used_memory = 0;
            }
            LogCommand::CrdtMerge { .. } => {
                if let (Some(key), Some(payload)) = (command.key_bytes(), command.value_bytes()) {
                    let incoming: Value =
                        serde_json::from_slice(&payload).map_err(KeyspaceError::Codec)?;
                    self.crdt_merge(key, incoming, now)?;
                }
            }
        }
        Ok(())
    }

    /// Enumerates every live key/raw-value pair, for snapshotting. The raw
    /// bytes are the encoded `Value`, opaque to the caller.
    pub fn iter_raw(&self) -> Vec<(Key, Bytes)> {
        self.backend.iter_all()
    }

    /// Fsyncs the append log, if one is attached. Called on a 1 Hz driver
    /// under `FsyncPolicy::EverySec`; a no-op under `Always` (already
    /// synced per-append) or `No`.
    pub fn fsync_append_log(&mut self) -> KeyspaceResult<()> {
        if let Some(log) = &mut self.append_log {
            log.fsync()?;
        }
        Ok(())
    }

    /// Restores one entry from a loaded snapshot: `raw` is the already
    /// encoded `Value` as produced by `iter_raw`. Used at startup; does not
    /// re-record to the log or fire notifications.
    pub fn restore_raw(&mut self, key: Key, raw: Bytes, now: Timestamp) -> KeyspaceResult<()> {
        let value = self.decode_value(&key, raw.clone())?;
        let size = raw.len();
        let kind = value.kind();
        self.backend.put(key.clone(), raw);
        let meta = self.metadata.entry(key).or_insert_with(|| KeyMetadata::new(now, size, kind));
        meta.size_bytes = size;
        meta.crdt_kind = kind;
        self.used_memory = self.used_memory.saturating_add(size);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyperkv_storage::MemoryBackend;

    fn keyspace() -> Keyspace {
        Keyspace::new(
            Box::new(MemoryBackend::new()),
            EvictionEngine::new(crate::eviction::EvictionPolicy::Lru),
            KeyspaceConfig::default(),
        )
    }

    fn key(s: &str) -> Key {
        Key::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn set_then_get_roundtrips_plain_value() {
        let mut ks = keyspace();
        let now = Timestamp::from_nanos(1);
        ks.set(key("foo"), Bytes::from_static(b"bar"), SetOptions::default(), now).unwrap();
        assert_eq!(ks.get(&key("foo"), now).unwrap(), Some(Bytes::from_static(b"bar")));
    }

    #[test]
    fn del_then_get_returns_none() {
        let mut ks = keyspace();
        let now = Timestamp::from_nanos(1);
        ks.set(key("foo"), Bytes::from_static(b"bar"), SetOptions::default(), now).unwrap();
        assert_eq!(ks.del(&[key("foo")], now), 1);
        assert_eq!(ks.get(&key("foo"), now).unwrap(), None);
        assert_eq!(ks.del(&[key("foo")], now), 0);
    }

    #[test]
    fn nx_suppresses_overwrite_of_existing_key() {
        let mut ks = keyspace();
        let now = Timestamp::from_nanos(1);
        ks.set(key("foo"), Bytes::from_static(b"1"), SetOptions::default(), now).unwrap();
        let options = SetOptions { nx: true, ..Default::default() };
        let applied = ks.set(key("foo"), Bytes::from_static(b"2"), options, now).unwrap();
        assert!(!applied);
        assert_eq!(ks.get(&key("foo"), now).unwrap(), Some(Bytes::from_static(b"1")));
    }

    #[test]
    fn xx_suppresses_write_to_missing_key() {
        let mut ks = keyspace();
        let now = Timestamp::from_nanos(1);
        let options = SetOptions { xx: true, ..Default::default() };
        let applied = ks.set(key("foo"), Bytes::from_static(b"1"), options, now).unwrap();
        assert!(!applied);
        assert_eq!(ks.get(&key("foo"), now).unwrap(), None);
    }

    #[test]
    fn expire_then_ttl_reports_remaining_seconds() {
        let mut ks = keyspace();
        let now = Timestamp::from_nanos(0);
        ks.set(key("foo"), Bytes::from_static(b"bar"), SetOptions::default(), now).unwrap();
        assert!(ks.expire(&key("foo"), 10, now));
        let remaining = ks.ttl(&key("foo"), now);
        assert!((9..=10).contains(&remaining));
    }

    #[test]
    fn ttl_reports_minus_two_for_missing_key() {
        let mut ks = keyspace();
        assert_eq!(ks.ttl(&key("missing"), Timestamp::from_nanos(0)), -2);
    }

    #[test]
    fn ttl_reports_minus_one_with_no_expiry() {
        let mut ks = keyspace();
        let now = Timestamp::from_nanos(0);
        ks.set(key("foo"), Bytes::from_static(b"bar"), SetOptions::default(), now).unwrap();
        assert_eq!(ks.ttl(&key("foo"), now), -1);
    }

    #[test]
    fn expire_with_nonpositive_seconds_deletes_immediately() {
        let mut ks = keyspace();
        let now = Timestamp::from_nanos(0);
        ks.set(key("foo"), Bytes::from_static(b"bar"), SetOptions::default(), now).unwrap();
        assert!(ks.expire(&key("foo"), 0, now));
        assert_eq!(ks.get(&key("foo"), now).unwrap(), None);
    }

    #[test]
    fn persist_removes_ttl() {
        let mut ks = keyspace();
        let now = Timestamp::from_nanos(0);
        ks.set(key("foo"), Bytes::from_static(b"bar"), SetOptions::default(), now).unwrap();
        ks.expire(&key("foo"), 10, now);
        assert!(ks.persist(&key("foo"), now));
        assert_eq!(ks.ttl(&key("foo"), now), -1);
    }

    #[test]
    fn lazy_expiry_drops_key_on_get_after_deadline() {
        let mut ks = keyspace();
        let now = Timestamp::from_nanos(0);
        let options = SetOptions { ttl: Some(now.plus_secs(1)), ..Default::default() };
        ks.set(key("foo"), Bytes::from_static(b"bar"), options, now).unwrap();
        let later = now.plus_secs(2);
        assert_eq!(ks.get(&key("foo"), later).unwrap(), None);
    }

    #[test]
    fn active_sweep_reports_expired_keys() {
        let mut ks = keyspace();
        let now = Timestamp::from_nanos(0);
        let options = SetOptions { ttl: Some(now.plus_secs(1)), ..Default::default() };
        ks.set(key("foo"), Bytes::from_static(b"bar"), options, now).unwrap();
        let expired = ks.sweep_expired(now.plus_secs(2), 16);
        assert_eq!(expired, vec![key("foo")]);
        assert!(ks.is_empty());
    }

    #[test]
    fn flushdb_clears_everything() {
        let mut ks = keyspace();
        let now = Timestamp::from_nanos(0);
        ks.set(key("a"), Bytes::from_static(b"1"), SetOptions::default(), now).unwrap();
        ks.set(key("b"), Bytes::from_static(b"2"), SetOptions::default(), now).unwrap();
        ks.flushdb(now);
        assert!(ks.is_empty());
        assert_eq!(ks.used_memory(), 0);
    }

    #[test]
    fn crdt_counter_set_and_merge_accumulate() {
        let mut ks = keyspace();
        let now = Timestamp::from_nanos(0);
        let options = SetOptions { crdt: Some(CrdtKind::Counter), ..Default::default() };
        ks.set(key("views"), Bytes::from_static(b"3"), options, now).unwrap();

        let mut incoming = hyperkv_crdt::GCounter::new();
        incoming.increment_by(NodeId::new(9), 4);
        ks.crdt_merge(key("views"), Value::Counter(incoming), now).unwrap();

        let projected = ks.get(&key("views"), now).unwrap().unwrap();
        let total: u64 = std::str::from_utf8(&projected).unwrap().parse().unwrap();
        assert_eq!(total, 7);
    }

    #[test]
    fn keys_matches_glob_pattern() {
        let mut ks = keyspace();
        let now = Timestamp::from_nanos(0);
        ks.set(key("user:1"), Bytes::from_static(b"a"), SetOptions::default(), now).unwrap();
        ks.set(key("user:2"), Bytes::from_static(b"b"), SetOptions::default(), now).unwrap();
        ks.set(key("other"), Bytes::from_static(b"c"), SetOptions::default(), now).unwrap();
        let mut matched = ks.keys(b"user:*");
        matched.sort();
        assert_eq!(matched, vec![key("user:1"), key("user:2")]);
    }

    #[test]
    fn oom_rejected_when_max_memory_is_exceeded_and_keyspace_is_empty() {
        let mut ks = Keyspace::new(
            Box::new(MemoryBackend::new()),
            EvictionEngine::new(crate::eviction::EvictionPolicy::Lru),
            KeyspaceConfig { max_memory: 4, eviction_threshold: 0.9, node_id: NodeId::new(0) },
        );
        let now = Timestamp::from_nanos(0);
        let result = ks.check_oom(100, now);
        assert!(matches!(result, Err(KeyspaceError::Oom)));
    }
}

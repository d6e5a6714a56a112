//! Point-in-time snapshot store.
//!
//! A snapshot is a serialized image of the keyspace plus metadata, written
//! atomically (temp file + rename) under `snapshot_<unix_ts>[.gz]`.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use hyperkv_types::{Key, Timestamp};
use serde::{Deserialize, Serialize};

use crate::{StorageError, StorageResult};

const FILENAME_PREFIX: &str = "snapshot_";
const GZ_SUFFIX: &str = ".gz";

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEnvelope {
    timestamp_nanos: u64,
    data: Vec<(String, String)>,
    metadata: serde_json::Value,
}

/// A loaded snapshot: the keyspace entries and the metadata blob stored
/// alongside them.
#[derive(Debug, Clone)]
pub struct LoadedSnapshot {
    pub timestamp: Timestamp,
    pub entries: Vec<(Key, Bytes)>,
    pub metadata: serde_json::Value,
}

/// Manages the on-disk snapshot directory: creation, loading, listing, and
/// retention.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
    retention: usize,
    compress: bool,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>, retention: usize, compress: bool) -> Self {
        Self {
            dir: dir.into(),
            retention,
            compress,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Serializes `entries` plus `metadata` and writes them atomically as a
    /// new snapshot, then prunes old snapshots beyond the retention count.
    #[tracing::instrument(skip_all, fields(entries = entries.len()))]
    pub fn create(
        &self,
        entries: &[(Key, Bytes)],
        metadata: serde_json::Value,
        now: Timestamp,
    ) -> StorageResult<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let envelope = SnapshotEnvelope {
            timestamp_nanos: now.as_nanos(),
            data: entries
                .iter()
                .map(|(k, v)| (BASE64.encode(k), BASE64.encode(v)))
                .collect(),
            metadata,
        };
        let json = serde_json::to_vec(&envelope).map_err(StorageError::Encode)?;

        let filename = if self.compress {
            format!("{FILENAME_PREFIX}{}{GZ_SUFFIX}", now.as_secs())
        } else {
            format!("{FILENAME_PREFIX}{}", now.as_secs())
        };
        let final_path = self.dir.join(&filename);
        let tmp_path = self.dir.join(format!("{filename}.tmp"));

        if self.compress {
            let file = File::create(&tmp_path)?;
            let mut encoder = GzEncoder::new(file, Compression::default());
            encoder.write_all(&json)?;
            encoder.finish()?;
        } else {
            fs::write(&tmp_path, &json)?;
        }
        fs::rename(&tmp_path, &final_path)?;

        tracing::info!(path = %final_path.display(), "created snapshot");
        self.cleanup_old_snapshots()?;
        Ok(final_path)
    }

    /// Loads the most recently created snapshot, if any exist.
    pub fn load_latest(&self) -> StorageResult<Option<LoadedSnapshot>> {
        match self.list_snapshots()?.last() {
            None => Ok(None),
            Some(path) => Ok(Some(self.load(path)?)),
        }
    }

    pub fn load(&self, path: &Path) -> StorageResult<LoadedSnapshot> {
        let raw = fs::read(path)?;
        let json = if path.to_string_lossy().ends_with(GZ_SUFFIX) {
            let mut decoder = GzDecoder::new(&raw[..]);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out)?;
            out
        } else {
            raw
        };

        let envelope: SnapshotEnvelope = serde_json::from_slice(&json).map_err(|source| {
            StorageError::Decode {
                line: 0,
                source,
            }
        })?;

        let entries = envelope
            .data
            .into_iter()
            .filter_map(|(k, v)| {
                let key = BASE64.decode(&k).ok()?;
                let value = BASE64.decode(&v).ok()?;
                Some((Key::from(key), Bytes::from(value)))
            })
            .collect();

        Ok(LoadedSnapshot {
            timestamp: Timestamp::from_nanos(envelope.timestamp_nanos),
            entries,
            metadata: envelope.metadata,
        })
    }

    /// Lists snapshot files in ascending timestamp order.
    pub fn list_snapshots(&self) -> StorageResult<Vec<PathBuf>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries: Vec<(u64, PathBuf)> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                let name = path.file_name()?.to_str()?.to_string();
                parse_snapshot_timestamp(&name).map(|ts| (ts, path))
            })
            .collect();
        entries.sort_by_key(|(ts, _)| *ts);
        Ok(entries.into_iter().map(|(_, path)| path).collect())
    }

    fn cleanup_old_snapshots(&self) -> StorageResult<()> {
        let snapshots = self.list_snapshots()?;
        if snapshots.len() <= self.retention {
            return Ok(());
        }
        let to_remove = snapshots.len() - self.retention;
        for path in &snapshots[..to_remove] {
            if let Err(err) = fs::remove_file(path) {
                tracing::warn!(path = %path.display(), error = %err, "failed to remove old snapshot");
            }
        }
        Ok(())
    }
}

fn parse_snapshot_timestamp(filename: &str) -> Option<u64> {
    let rest = filename.strip_prefix(FILENAME_PREFIX)?;
    let rest = rest.strip_suffix(GZ_SUFFIX).unwrap_or(rest);
    if rest.ends_with(".tmp") {
        return None;
    }
    rest.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_entries() -> Vec<(Key, Bytes)> {
        vec![
            (Key::from_static(b"a"), Bytes::from_static(b"1")),
            (Key::from_static(b"b"), Bytes::from_static(b"2")),
        ]
    }

    #[test]
    fn create_and_load_roundtrip_uncompressed() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), 3, false);
        let path = store
            .create(&sample_entries(), serde_json::json!({"fingerprint": "x"}), Timestamp::from_nanos(5_000_000_000))
            .unwrap();
        let loaded = store.load(&path).unwrap();
        assert_eq!(loaded.entries.len(), 2);
        assert_eq!(loaded.metadata["fingerprint"], "x");
    }

    #[test]
    fn create_and_load_roundtrip_gzip() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), 3, true);
        let path = store
            .create(&sample_entries(), serde_json::json!({}), Timestamp::from_nanos(1_000_000_000))
            .unwrap();
        assert!(path.to_string_lossy().ends_with(".gz"));
        let loaded = store.load(&path).unwrap();
        assert_eq!(loaded.entries.len(), 2);
    }

    #[test]
    fn retention_prunes_oldest_snapshots() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), 2, false);
        for secs in [1u64, 2, 3, 4] {
            store
                .create(&sample_entries(), serde_json::json!({}), Timestamp::from_nanos(secs * 1_000_000_000))
                .unwrap();
        }
        let remaining = store.list_snapshots().unwrap();
        assert_eq!(remaining.len(), 2);
    }

    #[test]
    fn load_latest_picks_newest() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), 5, false);
        store
            .create(&sample_entries(), serde_json::json!({"v": 1}), Timestamp::from_nanos(1_000_000_000))
            .unwrap();
        store
            .create(&[], serde_json::json!({"v": 2}), Timestamp::from_nanos(2_000_000_000))
            .unwrap();
        let latest = store.load_latest().unwrap().unwrap();
        assert_eq!(latest.metadata["v"], 2);
    }
}

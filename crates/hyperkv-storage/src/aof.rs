//! Append-only command log.
//!
//! Format: one record per line, `<timestamp_ns>|<json-encoded command>\n`.
//! Key and value payloads are base64-encoded since keys and values are
//! arbitrary byte strings and the envelope is UTF-8 text.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use hyperkv_types::Timestamp;
use serde::{Deserialize, Serialize};

use crate::{StorageError, StorageResult};

/// Durability policy controlling when append-log writes hit disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FsyncPolicy {
    /// `write` + `fsync` synchronously on every record.
    Always,
    /// `write` synchronously; a background task fsyncs at 1 Hz.
    #[default]
    EverySec,
    /// Rely on the OS to flush eventually.
    No,
}

fn encode(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

fn decode(s: &str) -> Result<Bytes, base64::DecodeError> {
    BASE64.decode(s).map(Bytes::from)
}

/// The closed vocabulary of mutating commands recorded in the append log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LogCommand {
    #[serde(rename = "SET")]
    Set { key: String, value: String },
    #[serde(rename = "DEL")]
    Del { key: String },
    #[serde(rename = "EXPIRE")]
    Expire { key: String, deadline_nanos: u64 },
    #[serde(rename = "PERSIST")]
    Persist { key: String },
    #[serde(rename = "CLEAR")]
    Clear,
    /// Opaque CRDT merge payload: the caller (the keyspace crate) is
    /// responsible for serializing/deserializing the CRDT value itself.
    #[serde(rename = "CRDT_MERGE")]
    CrdtMerge { key: String, payload: String },
}

impl LogCommand {
    pub fn set(key: &[u8], value: &[u8]) -> Self {
        Self::Set {
            key: encode(key),
            value: encode(value),
        }
    }

    pub fn del(key: &[u8]) -> Self {
        Self::Del { key: encode(key) }
    }

    pub fn expire(key: &[u8], deadline: Timestamp) -> Self {
        Self::Expire {
            key: encode(key),
            deadline_nanos: deadline.as_nanos(),
        }
    }

    pub fn persist(key: &[u8]) -> Self {
        Self::Persist { key: encode(key) }
    }

    pub fn crdt_merge(key: &[u8], payload: &[u8]) -> Self {
        Self::CrdtMerge {
            key: encode(key),
            payload: encode(payload),
        }
    }

    /// Decodes this command's base64 key field, if it has one.
    pub fn key_bytes(&self) -> Option<Bytes> {
        let encoded = match self {
            LogCommand::Set { key, .. }
            | LogCommand::Del { key }
            | LogCommand::Expire { key, .. }
            | LogCommand::Persist { key }
            | LogCommand::CrdtMerge { key, .. } => key,
            LogCommand::Clear => return None,
        };
        decode(encoded).ok()
    }

    pub fn value_bytes(&self) -> Option<Bytes> {
        match self {
            LogCommand::Set { value, .. } => decode(value).ok(),
            LogCommand::CrdtMerge { payload, .. } => decode(payload).ok(),
            _ => None,
        }
    }
}

/// Append-only log of mutating commands.
#[derive(Debug)]
pub struct AppendLog {
    path: PathBuf,
    file: File,
    policy: FsyncPolicy,
}

impl AppendLog {
    /// Opens (creating if absent) the log file at `path`.
    #[tracing::instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, policy: FsyncPolicy) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file, policy })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> FsyncPolicy {
        self.policy
    }

    /// Appends one command, applying the fsync policy.
    pub fn append(&mut self, command: &LogCommand, now: Timestamp) -> StorageResult<()> {
        let json = serde_json::to_string(command).map_err(StorageError::Encode)?;
        let line = format!("{}|{json}\n", now.as_nanos());
        self.file.write_all(line.as_bytes())?;
        if self.policy == FsyncPolicy::Always {
            self.file.sync_all()?;
        }
        Ok(())
    }

    /// Fsyncs the log. Called synchronously for `Always`; otherwise driven
    /// by a background 1 Hz task under `EverySec`.
    pub fn fsync(&mut self) -> StorageResult<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Replays every record in `path` in order, invoking `apply` for each.
    /// Records that fail to parse are logged and skipped rather than
    /// aborting the replay.
    #[tracing::instrument(skip(path, apply), fields(path = %path.as_ref().display()))]
    pub fn replay(
        path: impl AsRef<Path>,
        mut apply: impl FnMut(LogCommand),
    ) -> StorageResult<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(());
        }
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            match parse_record_line(&line) {
                Ok(command) => apply(command),
                Err(err) => {
                    tracing::warn!(line = line_no + 1, error = %err, "skipping unparsable append-log record");
                }
            }
        }
        Ok(())
    }

    /// Rewrites the log to contain exactly `commands`, atomically replacing
    /// the existing file, then reopens it for further appends.
    #[tracing::instrument(skip_all)]
    pub fn rewrite(&mut self, commands: impl Iterator<Item = LogCommand>, now: Timestamp) -> StorageResult<()> {
        let tmp_path = self.path.with_extension("rewrite.tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            for command in commands {
                let json = serde_json::to_string(&command).map_err(StorageError::Encode)?;
                writeln!(tmp, "{}|{json}", now.as_nanos())?;
            }
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        self.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        Ok(())
    }
}

fn parse_record_line(line: &str) -> StorageResult<LogCommand> {
    let (_ts, json) = line
        .split_once('|')
        .ok_or_else(|| StorageError::MalformedLine(line.to_string()))?;
    serde_json::from_str(json).map_err(|source| StorageError::Decode { line: 0, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn append_and_replay_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("appendonly.log");
        let mut log = AppendLog::open(&path, FsyncPolicy::Always).unwrap();
        log.append(&LogCommand::set(b"k", b"v"), Timestamp::from_nanos(1))
            .unwrap();
        log.append(&LogCommand::del(b"k"), Timestamp::from_nanos(2))
            .unwrap();

        let mut replayed = Vec::new();
        AppendLog::replay(&path, |cmd| replayed.push(cmd)).unwrap();
        assert_eq!(replayed.len(), 2);
        assert_eq!(replayed[0].key_bytes().unwrap(), Bytes::from_static(b"k"));
        assert_eq!(replayed[0].value_bytes().unwrap(), Bytes::from_static(b"v"));
    }

    #[test]
    fn replay_skips_malformed_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("appendonly.log");
        fs::write(&path, "not-a-valid-record\n1|{\"type\":\"CLEAR\"}\n").unwrap();

        let mut replayed = Vec::new();
        AppendLog::replay(&path, |cmd| replayed.push(cmd)).unwrap();
        assert_eq!(replayed, vec![LogCommand::Clear]);
    }

    #[test]
    fn rewrite_replaces_log_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("appendonly.log");
        let mut log = AppendLog::open(&path, FsyncPolicy::No).unwrap();
        log.append(&LogCommand::set(b"a", b"1"), Timestamp::from_nanos(1))
            .unwrap();
        log.append(&LogCommand::set(b"a", b"2"), Timestamp::from_nanos(2))
            .unwrap();

        log.rewrite(vec![LogCommand::set(b"a", b"2")].into_iter(), Timestamp::from_nanos(3))
            .unwrap();

        let mut replayed = Vec::new();
        AppendLog::replay(&path, |cmd| replayed.push(cmd)).unwrap();
        assert_eq!(replayed, vec![LogCommand::set(b"a", b"2")]);
    }
}

//! # hyperkv-types: core type definitions for `HyperKV`
//!
//! This crate contains shared types used across the `HyperKV` system:
//! - The key type ([`Key`]) and per-key bookkeeping ([`KeyMetadata`])
//! - Node identity ([`NodeId`]) for CRDT causal metadata
//! - Monotonic timestamps ([`Timestamp`]) used for TTL deadlines and HLC wall-time
//! - The CRDT type discriminant ([`CrdtKind`])

use std::fmt::{Debug, Display};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// An opaque key: an ordered sequence of octets, no case folding.
///
/// Keys are cheap to clone (`Bytes` is refcounted) and are the map key for
/// every data structure in the keyspace, TTL index, and eviction engine.
pub type Key = bytes::Bytes;

/// Unique identifier for a replica participating in CRDT merges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<NodeId> for u64 {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

/// A point in time, stored as nanoseconds since the Unix epoch.
///
/// Used both as a TTL deadline (monotonic wall clock) and as the wall-time
/// component of a [`crate`]-external Hybrid Logical Clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The Unix epoch (1970-01-01 00:00:00 UTC).
    pub const EPOCH: Timestamp = Timestamp(0);

    /// Creates a timestamp from nanoseconds since the Unix epoch.
    pub fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Returns the timestamp as nanoseconds since the Unix epoch.
    pub fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Returns the timestamp as seconds since the Unix epoch (truncates).
    pub fn as_secs(&self) -> u64 {
        self.0 / 1_000_000_000
    }

    /// Creates a timestamp for the current time.
    ///
    /// # Panics
    ///
    /// Panics if the system clock is before the Unix epoch.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before Unix epoch");
        Self(duration.as_nanos() as u64)
    }

    /// Returns `self + seconds`, saturating at `u64::MAX` nanoseconds.
    pub fn plus_secs(self, seconds: i64) -> Self {
        let delta = seconds.saturating_mul(1_000_000_000);
        if delta >= 0 {
            Self(self.0.saturating_add(delta as u64))
        } else {
            Self(self.0.saturating_sub(delta.unsigned_abs()))
        }
    }

    /// Returns `self + millis`, saturating at `u64::MAX` nanoseconds.
    pub fn plus_millis(self, millis: i64) -> Self {
        let delta = millis.saturating_mul(1_000_000);
        if delta >= 0 {
            Self(self.0.saturating_add(delta as u64))
        } else {
            Self(self.0.saturating_sub(delta.unsigned_abs()))
        }
    }

    /// Remaining whole seconds until this deadline, relative to `now`.
    ///
    /// Negative once the deadline has passed.
    pub fn remaining_secs(self, now: Timestamp) -> i64 {
        if self.0 >= now.0 {
            ((self.0 - now.0) / 1_000_000_000) as i64
        } else {
            -(((now.0 - self.0) / 1_000_000_000) as i64 + 1)
        }
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:09}", self.as_secs(), self.0 % 1_000_000_000)
    }
}

/// Discriminates the shape of a keyspace value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrdtKind {
    /// Opaque byte string, no causal metadata.
    Plain,
    /// Last-writer-wins register.
    Lww,
    /// Observed-remove set.
    OrSet,
    /// Grow-only counter.
    Counter,
}

impl Display for CrdtKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CrdtKind::Plain => "plain",
            CrdtKind::Lww => "lww",
            CrdtKind::OrSet => "orset",
            CrdtKind::Counter => "counter",
        };
        write!(f, "{s}")
    }
}

/// Per-key bookkeeping maintained alongside the value in the keyspace core.
///
/// None of this is stored inside the value itself: the TTL index and
/// eviction engine read and update this struct without touching the value
/// bytes.
#[derive(Debug, Clone)]
pub struct KeyMetadata {
    pub created_at: Timestamp,
    pub last_access: Timestamp,
    access_count: u32,
    pub size_bytes: usize,
    pub ttl: Option<Timestamp>,
    pub crdt_kind: CrdtKind,
}

impl KeyMetadata {
    pub fn new(now: Timestamp, size_bytes: usize, crdt_kind: CrdtKind) -> Self {
        Self {
            created_at: now,
            last_access: now,
            access_count: 0,
            size_bytes,
            ttl: None,
            crdt_kind,
        }
    }

    /// Current access counter, saturating at `u32::MAX`.
    pub fn access_count(&self) -> u32 {
        self.access_count
    }

    /// Records an access: bumps `last_access` and saturates the counter.
    pub fn touch(&mut self, now: Timestamp) {
        self.last_access = now;
        self.access_count = self.access_count.saturating_add(1);
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        matches!(self.ttl, Some(deadline) if deadline <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_monotonic_ordering() {
        let a = Timestamp::from_nanos(100);
        let b = a.plus_secs(1);
        assert!(b > a);
        assert_eq!(b.as_nanos(), 100 + 1_000_000_000);
    }

    #[test]
    fn timestamp_remaining_secs_boundary() {
        let now = Timestamp::from_nanos(0);
        let deadline = now.plus_secs(5);
        assert_eq!(deadline.remaining_secs(now), 5);
        assert_eq!(now.remaining_secs(deadline), -6);
    }

    #[test]
    fn key_metadata_access_counter_saturates() {
        let mut meta = KeyMetadata::new(Timestamp::EPOCH, 3, CrdtKind::Plain);
        meta.access_count = u32::MAX - 1;
        meta.touch(Timestamp::EPOCH);
        meta.touch(Timestamp::EPOCH);
        assert_eq!(meta.access_count(), u32::MAX);
    }

    #[test]
    fn key_metadata_is_expired() {
        let mut meta = KeyMetadata::new(Timestamp::EPOCH, 0, CrdtKind::Plain);
        meta.ttl = Some(Timestamp::from_nanos(100));
        assert!(!meta.is_expired(Timestamp::from_nanos(50)));
        assert!(meta.is_expired(Timestamp::from_nanos(100)));
        assert!(meta.is_expired(Timestamp::from_nanos(150)));
    }
}

//! Hybrid Logical Clock.
//!
//! Combines a logical counter (which itself absorbs wall-clock readings) with
//! a node id, giving a total order across replicas that is consistent with
//! causality.

use std::cmp::Ordering;

use hyperkv_types::{NodeId, Timestamp};
use serde::{Deserialize, Serialize};

/// A single HLC reading: a logical counter, the wall-time it was taken at,
/// and the node that produced it.
///
/// Ordering compares `logical` first, then breaks ties on `node` (lowest id
/// wins is arbitrary but must be deterministic and identical across
/// replicas, so raw numeric order is used).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hlc {
    logical: u64,
    wall: Timestamp,
    node: NodeId,
}

impl Hlc {
    pub fn logical(&self) -> u64 {
        self.logical
    }

    pub fn wall(&self) -> Timestamp {
        self.wall
    }

    pub fn node(&self) -> NodeId {
        self.node
    }
}

impl PartialOrd for Hlc {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Hlc {
    fn cmp(&self, other: &Self) -> Ordering {
        self.logical
            .cmp(&other.logical)
            .then_with(|| self.node.cmp(&other.node))
    }
}

/// Per-node clock state driving [`Hlc`] readings.
#[derive(Debug, Clone)]
pub struct HlcClock {
    logical: u64,
    node: NodeId,
}

impl HlcClock {
    pub fn new(node: NodeId) -> Self {
        Self { logical: 0, node }
    }

    /// Produces an [`Hlc`] for a local event.
    pub fn tick(&mut self) -> Hlc {
        self.tick_at(Timestamp::now())
    }

    /// Produces an [`Hlc`] for a local event at a caller-supplied wall time
    /// (used by tests to avoid depending on the system clock).
    pub fn tick_at(&mut self, wall_clock: Timestamp) -> Hlc {
        self.logical = self.logical.max(wall_clock.as_nanos()) + 1;
        Hlc {
            logical: self.logical,
            wall: wall_clock,
            node: self.node,
        }
    }

    /// Merges in a remote [`Hlc`] observed on receipt of a message, producing
    /// a new local reading that is causally after both.
    pub fn observe(&mut self, remote: &Hlc) -> Hlc {
        self.observe_at(remote, Timestamp::now())
    }

    pub fn observe_at(&mut self, remote: &Hlc, wall_clock: Timestamp) -> Hlc {
        self.logical = self
            .logical
            .max(remote.logical)
            .max(wall_clock.as_nanos())
            + 1;
        Hlc {
            logical: self.logical,
            wall: wall_clock,
            node: self.node,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_is_strictly_increasing() {
        let mut clock = HlcClock::new(NodeId::new(1));
        let a = clock.tick_at(Timestamp::from_nanos(10));
        let b = clock.tick_at(Timestamp::from_nanos(10));
        assert!(b > a);
    }

    #[test]
    fn observe_advances_past_remote() {
        let mut local = HlcClock::new(NodeId::new(1));
        let mut remote = HlcClock::new(NodeId::new(2));
        let remote_reading = remote.tick_at(Timestamp::from_nanos(1000));
        let observed = local.observe_at(&remote_reading, Timestamp::from_nanos(5));
        assert!(observed > remote_reading);
    }

    #[test]
    fn ties_break_on_node_id() {
        let a = HlcClock::new(NodeId::new(1)).tick_at(Timestamp::from_nanos(0));
        let b = HlcClock::new(NodeId::new(2)).tick_at(Timestamp::from_nanos(0));
        assert_eq!(a.logical(), b.logical());
        assert!(b > a);
    }
}

//! Grow-only counter.

use std::collections::HashMap;

use hyperkv_types::NodeId;
use serde::{Deserialize, Serialize};

/// A counter CRDT keyed by node: each node only ever increases its own
/// component. Merge takes the per-node maximum, so the result is trivially
/// commutative, idempotent, and associative.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GCounter {
    counts: HashMap<NodeId, u64>,
}

impl GCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, node: NodeId) {
        self.increment_by(node, 1);
    }

    pub fn increment_by(&mut self, node: NodeId, delta: u64) {
        let entry = self.counts.entry(node).or_insert(0);
        *entry = entry.saturating_add(delta);
    }

    /// Total value: sum of all per-node components.
    pub fn value(&self) -> u64 {
        self.counts.values().fold(0u64, |acc, v| acc.saturating_add(*v))
    }

    pub fn merge(&mut self, other: &Self) {
        for (&node, &count) in &other.counts {
            let entry = self.counts.entry(node).or_insert(0);
            *entry = (*entry).max(count);
        }
    }
}

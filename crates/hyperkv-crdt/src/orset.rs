//! Observed-remove set.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use hyperkv_types::NodeId;
use serde::{Deserialize, Serialize};

/// Uniquely identifies one `add` operation: the node that performed it and a
/// per-node sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddTag {
    node: NodeId,
    seq: u64,
}

impl AddTag {
    pub fn new(node: NodeId, seq: u64) -> Self {
        Self { node, seq }
    }
}

/// A set CRDT where removes cite the specific add they observed.
///
/// An element is present iff it has at least one add-tag not referenced by a
/// tombstone. Concurrent add and remove of the same value resolve in favor
/// of the add unless the remove specifically cites that add's tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrSet<T> {
    adds: HashMap<AddTag, T>,
    tombstones: HashSet<AddTag>,
}

impl<T> Default for OrSet<T> {
    fn default() -> Self {
        Self {
            adds: HashMap::new(),
            tombstones: HashSet::new(),
        }
    }
}

impl<T: Clone + Eq + Hash> OrSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `value` tagged with `(node, seq)`. The caller is responsible for
    /// supplying a `seq` unique per `node` (e.g. a per-node write counter).
    pub fn add(&mut self, value: T, node: NodeId, seq: u64) -> AddTag {
        let tag = AddTag::new(node, seq);
        self.adds.insert(tag, value);
        tag
    }

    /// Removes the add identified by `tag`, if it exists in this replica's
    /// observed history.
    pub fn remove_tag(&mut self, tag: AddTag) {
        self.tombstones.insert(tag);
    }

    /// Tombstones every currently-visible add-tag whose value equals `value`.
    ///
    /// This is the common case for a user-facing "remove this element"
    /// operation: it only suppresses adds this replica has already observed,
    /// so a concurrent add on another replica survives (add-wins).
    pub fn remove_value(&mut self, value: &T) {
        let tags: Vec<AddTag> = self
            .adds
            .iter()
            .filter(|&(tag, v)| v == value && !self.tombstones.contains(tag))
            .map(|(tag, _)| *tag)
            .collect();
        self.tombstones.extend(tags);
    }

    pub fn contains(&self, value: &T) -> bool {
        self.adds
            .iter()
            .any(|&(tag, v)| v == value && !self.tombstones.contains(tag))
    }

    /// Returns the currently-present elements (adds not suppressed by a
    /// tombstone), deduplicated.
    pub fn elements(&self) -> Vec<&T> {
        let mut seen = HashSet::new();
        self.adds
            .iter()
            .filter(|&(tag, _)| !self.tombstones.contains(tag))
            .filter_map(|(_, v)| if seen.insert(v) { Some(v) } else { None })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.elements().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Merges `other` into `self`: union of adds, union of tombstones.
    pub fn merge(&mut self, other: &Self) {
        for (tag, value) in &other.adds {
            self.adds.entry(*tag).or_insert_with(|| value.clone());
        }
        self.tombstones.extend(other.tombstones.iter().copied());
    }
}

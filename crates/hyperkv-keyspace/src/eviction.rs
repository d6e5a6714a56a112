//! Eviction engine: picks victims when memory pressure requires freeing
//! space. Bookkeeping (recency list, frequency counters, ARC ghost lists)
//! lives here, alongside the keyspace map rather than inside it.

use std::collections::{HashMap, HashSet};

use hyperkv_types::Key;
use rand::seq::IteratorRandom;
use serde::{Deserialize, Serialize};

/// Default number of keys evicted per batch.
pub const DEFAULT_EVICTION_BATCH: usize = 16;

/// Selectable eviction policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvictionPolicy {
    #[default]
    Lru,
    Lfu,
    Arc,
    Random,
    VolatileLru,
    VolatileLfu,
}

impl std::str::FromStr for EvictionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lru" => Ok(Self::Lru),
            "lfu" => Ok(Self::Lfu),
            "arc" => Ok(Self::Arc),
            "random" => Ok(Self::Random),
            "volatile-lru" => Ok(Self::VolatileLru),
            "volatile-lfu" => Ok(Self::VolatileLfu),
            other => Err(format!("unknown eviction policy {other:?}")),
        }
    }
}

/// Per-key bookkeeping the engine needs to make a victim decision. The
/// keyspace core keeps this current on every access.
#[derive(Debug, Clone, Copy)]
pub struct AccessInfo {
    pub access_count: u32,
    pub has_ttl: bool,
}

/// An intrusive doubly-linked list over `Key`, ordered oldest (front) to
/// most-recently-touched (back). Every operation the eviction engine needs
/// on its hot path — move-to-back, remove, membership — is O(1); only the
/// periodic victim-selection scan walks the list end to end.
#[derive(Default)]
struct LruList {
    nodes: HashMap<Key, LruNode>,
    head: Option<Key>,
    tail: Option<Key>,
    len: usize,
}

struct LruNode {
    prev: Option<Key>,
    next: Option<Key>,
}

impl LruList {
    fn new() -> Self {
        Self::default()
    }

    fn len(&self) -> usize {
        self.len
    }

    fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn contains(&self, key: &Key) -> bool {
        self.nodes.contains_key(key)
    }

    /// Unlinks `key` in place, patching its neighbors' pointers. O(1).
    fn unlink(&mut self, key: &Key) -> bool {
        let Some(node) = self.nodes.remove(key) else {
            return false;
        };
        match &node.prev {
            Some(p) => self.nodes.get_mut(p).expect("prev link is always present in the map").next = node.next.clone(),
            None => self.head = node.next.clone(),
        }
        match &node.next {
            Some(n) => self.nodes.get_mut(n).expect("next link is always present in the map").prev = node.prev.clone(),
            None => self.tail = node.prev.clone(),
        }
        self.len -= 1;
        true
    }

    /// Removes `key` if present. O(1).
    fn remove(&mut self, key: &Key) {
        self.unlink(key);
    }

    /// Moves `key` to the back, inserting it if it wasn't already tracked. O(1).
    fn move_to_back(&mut self, key: &Key) {
        self.unlink(key);
        let prev = self.tail.clone();
        match &prev {
            Some(p) => self.nodes.get_mut(p).expect("tail is always present in the map").next = Some(key.clone()),
            None => self.head = Some(key.clone()),
        }
        self.nodes.insert(key.clone(), LruNode { prev, next: None });
        self.tail = Some(key.clone());
        self.len += 1;
    }

    /// Removes and returns the oldest (front) key. O(1).
    fn pop_front(&mut self) -> Option<Key> {
        let key = self.head.clone()?;
        self.unlink(&key);
        Some(key)
    }

    /// Walks oldest to newest. O(n); reserved for batch victim selection.
    fn iter(&self) -> LruIter<'_> {
        LruIter {
            nodes: &self.nodes,
            current: self.head.as_ref(),
        }
    }
}

struct LruIter<'a> {
    nodes: &'a HashMap<Key, LruNode>,
    current: Option<&'a Key>,
}

impl<'a> Iterator for LruIter<'a> {
    type Item = &'a Key;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.current.take()?;
        self.current = self.nodes.get(key).and_then(|node| node.next.as_ref());
        Some(key)
    }
}

/// Maintains recency/frequency bookkeeping and selects victims.
///
/// `touch` must be called on every read/write of a key, and `forget` when a
/// key leaves the keyspace for any reason, so the recency list and ARC ghost
/// lists stay consistent with the live keyspace.
pub struct EvictionEngine {
    policy: EvictionPolicy,
    batch_size: usize,
    recency: LruList,
    arc: ArcState,
}

struct ArcState {
    /// Target size of the recency list, tuned on ghost hits.
    partition: usize,
    recent_ghost: LruList,
    frequent_ghost: LruList,
    frequent: HashSet<Key>,
}

impl ArcState {
    fn new() -> Self {
        Self {
            partition: 0,
            recent_ghost: LruList::new(),
            frequent_ghost: LruList::new(),
            frequent: HashSet::new(),
        }
    }
}

impl EvictionEngine {
    pub fn new(policy: EvictionPolicy) -> Self {
        Self::with_batch_size(policy, DEFAULT_EVICTION_BATCH)
    }

    pub fn with_batch_size(policy: EvictionPolicy, batch_size: usize) -> Self {
        Self {
            policy,
            batch_size: batch_size.max(1),
            recency: LruList::new(),
            arc: ArcState::new(),
        }
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Records an access to `key` (both reads and writes count), moving it
    /// to the most-recently-used position. O(1) amortized.
    pub fn touch(&mut self, key: &Key) {
        self.recency.move_to_back(key);

        if self.policy == EvictionPolicy::Arc && !self.arc.frequent.contains(key) {
            if self.arc.recent_ghost.contains(key) {
                self.arc.partition = (self.arc.partition + 1).min(self.recency.len());
                self.arc.recent_ghost.remove(key);
                self.arc.frequent.insert(key.clone());
            } else if self.arc.frequent_ghost.contains(key) {
                self.arc.partition = self.arc.partition.saturating_sub(1);
                self.arc.frequent_ghost.remove(key);
                self.arc.frequent.insert(key.clone());
            }
        }
    }

    /// Removes all bookkeeping for `key` (called on delete, expiry, or
    /// eviction of that key through any path). O(1) amortized.
    pub fn forget(&mut self, key: &Key) {
        self.recency.remove(key);
        self.arc.frequent.remove(key);
        self.arc.recent_ghost.remove(key);
        self.arc.frequent_ghost.remove(key);
    }

    /// Selects up to `batch_size` victims from `candidates`, using
    /// `access_info` for frequency/TTL-aware policies. Returns fewer than
    /// `batch_size` if there simply aren't enough candidates.
    pub fn select_victims(
        &mut self,
        access_info: &HashMap<Key, AccessInfo>,
    ) -> Vec<Key> {
        let victims = match self.policy {
            EvictionPolicy::Lru => self.select_lru(access_info, |_| true),
            EvictionPolicy::VolatileLru => self.select_lru(access_info, |info| info.has_ttl),
            EvictionPolicy::Lfu => self.select_lfu(access_info, |_| true),
            EvictionPolicy::VolatileLfu => self.select_lfu(access_info, |info| info.has_ttl),
            EvictionPolicy::Arc => self.select_arc(access_info),
            EvictionPolicy::Random => self.select_random(access_info),
        };
        for victim in &victims {
            self.forget(victim);
            self.arc.recent_ghost.move_to_back(victim);
            if self.arc.recent_ghost.len() > access_info.len().max(1) {
                self.arc.recent_ghost.pop_front();
            }
        }
        victims
    }

    fn select_lru(
        &self,
        access_info: &HashMap<Key, AccessInfo>,
        filter: impl Fn(&AccessInfo) -> bool,
    ) -> Vec<Key> {
        self.recency
            .iter()
            .filter(|k| access_info.get(*k).is_some_and(&filter))
            .take(self.batch_size)
            .cloned()
            .collect()
    }

    fn select_lfu(
        &self,
        access_info: &HashMap<Key, AccessInfo>,
        filter: impl Fn(&AccessInfo) -> bool,
    ) -> Vec<Key> {
        let mut candidates: Vec<(&Key, &AccessInfo)> = access_info
            .iter()
            .filter(|&(_, info)| filter(info))
            .collect();
        // Lowest access counter first; ties broken by recency (earlier in
        // the recency list = less recently used = evicted first).
        let recency_rank: HashMap<&Key, usize> = self
            .recency
            .iter()
            .enumerate()
            .map(|(i, k)| (k, i))
            .collect();
        candidates.sort_by_key(|(key, info)| {
            (info.access_count, *recency_rank.get(key).unwrap_or(&0))
        });
        candidates
            .into_iter()
            .take(self.batch_size)
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn select_arc(&self, access_info: &HashMap<Key, AccessInfo>) -> Vec<Key> {
        // Evict from the larger of the two lists relative to the tuned
        // partition: recent list beyond `partition` entries first, then
        // spill into the frequent set.
        let recent_len = self.recency.len().saturating_sub(self.arc.frequent.len());
        if recent_len > self.arc.partition {
            self.select_lru(access_info, |_| true)
        } else {
            let mut frequent: Vec<&Key> = self
                .recency
                .iter()
                .filter(|k| self.arc.frequent.contains(*k))
                .collect();
            frequent.truncate(self.batch_size);
            frequent.into_iter().cloned().collect()
        }
    }

    fn select_random(&self, access_info: &HashMap<Key, AccessInfo>) -> Vec<Key> {
        let mut rng = rand::thread_rng();
        access_info
            .keys()
            .choose_multiple(&mut rng, self.batch_size)
            .into_iter()
            .cloned()
            .collect()
    }
}

//! Storage backend abstraction and the in-memory implementation.

use std::collections::BTreeMap;

use bytes::Bytes;
use hyperkv_types::Key;

use crate::StorageError;

/// A glob-style match against a key, used by `scan_from`.
///
/// Accepts the same `*`, `?`, `[...]` syntax as the pub/sub pattern matcher.
pub fn glob_matches(pattern: &[u8], key: &[u8]) -> bool {
    glob_matches_impl(pattern, key)
}

fn glob_matches_impl(pattern: &[u8], text: &[u8]) -> bool {
    match (pattern.first(), text.first()) {
        (None, None) => true,
        (None, Some(_)) => false,
        (Some(b'*'), _) => {
            glob_matches_impl(&pattern[1..], text)
                || (!text.is_empty() && glob_matches_impl(pattern, &text[1..]))
        }
        (Some(b'?'), Some(_)) => glob_matches_impl(&pattern[1..], &text[1..]),
        (Some(b'['), Some(c)) => match parse_class(&pattern[1..]) {
            Some((matched, rest)) if matched.contains(c) => glob_matches_impl(rest, &text[1..]),
            _ => false,
        },
        (Some(p), Some(c)) if p == c => glob_matches_impl(&pattern[1..], &text[1..]),
        _ => false,
    }
}

/// Parses a `[...]` character class starting just after the `[`. Returns the
/// set of matching bytes and the remainder of the pattern after the `]`.
fn parse_class(pattern: &[u8]) -> Option<(Vec<u8>, &[u8])> {
    let end = pattern.iter().position(|&b| b == b']')?;
    Some((pattern[..end].to_vec(), &pattern[end + 1..]))
}

/// Capabilities required by the keyspace core from any storage backend.
///
/// The in-memory [`MemoryBackend`] is the only backend this implementation
/// ships; the trait is object-safe so embedded B-tree or mmap-backed
/// backends can be added later without touching the keyspace core.
pub trait StorageBackend: std::fmt::Debug + Send {
    fn get(&self, key: &Key) -> Option<Bytes>;
    fn put(&mut self, key: Key, value: Bytes);
    fn delete(&mut self, key: &Key) -> bool;
    fn exists(&self, key: &Key) -> bool;
    /// Scans up to `count` keys starting at `cursor`, matching `pattern` if
    /// given. Returns the next cursor (`0` once exhausted) and the keys
    /// found in this page.
    fn scan_from(&self, cursor: u64, pattern: Option<&[u8]>, count: usize) -> (u64, Vec<Key>);
    fn clear(&mut self);
    fn size(&self) -> usize;
    /// Iterates every live key/value pair, for snapshotting.
    fn iter_all(&self) -> Vec<(Key, Bytes)>;
}

/// `BTreeMap`-backed in-memory storage.
///
/// A `BTreeMap` (rather than a `HashMap`) gives `scan_from` a stable,
/// deterministic key ordering across calls without needing a separate index.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    map: BTreeMap<Key, Bytes>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &Key) -> Option<Bytes> {
        self.map.get(key).cloned()
    }

    fn put(&mut self, key: Key, value: Bytes) {
        self.map.insert(key, value);
    }

    fn delete(&mut self, key: &Key) -> bool {
        self.map.remove(key).is_some()
    }

    fn exists(&self, key: &Key) -> bool {
        self.map.contains_key(key)
    }

    fn scan_from(&self, cursor: u64, pattern: Option<&[u8]>, count: usize) -> (u64, Vec<Key>) {
        let skip = cursor as usize;
        let mut found = Vec::with_capacity(count.min(self.map.len()));
        let mut scanned = 0usize;
        let mut next_cursor = 0u64;

        for (idx, key) in self.map.keys().enumerate().skip(skip) {
            if scanned >= count {
                next_cursor = idx as u64;
                break;
            }
            scanned += 1;
            if pattern.is_none_or(|p| glob_matches(p, key)) {
                found.push(key.clone());
            }
        }

        (next_cursor, found)
    }

    fn clear(&mut self) {
        self.map.clear();
    }

    fn size(&self) -> usize {
        self.map.len()
    }

    fn iter_all(&self) -> Vec<(Key, Bytes)> {
        self.map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn put_get_delete_roundtrip() {
        let mut backend = MemoryBackend::new();
        let key = Key::from_static(b"k");
        backend.put(key.clone(), Bytes::from_static(b"v"));
        assert!(backend.exists(&key));
        assert_eq!(backend.get(&key), Some(Bytes::from_static(b"v")));
        assert!(backend.delete(&key));
        assert!(!backend.exists(&key));
        assert!(!backend.delete(&key));
    }

    #[test]
    fn scan_paginates_in_stable_order() {
        let mut backend = MemoryBackend::new();
        for i in 0..5u8 {
            backend.put(Key::from(vec![b'k', i]), Bytes::from_static(b"v"));
        }
        let (cursor1, page1) = backend.scan_from(0, None, 2);
        assert_eq!(page1.len(), 2);
        assert_ne!(cursor1, 0);
        let (cursor2, page2) = backend.scan_from(cursor1, None, 2);
        assert_eq!(page2.len(), 2);
        let (cursor3, page3) = backend.scan_from(cursor2, None, 2);
        assert_eq!(cursor3, 0);
        assert_eq!(page3.len(), 1);
    }

    #[test_case(b"a*", b"abc", true)]
    #[test_case(b"a*", b"xbc", false)]
    #[test_case(b"a?c", b"abc", true)]
    #[test_case(b"a?c", b"abbc", false)]
    #[test_case(b"[abc]x", b"ax", true)]
    #[test_case(b"[abc]x", b"dx", false)]
    fn glob_matches_cases(pattern: &[u8], text: &[u8], expected: bool) {
        assert_eq!(glob_matches(pattern, text), expected);
    }

    #[test]
    fn clear_empties_backend() {
        let mut backend = MemoryBackend::new();
        backend.put(Key::from_static(b"k"), Bytes::from_static(b"v"));
        backend.clear();
        assert_eq!(backend.size(), 0);
    }
}

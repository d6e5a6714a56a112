//! Tagged value union and its merge dispatcher.

use bytes::Bytes;
use hyperkv_types::CrdtKind;
use serde::{Deserialize, Serialize};

use crate::gcounter::GCounter;
use crate::lww::LwwRegister;
use crate::orset::OrSet;

/// A keyspace value: either an opaque byte string or one of the CRDT shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Plain(Bytes),
    Lww(LwwRegister<Bytes>),
    OrSet(OrSet<Bytes>),
    Counter(GCounter),
}

impl Value {
    pub fn kind(&self) -> CrdtKind {
        match self {
            Value::Plain(_) => CrdtKind::Plain,
            Value::Lww(_) => CrdtKind::Lww,
            Value::OrSet(_) => CrdtKind::OrSet,
            Value::Counter(_) => CrdtKind::Counter,
        }
    }

    /// The primitive projection used by `GET`: the current payload bytes for
    /// any value kind. CRDT values never raise `WrongType` here; `GET`
    /// always succeeds against a CRDT-typed key.
    pub fn project(&self) -> Bytes {
        match self {
            Value::Plain(b) => b.clone(),
            Value::Lww(reg) => reg.get().clone(),
            Value::OrSet(set) => {
                let mut elems: Vec<&Bytes> = set.elements();
                elems.sort();
                let mut out = Vec::new();
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        out.push(b',');
                    }
                    out.extend_from_slice(e);
                }
                Bytes::from(out)
            }
            Value::Counter(counter) => Bytes::from(counter.value().to_string()),
        }
    }

    /// An estimate of the in-memory footprint of this value, used by the
    /// eviction engine's memory accounting.
    pub fn size_estimate(&self) -> usize {
        match self {
            Value::Plain(b) => b.len(),
            Value::Lww(reg) => reg.get().len(),
            Value::OrSet(set) => set.elements().iter().map(|e| e.len()).sum(),
            Value::Counter(_) => std::mem::size_of::<u64>(),
        }
    }

    /// Merges `other` into `self` in place.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the two values are not the same CRDT kind: merge is
    /// only defined between values of matching shape.
    pub fn merge(&mut self, other: &Value) -> Result<(), MergeError> {
        match (self, other) {
            (Value::Plain(a), Value::Plain(b)) => {
                *a = b.clone();
                Ok(())
            }
            (Value::Lww(a), Value::Lww(b)) => {
                a.merge(b);
                Ok(())
            }
            (Value::OrSet(a), Value::OrSet(b)) => {
                a.merge(b);
                Ok(())
            }
            (Value::Counter(a), Value::Counter(b)) => {
                a.merge(b);
                Ok(())
            }
            (a, b) => Err(MergeError::KindMismatch {
                left: a.kind(),
                right: b.kind(),
            }),
        }
    }
}

/// Error raised when merging two values of mismatched CRDT kind.
#[derive(Debug, thiserror::Error)]
#[error("cannot merge {left} value with {right} value")]
pub struct MergeError {
    pub left: CrdtKind,
    pub right: CrdtKind,
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyperkv_types::NodeId;

    use crate::hlc::HlcClock;

    #[test]
    fn project_plain_returns_bytes_unchanged() {
        let value = Value::Plain(Bytes::from_static(b"hello"));
        assert_eq!(value.project(), Bytes::from_static(b"hello"));
    }

    #[test]
    fn project_counter_returns_decimal_string() {
        let mut counter = GCounter::new();
        counter.increment(NodeId::new(1));
        counter.increment(NodeId::new(1));
        let value = Value::Counter(counter);
        assert_eq!(value.project(), Bytes::from("2"));
    }

    #[test]
    fn merge_rejects_kind_mismatch() {
        let mut plain = Value::Plain(Bytes::from_static(b"x"));
        let counter = Value::Counter(GCounter::new());
        let err = plain.merge(&counter).unwrap_err();
        assert_eq!(err.left, CrdtKind::Plain);
        assert_eq!(err.right, CrdtKind::Counter);
    }

    #[test]
    fn merge_lww_picks_greater_hlc() {
        let mut clock = HlcClock::new(NodeId::new(1));
        let hlc_a = clock.tick();
        let hlc_b = clock.tick();
        let mut a = Value::Lww(LwwRegister::new(Bytes::from_static(b"a"), hlc_a));
        let b = Value::Lww(LwwRegister::new(Bytes::from_static(b"b"), hlc_b));
        a.merge(&b).unwrap();
        assert_eq!(a.project(), Bytes::from_static(b"b"));
    }
}

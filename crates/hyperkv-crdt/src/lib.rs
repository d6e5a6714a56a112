//! CRDT value types for `HyperKV`: a Hybrid Logical Clock, a last-writer-wins
//! register, an observed-remove set, and a grow-only counter, unified behind
//! the [`Value`] enum and its merge dispatcher.

mod gcounter;
mod hlc;
mod lww;
mod orset;
mod value;

pub use gcounter::GCounter;
pub use hlc::{Hlc, HlcClock};
pub use lww::LwwRegister;
pub use orset::{AddTag, OrSet};
pub use value::{MergeError, Value};

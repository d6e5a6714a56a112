//! # hyperkv
//!
//! An embeddable handle onto a `HyperKV` keyspace: the same keyspace core,
//! eviction engine, append log, and snapshot store that the network daemon
//! in `hyperkv-server` wraps with a RESP listener, minus the listener.
//!
//! Useful for embedding a keyspace directly inside another process - tests,
//! tooling, or an application that wants an in-memory store with optional
//! append-log/snapshot durability but no network surface.
//!
//! # Quick Start
//!
//! ```no_run
//! use hyperkv::{Hyperkv, SetOptions};
//!
//! let kv = Hyperkv::in_memory()?;
//! kv.set("greeting", "hello", SetOptions::default())?;
//! assert_eq!(kv.get("greeting")?.as_deref(), Some(&b"hello"[..]));
//! # Ok::<(), hyperkv::HyperkvError>(())
//! ```
//!
//! # Modules
//!
//! - **Facade**: [`Hyperkv`], [`HyperkvConfig`] - embeddable entry point
//! - **Keyspace core**: re-exported from `hyperkv-keyspace`
//! - **Wire types**: [`Key`], [`Timestamp`] re-exported from `hyperkv-types`

mod error;
mod hyperkv;

pub use error::{HyperkvError, Result};
pub use hyperkv::{Hyperkv, HyperkvConfig};

pub use hyperkv_keyspace::{KeyspaceError, SetOptions};
pub use hyperkv_types::{Key, Timestamp};

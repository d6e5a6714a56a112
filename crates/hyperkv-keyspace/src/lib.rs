//! TTL index, eviction engine, and the keyspace command core for `HyperKV`.

mod error;
mod eviction;
mod keyspace;
mod ttl;

pub use error::{KeyspaceError, KeyspaceResult};
pub use keyspace::{Keyspace, KeyspaceConfig, KeyspaceEvent, NotificationSink, SetOptions};
pub use eviction::{AccessInfo, EvictionEngine, EvictionPolicy, DEFAULT_EVICTION_BATCH};
pub use ttl::TtlIndex;

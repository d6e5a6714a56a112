//! Publish/subscribe fan-out for `HyperKV`: exact-channel and glob-pattern
//! subscriber registries, delivering through bounded per-subscriber queues.

mod bounded_queue;
mod registry;

pub use bounded_queue::{BoundedQueue, PushResult, DEFAULT_QUEUE_CAPACITY};
pub use registry::{BackpressurePolicy, Message, PubSub, PublishOutcome, SubscriberId};

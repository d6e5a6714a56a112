//! Bridges keyspace mutations into pub/sub channel publishes.
//!
//! Every mutation publishes on two channels: `__keyspace__:<key>` carrying
//! the event name, and `__keyevent__:<event>` carrying the key. The
//! dispatcher owns the single `PubSub` registry; this adapter borrows it
//! just long enough to publish, keeping `hyperkv-keyspace` free of any
//! dependency on the pub/sub crate (see `NotificationSink`).

use std::cell::RefCell;
use std::rc::Rc;

use bytes::Bytes;

use hyperkv_keyspace::{KeyspaceEvent, NotificationSink};
use hyperkv_pubsub::PubSub;
use hyperkv_types::Key;

const KEYSPACE_PREFIX: &[u8] = b"__keyspace__:";
const KEYEVENT_PREFIX: &[u8] = b"__keyevent__:";

/// A [`NotificationSink`] that publishes keyspace events through a shared
/// `PubSub` registry. Single-threaded: the event loop owns both the
/// keyspace and the registry, so `Rc<RefCell<_>>` is sufficient.
pub struct PubSubNotifier {
    pubsub: Rc<RefCell<PubSub>>,
}

impl PubSubNotifier {
    pub fn new(pubsub: Rc<RefCell<PubSub>>) -> Self {
        Self { pubsub }
    }
}

impl NotificationSink for PubSubNotifier {
    fn notify(&mut self, event: KeyspaceEvent, key: &Key) {
        let mut pubsub = self.pubsub.borrow_mut();

        let mut keyspace_channel = Vec::with_capacity(KEYSPACE_PREFIX.len() + key.len());
        keyspace_channel.extend_from_slice(KEYSPACE_PREFIX);
        keyspace_channel.extend_from_slice(key);
        pubsub.publish(&Bytes::from(keyspace_channel), Bytes::copy_from_slice(event.as_str().as_bytes()));

        let mut keyevent_channel = Vec::with_capacity(KEYEVENT_PREFIX.len() + event.as_str().len());
        keyevent_channel.extend_from_slice(KEYEVENT_PREFIX);
        keyevent_channel.extend_from_slice(event.as_str().as_bytes());
        pubsub.publish(&Bytes::from(keyevent_channel), Bytes::copy_from_slice(key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyperkv_pubsub::BackpressurePolicy;

    #[test]
    fn notify_publishes_on_both_channels() {
        let pubsub = Rc::new(RefCell::new(PubSub::new(BackpressurePolicy::DropNewest, 16)));
        let (sub_id, queue) = pubsub.borrow_mut().register();
        pubsub.borrow_mut().psubscribe(sub_id, Bytes::from_static(b"__key*__:*"));

        let mut notifier = PubSubNotifier::new(Rc::clone(&pubsub));
        notifier.notify(KeyspaceEvent::Set, &Key::from_static(b"foo"));

        let first = queue.try_pop().expect("keyspace message");
        assert_eq!(first.channel, Bytes::from_static(b"__keyspace__:foo"));
        assert_eq!(first.payload, Bytes::from_static(b"set"));

        let second = queue.try_pop().expect("keyevent message");
        assert_eq!(second.channel, Bytes::from_static(b"__keyevent__:set"));
        assert_eq!(second.payload, Bytes::from_static(b"foo"));
    }
}

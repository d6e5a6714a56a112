//! Publish/subscribe registries: exact-channel and glob-pattern subscriber
//! sets, backed by per-subscriber bounded queues.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use bytes::Bytes;
use hyperkv_storage::glob_matches;

use crate::bounded_queue::{BoundedQueue, PushResult, DEFAULT_QUEUE_CAPACITY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

/// A delivered message: the channel it was published on, the payload, and
/// (for pattern deliveries) the pattern that matched.
#[derive(Debug, Clone)]
pub struct Message {
    pub channel: Bytes,
    pub payload: Bytes,
    pub pattern: Option<Bytes>,
}

/// What to do when a subscriber's queue is full at publish time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackpressurePolicy {
    DropOldest,
    DropNewest,
    #[default]
    DisconnectSlowSubscriber,
}

/// Result of a single `PUBLISH`.
#[derive(Debug, Default)]
pub struct PublishOutcome {
    /// Number of subscribers the message was actually enqueued to.
    pub delivered: usize,
    /// Subscribers disconnected this publish under `disconnect_slow_subscriber`.
    pub killed: Vec<SubscriberId>,
}

struct Subscriber {
    queue: Arc<BoundedQueue<Message>>,
    channels: BTreeSet<Bytes>,
    patterns: BTreeSet<Bytes>,
}

/// Exact-channel and pattern subscriber registries, with fan-out delivery.
pub struct PubSub {
    channels: BTreeMap<Bytes, BTreeSet<SubscriberId>>,
    patterns: BTreeMap<Bytes, BTreeSet<SubscriberId>>,
    subscribers: HashMap<SubscriberId, Subscriber>,
    policy: BackpressurePolicy,
    queue_capacity: usize,
    next_id: u64,
}

impl Default for PubSub {
    fn default() -> Self {
        Self::new(BackpressurePolicy::default(), DEFAULT_QUEUE_CAPACITY)
    }
}

impl PubSub {
    pub fn new(policy: BackpressurePolicy, queue_capacity: usize) -> Self {
        Self {
            channels: BTreeMap::new(),
            patterns: BTreeMap::new(),
            subscribers: HashMap::new(),
            policy,
            queue_capacity,
            next_id: 0,
        }
    }

    /// Registers a new subscriber with its own bounded queue and returns its
    /// id plus a handle to drain delivered messages from.
    pub fn register(&mut self) -> (SubscriberId, Arc<BoundedQueue<Message>>) {
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        let queue = Arc::new(BoundedQueue::new(self.queue_capacity));
        self.subscribers.insert(
            id,
            Subscriber {
                queue: queue.clone(),
                channels: BTreeSet::new(),
                patterns: BTreeSet::new(),
            },
        );
        (id, queue)
    }

    pub fn subscribe(&mut self, id: SubscriberId, channel: Bytes) {
        if let Some(sub) = self.subscribers.get_mut(&id) {
            sub.channels.insert(channel.clone());
            self.channels.entry(channel).or_default().insert(id);
        }
    }

    pub fn unsubscribe(&mut self, id: SubscriberId, channel: &Bytes) {
        if let Some(sub) = self.subscribers.get_mut(&id) {
            sub.channels.remove(channel);
        }
        if let Some(subs) = self.channels.get_mut(channel) {
            subs.remove(&id);
            if subs.is_empty() {
                self.channels.remove(channel);
            }
        }
    }

    pub fn psubscribe(&mut self, id: SubscriberId, pattern: Bytes) {
        if let Some(sub) = self.subscribers.get_mut(&id) {
            sub.patterns.insert(pattern.clone());
            self.patterns.entry(pattern).or_default().insert(id);
        }
    }

    pub fn punsubscribe(&mut self, id: SubscriberId, pattern: &Bytes) {
        if let Some(sub) = self.subscribers.get_mut(&id) {
            sub.patterns.remove(pattern);
        }
        if let Some(subs) = self.patterns.get_mut(pattern) {
            subs.remove(&id);
            if subs.is_empty() {
                self.patterns.remove(pattern);
            }
        }
    }

    /// Returns whether `id` has at least one active subscription (exact or
    /// pattern). Used to drive the connection's Normal/Subscribed transition.
    pub fn has_subscriptions(&self, id: SubscriberId) -> bool {
        self.subscribers
            .get(&id)
            .is_some_and(|sub| !sub.channels.is_empty() || !sub.patterns.is_empty())
    }

    /// Removes every trace of `id`: its channel/pattern memberships and its
    /// queue. Called on connection close.
    pub fn remove_subscriber(&mut self, id: SubscriberId) {
        let Some(sub) = self.subscribers.remove(&id) else {
            return;
        };
        for channel in &sub.channels {
            if let Some(subs) = self.channels.get_mut(channel) {
                subs.remove(&id);
                if subs.is_empty() {
                    self.channels.remove(channel);
                }
            }
        }
        for pattern in &sub.patterns {
            if let Some(subs) = self.patterns.get_mut(pattern) {
                subs.remove(&id);
                if subs.is_empty() {
                    self.patterns.remove(pattern);
                }
            }
        }
    }

    /// Publishes `payload` on `channel`, fanning out to every exact
    /// subscriber of `channel` and every subscriber whose pattern matches
    /// it. A single subscriber matching by both exact name and a pattern
    /// receives two deliveries, same as the reference protocol.
    pub fn publish(&mut self, channel: &Bytes, payload: Bytes) -> PublishOutcome {
        let mut outcome = PublishOutcome::default();

        let exact_targets: Vec<SubscriberId> = self
            .channels
            .get(channel)
            .map(|subs| subs.iter().copied().collect())
            .unwrap_or_default();
        for id in exact_targets {
            self.deliver(
                id,
                Message {
                    channel: channel.clone(),
                    payload: payload.clone(),
                    pattern: None,
                },
                &mut outcome,
            );
        }

        let matching_patterns: Vec<Bytes> = self
            .patterns
            .keys()
            .filter(|pattern| glob_matches(pattern, channel))
            .cloned()
            .collect();
        for pattern in matching_patterns {
            let targets: Vec<SubscriberId> = self
                .patterns
                .get(&pattern)
                .map(|subs| subs.iter().copied().collect())
                .unwrap_or_default();
            for id in targets {
                self.deliver(
                    id,
                    Message {
                        channel: channel.clone(),
                        payload: payload.clone(),
                        pattern: Some(pattern.clone()),
                    },
                    &mut outcome,
                );
            }
        }

        for id in &outcome.killed {
            self.remove_subscriber(*id);
        }
        outcome
    }

    fn deliver(&self, id: SubscriberId, message: Message, outcome: &mut PublishOutcome) {
        let Some(sub) = self.subscribers.get(&id) else {
            return;
        };
        match sub.queue.try_push(message) {
            PushResult::Ok => outcome.delivered += 1,
            PushResult::Backpressure(message) => match self.policy {
                BackpressurePolicy::DropNewest => {
                    tracing::warn!(subscriber = id.0, "dropping newest message: queue full");
                }
                BackpressurePolicy::DropOldest => {
                    let _ = sub.queue.try_pop();
                    if matches!(sub.queue.try_push(message), PushResult::Ok) {
                        outcome.delivered += 1;
                    }
                }
                BackpressurePolicy::DisconnectSlowSubscriber => {
                    tracing::warn!(subscriber = id.0, reason = "slow_consumer", "disconnecting slow subscriber");
                    outcome.killed.push(id);
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_subscriber_receives_publish_in_order() {
        let mut pubsub = PubSub::default();
        let (id, queue) = pubsub.register();
        pubsub.subscribe(id, Bytes::from_static(b"news"));

        let outcome = pubsub.publish(&Bytes::from_static(b"news"), Bytes::from_static(b"hi"));
        assert_eq!(outcome.delivered, 1);
        let msg = queue.try_pop().unwrap();
        assert_eq!(msg.payload, Bytes::from_static(b"hi"));
        assert!(msg.pattern.is_none());
    }

    #[test]
    fn pattern_subscriber_receives_matching_publish() {
        let mut pubsub = PubSub::default();
        let (id, queue) = pubsub.register();
        pubsub.psubscribe(id, Bytes::from_static(b"news.*"));

        let outcome = pubsub.publish(&Bytes::from_static(b"news.sports"), Bytes::from_static(b"go"));
        assert_eq!(outcome.delivered, 1);
        let msg = queue.try_pop().unwrap();
        assert_eq!(msg.pattern, Some(Bytes::from_static(b"news.*")));
    }

    #[test]
    fn unrelated_channel_receives_nothing() {
        let mut pubsub = PubSub::default();
        let (id, queue) = pubsub.register();
        pubsub.subscribe(id, Bytes::from_static(b"news"));

        let outcome = pubsub.publish(&Bytes::from_static(b"sports"), Bytes::from_static(b"go"));
        assert_eq!(outcome.delivered, 0);
        assert!(queue.try_pop().is_none());
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let mut pubsub = PubSub::default();
        let (id, queue) = pubsub.register();
        pubsub.subscribe(id, Bytes::from_static(b"news"));
        pubsub.unsubscribe(id, &Bytes::from_static(b"news"));

        pubsub.publish(&Bytes::from_static(b"news"), Bytes::from_static(b"hi"));
        assert!(queue.try_pop().is_none());
    }

    #[test]
    fn remove_subscriber_clears_all_memberships() {
        let mut pubsub = PubSub::default();
        let (id, _queue) = pubsub.register();
        pubsub.subscribe(id, Bytes::from_static(b"a"));
        pubsub.psubscribe(id, Bytes::from_static(b"b*"));
        pubsub.remove_subscriber(id);

        assert!(!pubsub.has_subscriptions(id));
        let outcome = pubsub.publish(&Bytes::from_static(b"a"), Bytes::from_static(b"x"));
        assert_eq!(outcome.delivered, 0);
    }

    #[test]
    fn disconnect_policy_kills_subscriber_whose_queue_is_full() {
        let mut pubsub = PubSub::new(BackpressurePolicy::DisconnectSlowSubscriber, 1);
        let (id, queue) = pubsub.register();
        pubsub.subscribe(id, Bytes::from_static(b"c"));

        pubsub.publish(&Bytes::from_static(b"c"), Bytes::from_static(b"1"));
        let outcome = pubsub.publish(&Bytes::from_static(b"c"), Bytes::from_static(b"2"));

        assert_eq!(outcome.killed, vec![id]);
        assert!(!pubsub.has_subscriptions(id));
        assert_eq!(queue.len(), 1); // the first message is still queued
    }

    #[test]
    fn drop_oldest_policy_makes_room_for_newest() {
        let mut pubsub = PubSub::new(BackpressurePolicy::DropOldest, 1);
        let (id, queue) = pubsub.register();
        pubsub.subscribe(id, Bytes::from_static(b"c"));

        pubsub.publish(&Bytes::from_static(b"c"), Bytes::from_static(b"1"));
        pubsub.publish(&Bytes::from_static(b"c"), Bytes::from_static(b"2"));

        let msg = queue.try_pop().unwrap();
        assert_eq!(msg.payload, Bytes::from_static(b"2"));
    }

    #[test]
    fn drop_newest_policy_discards_incoming_message() {
        let mut pubsub = PubSub::new(BackpressurePolicy::DropNewest, 1);
        let (id, queue) = pubsub.register();
        pubsub.subscribe(id, Bytes::from_static(b"c"));

        pubsub.publish(&Bytes::from_static(b"c"), Bytes::from_static(b"1"));
        let outcome = pubsub.publish(&Bytes::from_static(b"c"), Bytes::from_static(b"2"));

        assert_eq!(outcome.delivered, 0);
        let msg = queue.try_pop().unwrap();
        assert_eq!(msg.payload, Bytes::from_static(b"1"));
    }
}

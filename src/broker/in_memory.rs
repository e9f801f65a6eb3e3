//! In-process broker for single-process scenarios and testing.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use tracing::{debug, warn};

use super::channel::DeliveryChannel;
use super::replay::ReplayBuffer;
use super::subscriber::{EventConsumer, TopicSubscriber};
use super::Broker;
use crate::envelope::Envelope;

/// In-process [`Broker`]: synchronous fan-out delivery with a bounded replay
/// buffer per topic.
///
/// Safe to share across threads behind `Arc`. The topic registries use
/// atomic insert-if-absent, so racing first subscribers for a new topic
/// cannot create two channels and unrelated topics never contend.
///
/// Envelopes are validated inside [`send`](Broker::send): a malformed
/// envelope is logged and reported as a failed send, never delivered.
///
/// [`disconnect`](Broker::disconnect) clears the channel registry and the
/// enumerable subscriber set; replay buffers survive, so history recorded
/// before a disconnect can still be replayed to consumers registered
/// afterwards.
pub struct InMemoryBroker {
    channels: DashMap<String, Arc<DeliveryChannel>>,
    buffers: DashMap<String, Arc<ReplayBuffer>>,
    subscribers: DashSet<TopicSubscriber>,
    replay_capacity: usize,
}

impl InMemoryBroker {
    /// Replay buffer capacity used by [`InMemoryBroker::new`].
    pub const DEFAULT_REPLAY_CAPACITY: usize = 100;

    /// Create a broker with the default replay capacity.
    pub fn new() -> Self {
        Self::with_replay_capacity(Self::DEFAULT_REPLAY_CAPACITY)
    }

    /// Create a broker whose per-topic replay buffers hold up to `capacity`
    /// envelopes.
    pub fn with_replay_capacity(capacity: usize) -> Self {
        InMemoryBroker {
            channels: DashMap::new(),
            buffers: DashMap::new(),
            subscribers: DashSet::new(),
            replay_capacity: capacity,
        }
    }

    /// The replay buffer for a topic, if anyone has ever subscribed to it.
    pub fn replay_buffer(&self, topic: &str) -> Option<Arc<ReplayBuffer>> {
        self.buffers.get(topic).map(|entry| Arc::clone(entry.value()))
    }

    fn channel(&self, topic: &str) -> Option<Arc<DeliveryChannel>> {
        self.channels.get(topic).map(|entry| Arc::clone(entry.value()))
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker for InMemoryBroker {
    fn send(&self, topic: &str, envelope: Envelope) -> bool {
        if let Err(err) = envelope.validate() {
            warn!(topic, %err, "rejecting malformed envelope");
            return false;
        }
        // Clone the channel out of the map so no registry lock is held while
        // consumer callbacks run.
        let channel = match self.channel(topic) {
            Some(channel) => channel,
            None => return true, // no one has ever subscribed; nothing to deliver
        };
        channel.dispatch(&envelope).is_ok()
    }

    fn subscribe(&self, topic: &str, consumer: EventConsumer) -> TopicSubscriber {
        // Get-or-create buffer first, then the channel that records into it.
        // An existing buffer is reattached, never overwritten, so history
        // survives disconnect/re-subscribe cycles.
        let buffer = Arc::clone(
            self.buffers
                .entry(topic.to_string())
                .or_insert_with(|| Arc::new(ReplayBuffer::new(self.replay_capacity)))
                .value(),
        );
        let channel = Arc::clone(
            self.channels
                .entry(topic.to_string())
                .or_insert_with(|| Arc::new(DeliveryChannel::new(topic, buffer)))
                .value(),
        );
        channel.register_consumer(Arc::clone(&consumer));

        let subscriber = TopicSubscriber::new(topic, consumer);
        self.subscribers.insert(subscriber.clone());
        debug!(topic, "registered consumer");
        subscriber
    }

    fn topic_subscribers(&self) -> HashSet<TopicSubscriber> {
        self.subscribers.iter().map(|entry| entry.key().clone()).collect()
    }

    fn disconnect(&self) {
        self.channels.clear();
        self.subscribers.clear();
        debug!("disconnected all topics");
    }

    fn replay_all_events(&self, topic: &str) {
        let buffer = match self.replay_buffer(topic) {
            Some(buffer) => buffer,
            None => return,
        };
        let channel = match self.channel(topic) {
            Some(channel) => channel,
            None => return, // detached topic: no current consumers to target
        };
        buffer.replay_into(&channel);
    }
}

//! Broker that accepts everything and delivers nothing.

use std::collections::HashSet;

use dashmap::DashSet;

use super::subscriber::{EventConsumer, TopicSubscriber};
use super::Broker;
use crate::envelope::Envelope;

/// A [`Broker`] that reports every send as successful without delivering,
/// while still tracking subscriber identities.
///
/// Useful as a wiring stub when no broker transport is configured: callers
/// keep their subscribe/reconnect flows intact and the identities remain
/// available for a later migration to a real broker.
pub struct NoOpBroker {
    subscribers: DashSet<TopicSubscriber>,
}

impl NoOpBroker {
    pub fn new() -> Self {
        NoOpBroker {
            subscribers: DashSet::new(),
        }
    }
}

impl Default for NoOpBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker for NoOpBroker {
    fn send(&self, _topic: &str, _envelope: Envelope) -> bool {
        true
    }

    fn subscribe(&self, topic: &str, consumer: EventConsumer) -> TopicSubscriber {
        let subscriber = TopicSubscriber::new(topic, consumer);
        self.subscribers.insert(subscriber.clone());
        subscriber
    }

    fn topic_subscribers(&self) -> HashSet<TopicSubscriber> {
        self.subscribers.iter().map(|entry| entry.key().clone()).collect()
    }

    fn disconnect(&self) {
        self.subscribers.clear();
    }

    fn replay_all_events(&self, _topic: &str) {}
}

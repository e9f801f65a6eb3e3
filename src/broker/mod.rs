//! Event Broker - topic-addressed publish/subscribe
//!
//! This module provides the broker contract and its in-process reference
//! implementation: publishers send envelopes to named topics, consumers
//! subscribe per topic, and every delivery is recorded in a bounded per-topic
//! replay buffer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Broker (trait)                          │
//! │  send() / subscribe() / topic_subscribers()                 │
//! │  disconnect() / reconnect() / replay_all_events()           │
//! └─────────────────────────────────────────────────────────────┘
//!          │                                    │
//!          ▼                                    ▼
//! ┌─────────────────────┐            ┌─────────────────────┐
//! │   InMemoryBroker    │            │     NoOpBroker      │
//! │ topic → Channel     │            │  (accepts & drops)  │
//! │ topic → ReplayBuffer│            └─────────────────────┘
//! └─────────────────────┘
//!          │ per topic
//!          ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │ DeliveryChannel: recorder + user consumers (fan-out)        │
//! │ ReplayBuffer: bounded, deduped, insertion-ordered history   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Delivery is synchronous: `send` runs every consumer callback on the
//! calling thread before returning. Remote-broker implementations of the
//! trait decouple from their transport with their own threading; that is
//! outside this module's scope.

mod channel;
mod in_memory;
mod noop;
mod replay;
mod subscriber;

pub use channel::{DeliveryChannel, DeliveryError};
pub use in_memory::InMemoryBroker;
pub use noop::NoOpBroker;
pub use replay::ReplayBuffer;
pub use subscriber::{EventConsumer, TopicSubscriber};

use std::collections::HashSet;
use std::sync::Arc;

use crate::envelope::Envelope;

/// Contract for sending and receiving events through a message broker.
///
/// Implementations might include:
/// - [`InMemoryBroker`] - in-process delivery, included here
/// - `KafkaBroker` - backed by a durable external broker (external)
/// - [`NoOpBroker`] - accepts everything, delivers nothing
///
/// A broker is an explicitly owned value, never a process-wide singleton;
/// passing [`TopicSubscriber`] values from one instance to
/// [`reconnect`](Broker::reconnect) on another is how a live set of
/// subscriptions migrates between brokers.
pub trait Broker: Send + Sync {
    /// Send an envelope to a topic.
    ///
    /// Returns `true` iff the envelope was valid and dispatch completed
    /// without a consumer failure. Sending to a topic no one has ever
    /// subscribed to is a silent no-op that still returns `true`.
    fn send(&self, topic: &str, envelope: Envelope) -> bool;

    /// Register a consumer for a topic.
    ///
    /// Registering the same consumer for the same topic again has no
    /// additional delivery effect. Returns the subscriber identity for later
    /// reconnect flows.
    fn subscribe(&self, topic: &str, consumer: EventConsumer) -> TopicSubscriber;

    /// The active subscriber identities.
    fn topic_subscribers(&self) -> HashSet<TopicSubscriber>;

    /// Disconnect from the broker, severing delivery for every topic.
    fn disconnect(&self);

    /// Re-register each given subscriber identity under its original topic,
    /// re-creating channels as needed.
    ///
    /// This is the transfer mechanism for moving live subscriptions from one
    /// broker instance to another without re-deriving topic/consumer pairs.
    fn reconnect(&self, subscribers: Vec<TopicSubscriber>) {
        for subscriber in subscribers {
            self.subscribe(subscriber.topic(), Arc::clone(subscriber.consumer()));
        }
    }

    /// Redeliver all stored envelopes for the topic, oldest first, to the
    /// topic's current consumers. No-op when the topic has no history.
    fn replay_all_events(&self, topic: &str);
}

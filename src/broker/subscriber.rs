//! Subscriber identity - a transferable (topic, consumer) pairing.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::envelope::Envelope;

/// A consumer callback registered for a topic.
///
/// Consumers are invoked synchronously on the publisher's thread. A consumer
/// that panics fails that `send` call; the broker itself stays usable.
pub type EventConsumer = Arc<dyn Fn(&Envelope) + Send + Sync>;

/// Compare two consumers by identity (the `Arc`'s data pointer).
///
/// Clones of one `Arc` are the same consumer; two separately built closures
/// are always distinct, even if behaviorally identical.
pub(crate) fn same_consumer(a: &EventConsumer, b: &EventConsumer) -> bool {
    consumer_addr(a) == consumer_addr(b)
}

fn consumer_addr(consumer: &EventConsumer) -> usize {
    Arc::as_ptr(consumer) as *const () as usize
}

/// The pairing of a topic name and a consumer callback.
///
/// Created by [`Broker::subscribe`](crate::Broker::subscribe) and handed back
/// to the caller; a collected set of these can later be passed to
/// [`Broker::reconnect`](crate::Broker::reconnect) to move live subscriptions
/// onto another broker instance.
///
/// Equality and hashing cover the topic and the consumer identity, so two
/// registrations of the same consumer for the same topic are one logical
/// subscription.
#[derive(Clone)]
pub struct TopicSubscriber {
    topic: String,
    consumer: EventConsumer,
}

impl TopicSubscriber {
    pub fn new(topic: impl Into<String>, consumer: EventConsumer) -> Self {
        TopicSubscriber {
            topic: topic.into(),
            consumer,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn consumer(&self) -> &EventConsumer {
        &self.consumer
    }
}

impl PartialEq for TopicSubscriber {
    fn eq(&self, other: &Self) -> bool {
        self.topic == other.topic && same_consumer(&self.consumer, &other.consumer)
    }
}

impl Eq for TopicSubscriber {}

impl Hash for TopicSubscriber {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.topic.hash(state);
        consumer_addr(&self.consumer).hash(state);
    }
}

impl fmt::Debug for TopicSubscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicSubscriber")
            .field("topic", &self.topic)
            .field("consumer", &format_args!("{:p}", Arc::as_ptr(&self.consumer)))
            .finish()
    }
}

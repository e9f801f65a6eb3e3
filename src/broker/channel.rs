//! Per-topic fan-out dispatcher.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use tracing::error;

use super::replay::ReplayBuffer;
use super::subscriber::{same_consumer, EventConsumer};
use crate::envelope::Envelope;

/// Error type for dispatch operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// A registered consumer panicked while handling the envelope.
    ConsumerFailed { topic: String, detail: String },
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryError::ConsumerFailed { topic, detail } => {
                write!(f, "consumer failed on topic {}: {}", topic, detail)
            }
        }
    }
}

impl std::error::Error for DeliveryError {}

/// The set of registered consumers for one topic, plus the system-owned
/// recorder that writes every dispatched envelope into the topic's
/// [`ReplayBuffer`].
///
/// The dispatch list is always "recorder + zero or more user consumers"; the
/// recorder is a channel field, never a user registration, so it cannot be
/// duplicated or removed.
///
/// Dispatch is synchronous: the thread calling `dispatch` runs every consumer
/// callback in turn, in unspecified order.
pub struct DeliveryChannel {
    topic: String,
    recorder: Arc<ReplayBuffer>,
    consumers: RwLock<Vec<EventConsumer>>,
}

impl DeliveryChannel {
    pub fn new(topic: impl Into<String>, recorder: Arc<ReplayBuffer>) -> Self {
        DeliveryChannel {
            topic: topic.into(),
            recorder,
            consumers: RwLock::new(Vec::new()),
        }
    }

    /// The topic this channel delivers for.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Add a consumer to the fan-out set.
    ///
    /// No-op if the same consumer is already registered - set semantics, so
    /// repeated subscribe calls never cause duplicate delivery.
    pub fn register_consumer(&self, consumer: EventConsumer) {
        let mut consumers = self.consumers.write().unwrap();
        if !consumers.iter().any(|c| same_consumer(c, &consumer)) {
            consumers.push(consumer);
        }
    }

    /// Number of registered user consumers (the recorder is not counted).
    pub fn consumer_count(&self) -> usize {
        self.consumers.read().unwrap().len()
    }

    /// Invoke every registered consumer with the envelope.
    ///
    /// The recorder runs first, so the envelope lands in the replay buffer
    /// even when a consumer later fails. A panicking consumer is caught at
    /// the top level, logged, and ends the dispatch as failed; consumers
    /// invoked before it have already observed the envelope and this is not
    /// undone.
    ///
    /// The consumer list is snapshotted before invoking, so no lock is held
    /// across a callback and consumers may themselves subscribe or send.
    pub fn dispatch(&self, envelope: &Envelope) -> Result<(), DeliveryError> {
        self.recorder.record(envelope.clone());

        let consumers: Vec<EventConsumer> = self.consumers.read().unwrap().clone();
        for consumer in &consumers {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| consumer(envelope))) {
                let detail = panic_detail(panic.as_ref());
                error!(topic = %self.topic, %detail, "consumer failed during dispatch");
                return Err(DeliveryError::ConsumerFailed {
                    topic: self.topic.clone(),
                    detail,
                });
            }
        }
        Ok(())
    }
}

fn panic_detail(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "consumer panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use uuid::Uuid;

    fn channel(topic: &str) -> DeliveryChannel {
        DeliveryChannel::new(topic, Arc::new(ReplayBuffer::new(10)))
    }

    fn envelope() -> Envelope {
        Envelope::new(Uuid::new_v4(), json!({"k": "v"}))
    }

    fn counting_consumer() -> (EventConsumer, Arc<Mutex<Vec<Envelope>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let consumer: EventConsumer = Arc::new(move |e: &Envelope| {
            sink.lock().unwrap().push(e.clone());
        });
        (consumer, received)
    }

    #[test]
    fn dispatch_reaches_every_consumer_once() {
        let channel = channel("topic");
        let (c1, r1) = counting_consumer();
        let (c2, r2) = counting_consumer();
        channel.register_consumer(c1);
        channel.register_consumer(c2);

        let e = envelope();
        channel.dispatch(&e).unwrap();

        assert_eq!(*r1.lock().unwrap(), vec![e.clone()]);
        assert_eq!(*r2.lock().unwrap(), vec![e]);
    }

    #[test]
    fn register_is_idempotent() {
        let channel = channel("topic");
        let (consumer, received) = counting_consumer();
        channel.register_consumer(Arc::clone(&consumer));
        channel.register_consumer(consumer);

        assert_eq!(channel.consumer_count(), 1);

        channel.dispatch(&envelope()).unwrap();
        assert_eq!(received.lock().unwrap().len(), 1);
    }

    #[test]
    fn distinct_consumers_are_independent_targets() {
        let channel = channel("topic");
        let (c1, _r1) = counting_consumer();
        let (c2, _r2) = counting_consumer();
        channel.register_consumer(c1);
        channel.register_consumer(c2);

        assert_eq!(channel.consumer_count(), 2);
    }

    #[test]
    fn dispatch_records_into_the_replay_buffer() {
        let buffer = Arc::new(ReplayBuffer::new(10));
        let channel = DeliveryChannel::new("topic", Arc::clone(&buffer));

        let e = envelope();
        channel.dispatch(&e).unwrap();

        assert_eq!(buffer.events(), vec![e]);
    }

    #[test]
    fn panicking_consumer_fails_the_dispatch() {
        let channel = channel("topic");
        let failing: EventConsumer = Arc::new(|_: &Envelope| panic!("boom"));
        channel.register_consumer(failing);

        let err = channel.dispatch(&envelope()).unwrap_err();
        match err {
            DeliveryError::ConsumerFailed { topic, detail } => {
                assert_eq!(topic, "topic");
                assert_eq!(detail, "boom");
            }
        }
    }

    #[test]
    fn failure_does_not_undo_earlier_deliveries() {
        let channel = channel("topic");
        let (first, received) = counting_consumer();
        let failing: EventConsumer = Arc::new(|_: &Envelope| panic!("boom"));
        channel.register_consumer(first);
        channel.register_consumer(failing);

        assert!(channel.dispatch(&envelope()).is_err());
        // The consumer registered before the failing one saw the envelope.
        assert_eq!(received.lock().unwrap().len(), 1);
    }

    #[test]
    fn failed_dispatch_still_records_for_replay() {
        let buffer = Arc::new(ReplayBuffer::new(10));
        let channel = DeliveryChannel::new("topic", Arc::clone(&buffer));
        let failing: EventConsumer = Arc::new(|_: &Envelope| panic!("boom"));
        channel.register_consumer(failing);

        let e = envelope();
        assert!(channel.dispatch(&e).is_err());
        assert_eq!(buffer.events(), vec![e]);
    }

    #[test]
    fn channel_survives_a_failed_dispatch() {
        let channel = channel("topic");
        let failing: EventConsumer = Arc::new(|e: &Envelope| {
            if e.body["n"] == json!(1) {
                panic!("boom");
            }
        });
        channel.register_consumer(failing);

        let bad = Envelope::new(Uuid::new_v4(), json!({"n": 1}));
        let good = Envelope::new(Uuid::new_v4(), json!({"n": 2}));

        assert!(channel.dispatch(&bad).is_err());
        assert!(channel.dispatch(&good).is_ok());
    }

    #[test]
    fn consumer_may_register_reentrantly() {
        let channel = Arc::new(channel("topic"));
        let chan = Arc::clone(&channel);
        let (late, _received) = counting_consumer();
        let registering: EventConsumer = Arc::new(move |_: &Envelope| {
            chan.register_consumer(Arc::clone(&late));
        });
        channel.register_consumer(registering);

        channel.dispatch(&envelope()).unwrap();
        assert_eq!(channel.consumer_count(), 2);
    }
}

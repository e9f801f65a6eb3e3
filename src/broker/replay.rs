//! Bounded per-topic history of delivered envelopes.

use std::collections::VecDeque;
use std::sync::Mutex;

use super::channel::DeliveryChannel;
use crate::envelope::Envelope;

/// A bounded, insertion-ordered, duplicate-suppressing record of recently
/// delivered envelopes for one topic.
///
/// When full, the oldest entry is evicted to admit a new one; recording never
/// blocks and the buffer never grows past its capacity. An envelope equal to
/// one already buffered is not re-inserted, so replaying (which re-dispatches
/// through the recording channel) cannot duplicate entries.
pub struct ReplayBuffer {
    capacity: usize,
    entries: Mutex<VecDeque<Envelope>>,
}

impl ReplayBuffer {
    /// Create a buffer bounded at `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        ReplayBuffer {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append an envelope unless an equal one is already buffered, evicting
    /// the oldest entry first when at capacity.
    pub fn record(&self, envelope: Envelope) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock().unwrap();
        if entries.contains(&envelope) {
            return;
        }
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(envelope);
    }

    /// Re-dispatch every buffered envelope, oldest first, through the given
    /// channel.
    ///
    /// The channel's consumer set is whatever it is *now* - replay targets
    /// present subscribers, not historical ones. Individual dispatch failures
    /// are logged by the channel and do not stop the replay.
    pub fn replay_into(&self, channel: &DeliveryChannel) {
        let snapshot: Vec<Envelope> = self.entries.lock().unwrap().iter().cloned().collect();
        for envelope in &snapshot {
            let _ = channel.dispatch(envelope);
        }
    }

    /// Snapshot of the buffered envelopes, oldest first.
    pub fn events(&self) -> Vec<Envelope> {
        self.entries.lock().unwrap().iter().cloned().collect()
    }

    /// Number of buffered envelopes.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Check if the buffer holds no envelopes.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// The fixed capacity this buffer was constructed with.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

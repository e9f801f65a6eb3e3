mod broker;
mod codec;
mod envelope;

pub use broker::{
    Broker, DeliveryChannel, DeliveryError, EventConsumer, InMemoryBroker, NoOpBroker,
    ReplayBuffer, TopicSubscriber,
};
pub use codec::{CodecError, DomainEvent, EventTypeRegistry};
pub use envelope::{Envelope, EventHeader, ValidationError};

// Re-export Uuid so callers can mint instance ids without a direct dependency
pub use uuid::Uuid;

//! Event body codec - resolves type discriminators to concrete domain events.
//!
//! The broker core treats an envelope body as opaque JSON. This module is the
//! collaborator seam for callers that work with typed domain events: register
//! each event type under its discriminator string, then `encode` to a body on
//! the way in and `decode` on the way out. An unrecognized discriminator is a
//! descriptive error, never silently swallowed.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// A typed event that can travel through the broker as an envelope body.
pub trait DomainEvent: Send + Sync {
    /// The discriminator string identifying this event's schema.
    fn event_type(&self) -> &str;
}

impl fmt::Debug for dyn DomainEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainEvent")
            .field("event_type", &self.event_type())
            .finish()
    }
}

/// Error type for encode/decode operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// No schema is registered for the discriminator.
    UnknownEventType(String),
    /// The body could not be (de)serialized against the registered schema.
    Serialization(String),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::UnknownEventType(event_type) => {
                write!(f, "unknown event type: {}", event_type)
            }
            CodecError::Serialization(msg) => write!(f, "serialization failed: {}", msg),
        }
    }
}

impl std::error::Error for CodecError {}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        CodecError::Serialization(err.to_string())
    }
}

type DecodeFn = Arc<dyn Fn(&Value) -> Result<Box<dyn DomainEvent>, CodecError> + Send + Sync>;

/// Registry mapping event-type discriminators to concrete schemas.
///
/// One registry per process is typical; it is safe to share and to register
/// from multiple threads.
pub struct EventTypeRegistry {
    decoders: RwLock<HashMap<String, DecodeFn>>,
}

impl EventTypeRegistry {
    pub fn new() -> Self {
        EventTypeRegistry {
            decoders: RwLock::new(HashMap::new()),
        }
    }

    /// Register a concrete event type under its discriminator.
    pub fn register<E>(&self, event_type: impl Into<String>)
    where
        E: DomainEvent + DeserializeOwned + 'static,
    {
        let decode: DecodeFn = Arc::new(|body: &Value| {
            let event: E = serde_json::from_value(body.clone())?;
            Ok(Box::new(event) as Box<dyn DomainEvent>)
        });
        self.decoders.write().unwrap().insert(event_type.into(), decode);
    }

    /// Whether a schema is registered for the discriminator.
    pub fn knows(&self, event_type: &str) -> bool {
        self.decoders.read().unwrap().contains_key(event_type)
    }

    /// Serialize a typed event to an opaque envelope body.
    ///
    /// Fails with [`CodecError::UnknownEventType`] when the event's
    /// discriminator has not been registered - an unregistered type must not
    /// reach the wire, since no peer could decode it.
    pub fn encode<E>(&self, event: &E) -> Result<Value, CodecError>
    where
        E: DomainEvent + Serialize,
    {
        if !self.knows(event.event_type()) {
            return Err(CodecError::UnknownEventType(event.event_type().to_string()));
        }
        Ok(serde_json::to_value(event)?)
    }

    /// Deserialize an envelope body against the schema registered for the
    /// declared discriminator.
    pub fn decode(&self, event_type: &str, body: &Value) -> Result<Box<dyn DomainEvent>, CodecError> {
        let decode = self
            .decoders
            .read()
            .unwrap()
            .get(event_type)
            .cloned()
            .ok_or_else(|| CodecError::UnknownEventType(event_type.to_string()))?;
        decode(body)
    }
}

impl Default for EventTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

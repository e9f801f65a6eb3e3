//! Envelope - the unit of delivery.
//!
//! An envelope pairs a metadata header with an opaque event body. The broker
//! never inspects the body; it only compares envelopes for equality (replay
//! dedup) and forwards them unchanged to consumers.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Metadata carried alongside every event body.
///
/// `event_id` and `source_instance_id` are required before an envelope may be
/// handed to a broker; `validate` is the fail-fast gate. They are `Option`
/// because a header deserialized off the wire can be missing either one;
/// [`Envelope::new`] always fills both.
///
/// Wire field names are camelCase (`eventId`, `sourceInstanceId`, ...) for
/// compatibility with existing JSON producers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventHeader {
    /// Unique event id, assigned at creation.
    #[serde(default)]
    pub event_id: Option<Uuid>,
    /// Id of the broker/process instance that produced the event. Consumers
    /// use it to detect (and optionally skip) self-originated events.
    #[serde(default)]
    pub source_instance_id: Option<Uuid>,
    /// Type discriminator, retained for wire compatibility. May be empty when
    /// the body is already a typed object.
    #[serde(default)]
    pub event_type: String,
    /// Event creation time in seconds. Optional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_created_on: Option<u64>,
}

impl EventHeader {
    /// Check that all required header fields are present.
    ///
    /// Fails with the first absent field: `eventId`, then `sourceInstanceId`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.event_id.is_none() {
            return Err(ValidationError::MissingField("eventId"));
        }
        if self.source_instance_id.is_none() {
            return Err(ValidationError::MissingField("sourceInstanceId"));
        }
        Ok(())
    }
}

impl fmt::Display for EventHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{eventId={}, sourceInstanceId={}}}",
            self.event_id.map_or_else(|| "<none>".into(), |id| id.to_string()),
            self.source_instance_id
                .map_or_else(|| "<none>".into(), |id| id.to_string()),
        )
    }
}

/// An event envelope: metadata header plus opaque JSON body.
///
/// Equality covers the full envelope (header and body) so the replay buffer
/// treats two structurally distinct deliveries as distinct records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub header: EventHeader,
    pub body: Value,
}

impl Envelope {
    /// Create an envelope with a fresh random event id, stamped with the
    /// given source instance id.
    pub fn new(source_instance_id: Uuid, body: Value) -> Self {
        Envelope {
            header: EventHeader {
                event_id: Some(Uuid::new_v4()),
                source_instance_id: Some(source_instance_id),
                event_type: String::new(),
                event_created_on: None,
            },
            body,
        }
    }

    /// Set the event type discriminator.
    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.header.event_type = event_type.into();
        self
    }

    /// Set the creation timestamp (seconds).
    pub fn with_created_on(mut self, seconds: u64) -> Self {
        self.header.event_created_on = Some(seconds);
        self
    }

    /// Check that all required fields are present.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.header.validate()
    }

    /// Whether this envelope was produced by the given instance.
    ///
    /// Returns `false` when the header carries no source instance id.
    pub fn originates_from(&self, instance_id: Uuid) -> bool {
        self.header.source_instance_id == Some(instance_id)
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Header='{}', Body='{}'", self.header, self.body)
    }
}

/// Error type for envelope validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required header field is absent. Carries the wire name of the field.
    MissingField(&'static str),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingField(field) => {
                write!(f, "required envelope field {} is missing", field)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_assigns_id_and_source() {
        let source = Uuid::new_v4();
        let envelope = Envelope::new(source, json!({"projectName": "p1"}));

        assert!(envelope.header.event_id.is_some());
        assert_eq!(envelope.header.source_instance_id, Some(source));
        assert_eq!(envelope.header.event_type, "");
        assert!(envelope.header.event_created_on.is_none());
        assert_eq!(envelope.body, json!({"projectName": "p1"}));
    }

    #[test]
    fn builders_set_type_and_created_on() {
        let envelope = Envelope::new(Uuid::new_v4(), json!({}))
            .with_event_type("project-created")
            .with_created_on(1700000000);

        assert_eq!(envelope.header.event_type, "project-created");
        assert_eq!(envelope.header.event_created_on, Some(1700000000));
    }

    #[test]
    fn fresh_envelopes_get_distinct_ids() {
        let source = Uuid::new_v4();
        let a = Envelope::new(source, json!({}));
        let b = Envelope::new(source, json!({}));
        assert_ne!(a.header.event_id, b.header.event_id);
    }

    #[test]
    fn validate_accepts_complete_header() {
        let envelope = Envelope::new(Uuid::new_v4(), json!({"k": 1}));
        assert!(envelope.validate().is_ok());
    }

    #[test]
    fn validate_reports_missing_event_id_first() {
        let envelope = Envelope {
            header: EventHeader {
                event_id: None,
                source_instance_id: None,
                event_type: String::new(),
                event_created_on: None,
            },
            body: json!({}),
        };
        assert_eq!(
            envelope.validate(),
            Err(ValidationError::MissingField("eventId"))
        );
    }

    #[test]
    fn validate_reports_missing_source_instance_id() {
        let envelope = Envelope {
            header: EventHeader {
                event_id: Some(Uuid::new_v4()),
                source_instance_id: None,
                event_type: String::new(),
                event_created_on: None,
            },
            body: json!({}),
        };
        assert_eq!(
            envelope.validate(),
            Err(ValidationError::MissingField("sourceInstanceId"))
        );
    }

    #[test]
    fn equality_covers_header_and_body() {
        let source = Uuid::new_v4();
        let envelope = Envelope::new(source, json!({"n": 1}));

        let same = envelope.clone();
        assert_eq!(envelope, same);

        let mut different_body = envelope.clone();
        different_body.body = json!({"n": 2});
        assert_ne!(envelope, different_body);

        // Same body, different event id: still a distinct delivery.
        let reissued = Envelope::new(source, json!({"n": 1}));
        assert_ne!(envelope, reissued);
    }

    #[test]
    fn originates_from_matches_source() {
        let source = Uuid::new_v4();
        let envelope = Envelope::new(source, json!({}));

        assert!(envelope.originates_from(source));
        assert!(!envelope.originates_from(Uuid::new_v4()));
    }

    #[test]
    fn serialize_uses_camel_case_wire_names() {
        let envelope = Envelope::new(Uuid::new_v4(), json!({"k": "v"}))
            .with_event_type("test-event");
        let value = serde_json::to_value(&envelope).unwrap();

        let header = &value["header"];
        assert!(header.get("eventId").is_some());
        assert!(header.get("sourceInstanceId").is_some());
        assert_eq!(header["eventType"], json!("test-event"));
        // eventCreatedOn is omitted when absent
        assert!(header.get("eventCreatedOn").is_none());
    }

    #[test]
    fn deserialize_tolerates_missing_header_fields() {
        let raw = r#"{"header":{"eventType":"x"},"body":{"k":"v"}}"#;
        let envelope: Envelope = serde_json::from_str(raw).unwrap();

        assert!(envelope.header.event_id.is_none());
        assert_eq!(
            envelope.validate(),
            Err(ValidationError::MissingField("eventId"))
        );
    }

    #[test]
    fn serialize_deserialize_round_trip() {
        let envelope = Envelope::new(Uuid::new_v4(), json!({"projectName": "p1"}))
            .with_event_type("project-created")
            .with_created_on(42);

        let serialized = serde_json::to_string(&envelope).unwrap();
        let deserialized: Envelope = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, envelope);
    }
}

//! Domain event envelope.
//!
//! Every event leaving (or entering) the service travels inside an
//! [`EventEnvelope`]. The envelope is built right before a publish call and
//! is never mutated afterwards.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Name stamped into `source_service` on every envelope this service emits.
pub const SOURCE_SERVICE: &str = "prescriptions.api";

/// The kinds of events this service knows about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    PrescriptionSaved,
    PrescriptionSuggested,
    AppointmentConfirmed,
    PaymentCompleted,
}

impl EventKind {
    /// Wire discriminator carried in `event_type` and used as message subject.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PrescriptionSaved => "PrescriptionSavedEvent",
            EventKind::PrescriptionSuggested => "PrescriptionSuggestedEvent",
            EventKind::AppointmentConfirmed => "AppointmentConfirmedEvent",
            EventKind::PaymentCompleted => "PaymentCompletedEvent",
        }
    }

    pub fn parse(event_type: &str) -> Option<Self> {
        match event_type {
            "PrescriptionSavedEvent" => Some(EventKind::PrescriptionSaved),
            "PrescriptionSuggestedEvent" => Some(EventKind::PrescriptionSuggested),
            "AppointmentConfirmedEvent" => Some(EventKind::AppointmentConfirmed),
            "PaymentCompletedEvent" => Some(EventKind::PaymentCompleted),
            _ => None,
        }
    }
}

/// Wire-level wrapper for a domain event.
///
/// Field order matches the JSON wire format:
/// `event_id, correlation_id, aggregate_id, occurred_at, source_service,
/// payload, event_type`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    event_id: String,
    correlation_id: String,
    aggregate_id: String,
    occurred_at: String,
    source_service: String,
    #[serde(default)]
    payload: Map<String, Value>,
    event_type: String,
}

impl EventEnvelope {
    /// Build a new envelope, generating the event id and timestamp.
    ///
    /// When `correlation_id` is `None` a fresh one is generated, starting a
    /// new causal chain.
    pub fn new(
        kind: EventKind,
        aggregate_id: impl Into<String>,
        correlation_id: Option<String>,
        payload: Map<String, Value>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            correlation_id: correlation_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            aggregate_id: aggregate_id.into(),
            occurred_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false),
            source_service: SOURCE_SERVICE.to_string(),
            payload,
            event_type: kind.as_str().to_string(),
        }
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    pub fn occurred_at(&self) -> &str {
        &self.occurred_at
    }

    pub fn source_service(&self) -> &str {
        &self.source_service
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// The known kind, if the discriminator is one this service understands.
    pub fn kind(&self) -> Option<EventKind> {
        EventKind::parse(&self.event_type)
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Canonical JSON body sent on the wire.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode an inbound envelope from a JSON value.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

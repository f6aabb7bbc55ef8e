//! Transport message and the topic sender trait.

use async_trait::async_trait;

use super::error::BusError;
use crate::event::EventEnvelope;

/// Content type stamped on every envelope body.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A message as it travels through a broker.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    /// Broker-level message identity (the envelope's `event_id`).
    pub message_id: String,
    /// Subject / label (the envelope's `event_type`).
    pub subject: String,
    /// MIME type of `body`.
    pub content_type: String,
    /// Correlation identity carried as transport metadata.
    pub correlation_id: Option<String>,
    /// Serialized body (JSON for envelopes).
    pub body: Vec<u8>,
}

impl Message {
    /// Create a JSON message with the given identity, subject and body.
    pub fn new(message_id: impl Into<String>, subject: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            message_id: message_id.into(),
            subject: subject.into(),
            content_type: JSON_CONTENT_TYPE.to_string(),
            correlation_id: None,
            body,
        }
    }

    /// Build the transport message for an event envelope.
    ///
    /// subject = `event_type`, message id = `event_id`,
    /// correlation id = `correlation_id`.
    pub fn from_envelope(event: &EventEnvelope) -> Result<Self, serde_json::Error> {
        let body = event.to_json()?;
        Ok(Self::new(event.event_id(), event.event_type(), body.into_bytes())
            .with_correlation_id(event.correlation_id()))
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Get the body as a string (if valid UTF-8).
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

/// A sender scoped to one topic.
///
/// Obtained from [`BrokerClient::topic_sender`](super::BrokerClient::topic_sender)
/// for the duration of a publish and closed right after.
#[async_trait]
pub trait TopicSender: Send + Sync {
    /// Send one message to the topic.
    async fn send(&self, message: Message) -> Result<(), BusError>;

    /// Release the sender.
    async fn close(&self) -> Result<(), BusError> {
        Ok(())
    }
}

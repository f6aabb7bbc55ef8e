//! Subscription receiver trait.

use std::time::Duration;

use async_trait::async_trait;

use super::error::BusError;
use super::sender::Message;

/// A message pulled from a subscription, with the broker handle needed to
/// settle it.
#[derive(Clone, Debug, PartialEq)]
pub struct ReceivedMessage {
    /// Broker-specific delivery handle (stream entry id, sequence number...).
    pub delivery_id: String,
    pub message: Message,
}

/// A receiver bound to one (topic, subscription) pair.
///
/// Each message handed out by [`receive`](Self::receive) must be settled
/// exactly once, either with [`complete`](Self::complete) or
/// [`dead_letter`](Self::dead_letter).
#[async_trait]
pub trait SubscriptionReceiver: Send + Sync {
    /// Pull up to `max_messages`, waiting at most `max_wait`.
    ///
    /// Returns an empty batch when nothing arrived in time.
    async fn receive(
        &self,
        max_messages: usize,
        max_wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, BusError>;

    /// Acknowledge a successfully handled message.
    async fn complete(&self, message: &ReceivedMessage) -> Result<(), BusError>;

    /// Move a message to the subscription's dead-letter queue.
    async fn dead_letter(
        &self,
        message: &ReceivedMessage,
        reason: &str,
        description: &str,
    ) -> Result<(), BusError>;

    /// Release the receiver.
    async fn close(&self) -> Result<(), BusError> {
        Ok(())
    }
}

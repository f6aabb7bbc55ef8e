//! Broker connection traits.
//!
//! A [`BrokerConnector`] knows how to reach a broker; connecting yields a
//! [`BrokerClient`] shared by the publisher and the subscriber tasks.

use std::sync::Arc;

use async_trait::async_trait;

use super::error::BusError;
use super::listener::SubscriptionReceiver;
use super::sender::TopicSender;

/// A live broker connection.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Open a sender scoped to `topic`.
    async fn topic_sender(&self, topic: &str) -> Result<Box<dyn TopicSender>, BusError>;

    /// Open a receiver bound to (`topic`, `subscription`).
    async fn subscription_receiver(
        &self,
        topic: &str,
        subscription: &str,
    ) -> Result<Box<dyn SubscriptionReceiver>, BusError>;

    /// Close the connection. Safe to call more than once.
    async fn close(&self) -> Result<(), BusError>;
}

/// Establishes broker connections.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn BrokerClient>, BusError>;
}

/// Connector used when no broker transport is available in this build.
///
/// Connecting always fails, which makes the publisher fall back to
/// in-process mode.
pub struct UnavailableConnector {
    reason: String,
}

impl UnavailableConnector {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl BrokerConnector for UnavailableConnector {
    async fn connect(&self) -> Result<Arc<dyn BrokerClient>, BusError> {
        Err(BusError::ConnectionFailed(self.reason.clone()))
    }
}

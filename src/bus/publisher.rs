//! Event publisher.
//!
//! [`BusPublisher`] sends envelopes either to a real broker topic or, in
//! in-process mode, only logs them. The mode is decided by [`start`]:
//! a publisher configured for a broker that fails to connect falls back to
//! in-process mode for the rest of its life.
//!
//! [`start`]: BusPublisher::start

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use super::broker::{BrokerClient, BrokerConnector};
use super::error::BusError;
use super::sender::Message;
use crate::event::EventEnvelope;

/// Which transport the bus is currently using.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusMode {
    /// Publish/subscribe is simulated locally (log only).
    InProcess,
    /// A broker connection is (or is meant to be) in use.
    Broker,
}

/// Capability to publish an event envelope to a named topic.
///
/// Command handlers depend on this trait only, so tests can substitute a
/// recording or failing implementation.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, event: &EventEnvelope) -> Result<(), BusError>;
}

enum Transport {
    /// Broker configured but `start()` not yet called.
    Pending,
    InProcess,
    Broker(Arc<dyn BrokerClient>),
    /// Broker connection released by `stop()`.
    Closed,
}

/// Publisher with an explicit start/stop lifecycle.
///
/// Transport transitions take the write lock; publishes hold the read lock
/// for the duration of the send, so `stop()` waits for in-flight sends.
pub struct BusPublisher {
    connector: Option<Arc<dyn BrokerConnector>>,
    transport: RwLock<Transport>,
}

impl BusPublisher {
    /// A publisher that only ever logs.
    pub fn in_process() -> Self {
        Self {
            connector: None,
            transport: RwLock::new(Transport::InProcess),
        }
    }

    /// A publisher that connects through `connector` on `start()`.
    pub fn with_broker(connector: Arc<dyn BrokerConnector>) -> Self {
        Self {
            connector: Some(connector),
            transport: RwLock::new(Transport::Pending),
        }
    }

    /// Acquire the transport connection.
    ///
    /// No-op in in-process mode or when already connected. Any connect
    /// failure is logged and switches the publisher to in-process mode
    /// permanently.
    pub async fn start(&self) {
        let mut transport = self.transport.write().await;
        match &*transport {
            Transport::InProcess => {
                info!("publisher using in-process bus");
                return;
            }
            Transport::Broker(_) => return,
            Transport::Pending | Transport::Closed => {}
        }

        let Some(connector) = &self.connector else {
            *transport = Transport::InProcess;
            return;
        };

        match connector.connect().await {
            Ok(client) => {
                info!("publisher connected to broker");
                *transport = Transport::Broker(client);
            }
            Err(e) => {
                error!(error = %e, "publisher broker connection failed, falling back to in-process bus");
                *transport = Transport::InProcess;
            }
        }
    }

    /// Release the transport connection. Idempotent.
    pub async fn stop(&self) {
        let mut transport = self.transport.write().await;
        if let Transport::Broker(client) = &*transport {
            if let Err(e) = client.close().await {
                warn!(error = %e, "publisher broker close failed");
            }
            *transport = Transport::Closed;
            info!("publisher stopped");
        }
    }

    /// The mode the publisher is currently operating in.
    pub async fn mode(&self) -> BusMode {
        match &*self.transport.read().await {
            Transport::InProcess => BusMode::InProcess,
            _ => BusMode::Broker,
        }
    }
}

#[async_trait]
impl EventPublisher for BusPublisher {
    async fn publish(&self, topic: &str, event: &EventEnvelope) -> Result<(), BusError> {
        let transport = self.transport.read().await;
        let client = match &*transport {
            Transport::InProcess => {
                info!(
                    topic = %topic,
                    event_type = %event.event_type(),
                    event_id = %event.event_id(),
                    aggregate_id = %event.aggregate_id(),
                    "in-process publish"
                );
                return Ok(());
            }
            Transport::Broker(client) => client,
            Transport::Pending | Transport::Closed => {
                error!(topic = %topic, event_id = %event.event_id(), "publish without broker connection");
                return Err(BusError::NotConnected);
            }
        };

        let message = Message::from_envelope(event)?;
        let result = send_to_topic(client.as_ref(), topic, message).await;
        match &result {
            Ok(()) => info!(topic = %topic, event_id = %event.event_id(), "event published"),
            Err(e) => error!(topic = %topic, event_id = %event.event_id(), error = %e, "publish failed"),
        }
        result
    }
}

async fn send_to_topic(
    client: &dyn BrokerClient,
    topic: &str,
    message: Message,
) -> Result<(), BusError> {
    let sender = client.topic_sender(topic).await?;
    let result = sender.send(message).await;
    if let Err(e) = sender.close().await {
        warn!(topic = %topic, error = %e, "topic sender close failed");
    }
    result
}

//! Message bus - owns the publisher and subscriber for the service.

use std::sync::Arc;

use tracing::info;

use super::broker::BrokerConnector;
use super::publisher::{BusMode, BusPublisher};
use super::subscriber::{BusSubscriber, ConsumerOptions, ConsumerStats, Subscriptions};
use crate::config::Settings;

/// Publisher + subscriber pair with one lifecycle.
///
/// Constructed once by bootstrap and passed by reference (`Arc`) to whatever
/// needs to publish. Both halves share the same connector, so a broker
/// outage affects them the same way.
///
/// ## Example
///
/// ```ignore
/// let bus = Arc::new(MessageBus::from_settings(&settings));
/// bus.start(consumers::subscriptions(&settings)).await;
///
/// let mediator = Mediator::new(Context::new(settings.clone(), bus.publisher()));
/// // ... serve requests ...
///
/// bus.stop().await;
/// ```
pub struct MessageBus {
    publisher: Arc<BusPublisher>,
    subscriber: Arc<BusSubscriber>,
}

impl MessageBus {
    /// A bus where publish only logs and subscriptions deliver nothing.
    pub fn in_process() -> Self {
        Self {
            publisher: Arc::new(BusPublisher::in_process()),
            subscriber: Arc::new(BusSubscriber::in_process()),
        }
    }

    /// A bus backed by the broker reachable through `connector`.
    pub fn with_broker(connector: Arc<dyn BrokerConnector>, options: ConsumerOptions) -> Self {
        Self {
            publisher: Arc::new(BusPublisher::with_broker(Arc::clone(&connector))),
            subscriber: Arc::new(BusSubscriber::with_broker(connector, options)),
        }
    }

    /// Pick the transport from settings.
    pub fn from_settings(settings: &Settings) -> Self {
        if settings.use_in_memory_bus {
            return Self::in_process();
        }
        Self::with_broker(broker_connector(settings), settings.consumer_options())
    }

    /// Connect the publisher, then launch the subscription consumers.
    pub async fn start(&self, subscriptions: Subscriptions) {
        self.publisher.start().await;
        self.subscriber.start(subscriptions).await;
        let mode = self.publisher.mode().await;
        info!(mode = ?mode, "message bus started");
    }

    /// Stop consumers (draining in-flight batches), then release the
    /// publisher connection.
    pub async fn stop(&self) {
        self.subscriber.stop().await;
        self.publisher.stop().await;
        info!("message bus stopped");
    }

    pub fn publisher(&self) -> Arc<BusPublisher> {
        Arc::clone(&self.publisher)
    }

    pub fn subscriber(&self) -> Arc<BusSubscriber> {
        Arc::clone(&self.subscriber)
    }

    pub async fn mode(&self) -> BusMode {
        self.publisher.mode().await
    }

    pub fn consumer_stats(&self) -> ConsumerStats {
        self.subscriber.stats()
    }
}

#[cfg(feature = "redis")]
fn broker_connector(settings: &Settings) -> Arc<dyn BrokerConnector> {
    let mut connector = super::redis::RedisConnector::new(settings.broker_connection_string.clone())
        .with_claim_idle(settings.claim_idle());
    if !settings.broker_consumer_name.trim().is_empty() {
        connector = connector.with_consumer_name(settings.broker_consumer_name.trim());
    }
    Arc::new(connector)
}

#[cfg(not(feature = "redis"))]
fn broker_connector(_settings: &Settings) -> Arc<dyn BrokerConnector> {
    Arc::new(super::broker::UnavailableConnector::new(
        "no broker transport compiled in (enable the `redis` feature)",
    ))
}

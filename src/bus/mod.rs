//! Service Bus - event publishing and subscription consumption.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 MessageBus (one per process)                │
//! │  - owns BusPublisher + BusSubscriber                        │
//! │  - start(subscriptions) / stop()                            │
//! └─────────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │      BrokerConnector → BrokerClient (shared connection)     │
//! │  topic_sender(topic) → TopicSender::send(message)           │
//! │  subscription_receiver(topic, sub) → SubscriptionReceiver   │
//! │      receive / complete / dead_letter                       │
//! └─────────────────────────────────────────────────────────────┘
//!          │                                    │
//!          ▼                                    ▼
//! ┌─────────────────┐                 ┌─────────────────────┐
//! │ InMemoryBroker  │                 │ RedisConnector      │
//! │ (tests, local)  │                 │ (`redis` feature)   │
//! └─────────────────┘                 └─────────────────────┘
//! ```
//!
//! In in-process mode no connector is used at all: publish logs the event
//! and the subscriber starts nothing.
//!
//! ## Delivery guarantees
//!
//! Publishing is synchronous with respect to the caller and there is no
//! outbox: a crash between a database commit and the publish loses the
//! event. Consumption is at-least-once; a message whose handler fails is
//! dead-lettered rather than redelivered. A receive in progress at shutdown
//! runs to completion (bounded by the receive wait) and its batch is
//! settled. Deliveries left unsettled by a crash stay pending on the broker
//! and the Redis transport reclaims them once they have been idle for the
//! claim threshold.

mod broker;
#[allow(clippy::module_inception)]
mod bus;
mod error;
mod in_memory_queue;
mod listener;
mod publisher;
#[cfg(feature = "redis")]
mod redis;
mod sender;
mod subscriber;

pub use broker::{BrokerClient, BrokerConnector, UnavailableConnector};
pub use bus::MessageBus;
pub use error::BusError;
pub use in_memory_queue::{DeadLetter, InMemoryBroker};
pub use listener::{ReceivedMessage, SubscriptionReceiver};
pub use publisher::{BusMode, BusPublisher, EventPublisher};
#[cfg(feature = "redis")]
pub use redis::{dead_letter_stream, RedisBroker, RedisConnector, DEFAULT_CLAIM_IDLE};
pub use sender::{Message, TopicSender, JSON_CONTENT_TYPE};
pub use subscriber::{
    handler_fn, BusSubscriber, ConsumerOptions, ConsumerStats, HandlerError, MessageHandler,
    Subscriptions, DEAD_LETTER_REASON,
};

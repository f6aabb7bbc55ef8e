//! Prescription-management microservice.
//!
//! Accepts prescription records, persists them and publishes domain events
//! on a message bus. It can also ask a language model for a suggested
//! diagnosis and train a small text classifier from stored records.
//!
//! ## Layout
//!
//! - [`bus`] - publisher/subscriber over a broker or in-process.
//! - [`event`] - the event envelope put on the wire.
//! - [`mediator`] + [`handlers`] - typed command/query dispatch.
//! - [`repository`] - persistence traits and the in-memory store.
//! - [`llm`] / [`ml`] - suggestion client and diagnosis classifier.
//! - [`http`] - axum routes (requires the `http` feature).
//! - [`app`] - bootstrap wiring and lifecycle.

pub mod app;
pub mod bus;
pub mod config;
pub mod consumers;
pub mod domain;
pub mod error;
pub mod event;
pub mod handlers;
#[cfg(feature = "http")]
pub mod http;
pub mod llm;
pub mod mediator;
pub mod ml;
pub mod observability;
pub mod repository;
pub mod shutdown;

pub use app::App;
pub use bus::{BusError, EventPublisher, MessageBus};
pub use config::Settings;
pub use error::ServiceError;
pub use event::{EventEnvelope, EventKind};
pub use mediator::{Context, Mediator};

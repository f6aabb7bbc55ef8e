//! Handlers for inbound integration events.
//!
//! Both consumers only decode and log for now; a body that is not a valid
//! event envelope fails the handler and is dead-lettered by the subscriber.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::bus::{handler_fn, HandlerError, MessageHandler, Subscriptions};
use crate::config::Settings;
use crate::event::{EventEnvelope, EventKind};

/// Subscriptions the service registers at startup.
pub fn subscriptions(settings: &Settings) -> Subscriptions {
    Subscriptions::new()
        .on(
            settings.appointment_confirmed_topic.clone(),
            settings.appointment_confirmed_subscription.clone(),
            appointment_confirmed(),
        )
        .on(
            settings.payment_completed_topic.clone(),
            settings.payment_completed_subscription.clone(),
            payment_completed(),
        )
}

pub fn appointment_confirmed() -> Arc<dyn MessageHandler> {
    handler_fn(|body: Value| async move {
        let event = decode(body, EventKind::AppointmentConfirmed)?;
        info!(
            event_id = %event.event_id(),
            correlation_id = %event.correlation_id(),
            appointment_id = %event.aggregate_id(),
            "appointment confirmed received"
        );
        Ok(())
    })
}

pub fn payment_completed() -> Arc<dyn MessageHandler> {
    handler_fn(|body: Value| async move {
        let event = decode(body, EventKind::PaymentCompleted)?;
        info!(
            event_id = %event.event_id(),
            correlation_id = %event.correlation_id(),
            aggregate_id = %event.aggregate_id(),
            "payment completed received"
        );
        Ok(())
    })
}

fn decode(body: Value, expected: EventKind) -> Result<EventEnvelope, HandlerError> {
    let event = EventEnvelope::from_value(body)?;
    if event.kind() != Some(expected) {
        return Err(format!(
            "expected {} but received {}",
            expected.as_str(),
            event.event_type()
        )
        .into());
    }
    Ok(event)
}

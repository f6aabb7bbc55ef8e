//! Error type for bus operations.

use thiserror::Error;

/// Errors raised by the transport layer (broker connect, send, receive,
/// settlement) and by envelope serialization.
#[derive(Debug, Error)]
pub enum BusError {
    /// Connection to the broker could not be established.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The publisher has no usable transport (not started, or stopped).
    #[error("bus not connected")]
    NotConnected,

    /// The broker rejected or failed to accept a message.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// A batch could not be pulled from a subscription.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Completing or dead-lettering a received message failed.
    #[error("settlement failed: {0}")]
    SettleFailed(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

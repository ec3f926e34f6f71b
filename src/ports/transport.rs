//! Transport port: Trait for publishing results to the cloud.
//!
//! Delivery is fire-and-forget; there is no acknowledgment contract.

use crate::domain::ScreeningResult;

/// Errors raised by the cloud transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Not connected to broker")]
    NotConnected,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Publish failed: {0}")]
    Publish(#[from] std::io::Error),
}

/// Trait for the result sink (cloud messaging).
pub trait ResultSink: Send {
    /// Connect to the broker under the given device identity.
    ///
    /// # Errors
    /// Returns `TransportError::Connect` if the broker is unreachable.
    fn connect(&mut self, device_id: &str) -> Result<(), TransportError>;

    /// Publish one screening result.
    ///
    /// # Errors
    /// Returns `TransportError` if the result cannot be sent.
    fn send(&mut self, result: &ScreeningResult) -> Result<(), TransportError>;
}

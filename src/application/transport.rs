// Transport traits for the live telemetry socket
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("failed to open {endpoint}: {reason}")]
    Open { endpoint: String, reason: String },
    #[error("socket write failed: {0}")]
    Write(String),
    #[error("socket error: {0}")]
    Socket(String),
}

/// One thing that happened on an open socket
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    Frame(String),
    Closed(u16),
    Error(String),
}

#[async_trait]
pub trait TelemetryTransport: Send + Sync {
    /// Open a socket to the telemetry endpoint
    async fn open(&self, endpoint: &str) -> Result<Box<dyn TelemetrySocket>, TransportError>;
}

#[async_trait]
pub trait TelemetrySocket: Send {
    /// Next inbound event. Must be cancel safe, the session selects on it.
    /// A stream that ends without a close frame reports `Closed(1006)`.
    async fn next_event(&mut self) -> SocketEvent;

    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    async fn close(&mut self, code: u16);
}

use thiserror::Error;

/// Error from the pose stream channel.
///
/// Payloads are rendered to strings so a failed send can be copied into the
/// per-frame report handed to observers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// Host or port missing or malformed
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    /// Transport handshake failed
    #[error("connect: {0}")]
    Connect(String),
    /// Failed to transmit a message
    #[error("send: {0}")]
    Send(String),
    /// JSON serialization failed
    #[error("serialize: {0}")]
    Serialize(String),
    /// No connection has been established
    #[error("not connected")]
    NotConnected,
    /// Close handshake failed
    #[error("close: {0}")]
    Close(String),
}

impl From<serde_json::Error> for StreamError {
    fn from(e: serde_json::Error) -> Self {
        StreamError::Serialize(e.to_string())
    }
}

//! Error types for the simulator bridge client.

use thiserror::Error;

/// Errors on the control channel.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Socket-level failure (including read/write timeouts).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The bridge did not accept the connection within the configured timeout.
    #[error("Connection timed out after {ms}ms")]
    ConnectTimeout { ms: u64 },

    /// The bridge sent something the protocol does not allow.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The bridge processed the request and refused it.
    #[error("Bridge rejected request: {0}")]
    Rejected(String),

    /// The bridge closed the connection.
    #[error("Bridge connection closed")]
    Disconnected,
}

impl ClientError {
    /// Creates a protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Creates a protocol error for a reply of the wrong variant.
    pub fn unexpected(context: &str, got: &crate::protocol::Response) -> Self {
        Self::Protocol(format!("unexpected reply to {context}: {got:?}"))
    }
}

/// Errors on the camera stream.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Camera stream closed")]
    Closed,

    #[error("No camera frame within {0}ms")]
    Timeout(u64),
}

//! Error types for lua-debug-bridge.

use thiserror::Error;

/// Main error type for all bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// I/O error during socket or staging-directory operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error on the command channel.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Base64 decode error for encoded payload strings.
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Protocol error (absurd length prefix, truncated payload, etc.).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Connection closed unexpectedly.
    #[error("connection closed")]
    ConnectionClosed,

    /// Outbound write queue full - connection is not draining.
    #[error("write queue full")]
    WriteQueueFull,
}

/// Result type alias using BridgeError.
pub type Result<T> = std::result::Result<T, BridgeError>;

//! Error types for peerlink

use thiserror::Error;

/// Result type for peerlink operations
pub type Result<T> = std::result::Result<T, LinkError>;

/// Peerlink error types
#[derive(Debug, Error)]
pub enum LinkError {
    /// Payload or envelope (de)serialization failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Transport-level I/O failure
    #[error("transport error: {0}")]
    Transport(String),

    /// The endpoint's dispatcher is gone; no response can ever arrive
    #[error("channel closed")]
    ChannelClosed,
}

impl From<serde_json::Error> for LinkError {
    fn from(err: serde_json::Error) -> Self {
        LinkError::Serialization(err.to_string())
    }
}

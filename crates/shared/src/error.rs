//! Shared error types for frame encoding and decoding.

use thiserror::Error;

/// Errors produced while turning frames into typed commands or events.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame text or payload was not valid JSON for the expected shape.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A frame arrived without an event name.
    #[error("frame has an empty event name")]
    EmptyEvent,

    /// The event name is not part of the protocol.
    #[error("unknown event: {0}")]
    UnknownEvent(String),
}

impl ProtocolError {
    /// Short machine-readable code used in `error` frames.
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::Json(_) => "bad_payload",
            ProtocolError::EmptyEvent => "bad_frame",
            ProtocolError::UnknownEvent(_) => "unknown_event",
        }
    }
}

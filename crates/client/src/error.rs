//! Error types for the transport, address lookup, and configuration seams.
//!
//! None of these reach callers of [`crate::ChatSocket`]'s public methods:
//! the socket turns them into log lines and `connect_error` events.

use std::time::Duration;

use lunchparty_shared::ProtocolError;
use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

/// Errors produced while opening or running a transport link.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Websocket transport error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP error from the long-polling transport.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Frame could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Server address could not be parsed.
    #[error("invalid server address: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Server address uses a scheme the transport cannot speak.
    #[error("unsupported scheme for {transport}: {scheme}")]
    UnsupportedScheme {
        transport: &'static str,
        scheme: String,
    },

    /// Relay answered the handshake with a non-success status.
    #[error("unexpected http status {0}")]
    Status(u16),

    /// Handshake did not complete in time.
    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// Peer refused the connection.
    #[error("connection refused: {0}")]
    Refused(String),

    /// No transports are configured.
    #[error("no transports configured")]
    NoTransports,
}

/// Errors produced by address resolvers.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("lookup request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("lookup returned http status {0}")]
    Status(u16),

    #[error("lookup returned an invalid address: {0}")]
    InvalidAddress(String),
}

impl ResolveError {
    /// Transport failures and 5xx answers are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ResolveError::Http(err) => err.is_timeout() || err.is_connect(),
            ResolveError::Status(status) => *status >= 500,
            ResolveError::InvalidAddress(_) => false,
        }
    }
}

/// Errors produced while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be a non-negative integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{key} lists unknown transport {value:?} (expected websocket or polling)")]
    UnknownTransport { key: &'static str, value: String },

    #[error("{key} must list at least one transport")]
    EmptyTransports { key: &'static str },
}

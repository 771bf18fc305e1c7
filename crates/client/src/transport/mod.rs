//! Transports carry frames between the socket and the relay.
//!
//! A transport performs the handshake in [`Transport::open`] and then hands
//! back a [`TransportLink`]: an outbound frame sender and an inbound event
//! receiver. The transport spawns whatever pump tasks it needs; dropping both
//! ends of the link shuts it down.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use lunchparty_shared::Frame;
use serde::Serialize;
use tokio::sync::mpsc;
use url::Url;

use crate::error::TransportError;

mod memory;
mod polling;
mod websocket;

pub use memory::{MemoryPeer, MemoryTransport};
pub use polling::PollingTransport;
pub use websocket::WebSocketTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    WebSocket,
    Polling,
    Memory,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::WebSocket => "websocket",
            TransportKind::Polling => "polling",
            TransportKind::Memory => "memory",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = String;

    /// Only network transports can be named in configuration.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "websocket" | "ws" => Ok(TransportKind::WebSocket),
            "polling" => Ok(TransportKind::Polling),
            other => Err(other.to_string()),
        }
    }
}

/// Something that happened on an open link.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Frame(Frame),
    Closed(String),
}

/// Both ends of an open transport link.
#[derive(Debug)]
pub struct TransportLink {
    pub outbound: mpsc::UnboundedSender<Frame>,
    pub inbound: mpsc::UnboundedReceiver<LinkEvent>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Perform the handshake against the relay at `base` and start pumping frames.
    async fn open(&self, base: &Url) -> Result<TransportLink, TransportError>;
}

/// Transport instance for a configured kind.
pub fn for_kind(kind: TransportKind) -> Option<std::sync::Arc<dyn Transport>> {
    match kind {
        TransportKind::WebSocket => Some(std::sync::Arc::new(WebSocketTransport::new())),
        TransportKind::Polling => Some(std::sync::Arc::new(PollingTransport::new())),
        TransportKind::Memory => None,
    }
}

/// Append path segments to a base address, keeping any path the base already has.
pub(crate) fn join_path(base: &Url, segments: &[&str]) -> Result<Url, TransportError> {
    let mut url = base.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| TransportError::UnsupportedScheme {
                transport: "relay",
                scheme: base.scheme().to_string(),
            })?;
        path.pop_if_empty();
        path.extend(segments);
    }
    Ok(url)
}

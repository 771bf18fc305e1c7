//! In-process transport.
//!
//! Each successful [`Transport::open`] hands the far end of the link to the
//! caller as a [`MemoryPeer`] through the accept queue returned by
//! [`MemoryTransport::new`]. Useful for embedding the socket next to an
//! in-process relay and for exercising the socket without a network.

use std::future;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use lunchparty_shared::Frame;
use serde_json::Value;
use tokio::sync::mpsc;
use url::Url;

use super::{LinkEvent, Transport, TransportKind, TransportLink};
use crate::error::TransportError;

#[derive(Debug, Default)]
struct Behavior {
    refuse_next: usize,
    stall_next: usize,
    opened: usize,
}

#[derive(Debug, Clone)]
pub struct MemoryTransport {
    behavior: Arc<Mutex<Behavior>>,
    accept_tx: mpsc::UnboundedSender<MemoryPeer>,
}

impl MemoryTransport {
    /// A transport plus the queue its accepted peers arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MemoryPeer>) {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        (
            Self {
                behavior: Arc::new(Mutex::new(Behavior::default())),
                accept_tx,
            },
            accept_rx,
        )
    }

    /// Fail the next `count` handshakes.
    pub fn refuse_next(&self, count: usize) {
        self.behavior().refuse_next = count;
    }

    /// Never complete the next `count` handshakes.
    pub fn stall_next(&self, count: usize) {
        self.behavior().stall_next = count;
    }

    /// Number of links opened successfully so far.
    pub fn open_count(&self) -> usize {
        self.behavior().opened
    }

    fn behavior(&self) -> std::sync::MutexGuard<'_, Behavior> {
        self.behavior.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

enum Outcome {
    Refuse,
    Stall,
    Accept,
}

#[async_trait]
impl Transport for MemoryTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Memory
    }

    async fn open(&self, _base: &Url) -> Result<TransportLink, TransportError> {
        let outcome = {
            let mut behavior = self.behavior();
            if behavior.refuse_next > 0 {
                behavior.refuse_next -= 1;
                Outcome::Refuse
            } else if behavior.stall_next > 0 {
                behavior.stall_next -= 1;
                Outcome::Stall
            } else {
                behavior.opened += 1;
                Outcome::Accept
            }
        };

        match outcome {
            Outcome::Refuse => Err(TransportError::Refused("memory peer refused".to_string())),
            Outcome::Stall => future::pending().await,
            Outcome::Accept => {
                let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
                let peer = MemoryPeer {
                    sent: outbound_rx,
                    events: inbound_tx,
                };
                self.accept_tx
                    .send(peer)
                    .map_err(|_| TransportError::Refused("accept queue closed".to_string()))?;
                Ok(TransportLink {
                    outbound: outbound_tx,
                    inbound: inbound_rx,
                })
            }
        }
    }
}

/// The relay side of an in-process link.
#[derive(Debug)]
pub struct MemoryPeer {
    sent: mpsc::UnboundedReceiver<Frame>,
    events: mpsc::UnboundedSender<LinkEvent>,
}

impl MemoryPeer {
    /// Deliver a frame to the socket. Returns false once the socket let go.
    pub fn push(&self, frame: Frame) -> bool {
        self.events.send(LinkEvent::Frame(frame)).is_ok()
    }

    pub fn push_event(&self, event: &str, data: Value) -> bool {
        self.push(Frame::new(event, data))
    }

    /// Close the link from the relay side.
    pub fn close(self, reason: impl Into<String>) {
        let _ = self.events.send(LinkEvent::Closed(reason.into()));
    }

    /// Next frame the socket sent, waiting for it.
    pub async fn next_sent(&mut self) -> Option<Frame> {
        self.sent.recv().await
    }

    /// Next frame the socket sent, if one is already queued.
    pub fn try_next_sent(&mut self) -> Option<Frame> {
        self.sent.try_recv().ok()
    }

    /// True once the socket dropped its end of the link.
    pub fn is_released(&self) -> bool {
        self.events.is_closed()
    }
}

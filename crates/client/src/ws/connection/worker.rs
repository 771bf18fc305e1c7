//! Background task that owns the transport link and the reconnect loop.
//!
//! One worker runs per `connect`. Every state write is tagged with the
//! generation the worker was started under; once `disconnect` (or a fresh
//! `connect`) bumps the generation, a lingering worker can no longer touch
//! the shared state.

use std::sync::Arc;
use std::time::Duration;

use lunchparty_shared::{inbound, Frame};
use serde_json::json;
use tokio::sync::mpsc;
use url::Url;

use super::ConnectionState;
use crate::error::TransportError;
use crate::transport::{LinkEvent, TransportKind, TransportLink};
use crate::ws::events;
use crate::ws::manager::Inner;

pub(crate) async fn run(inner: Arc<Inner>, address: Url, generation: u64) {
    loop {
        match open_link(&inner, &address).await {
            Ok((kind, link)) => {
                let TransportLink {
                    outbound,
                    inbound: inbound_rx,
                } = link;
                if !mark_connected(&inner, generation, kind, outbound) {
                    return;
                }
                let reason = pump(&inner, inbound_rx).await;
                if !mark_lost(&inner, generation, &reason) {
                    return;
                }
            }
            Err(err) => {
                crate::log_warn!("Connection to {} failed: {}", address, err);
                if !inner.is_current(generation) {
                    return;
                }
                inner
                    .dispatcher
                    .emit(events::CONNECT_ERROR, &json!({ "message": err.to_string() }));
            }
        }

        let Some(delay) = schedule_reconnect(&inner, generation) else {
            return;
        };
        tokio::time::sleep(delay).await;
    }
}

/// Try each configured transport in order; the first completed handshake wins.
async fn open_link(
    inner: &Inner,
    address: &Url,
) -> Result<(TransportKind, TransportLink), TransportError> {
    let timeout = inner.config.handshake_timeout;
    let mut last_error = TransportError::NoTransports;

    for transport in &inner.transports {
        let kind = transport.kind();
        match tokio::time::timeout(timeout, transport.open(address)).await {
            Ok(Ok(link)) => return Ok((kind, link)),
            Ok(Err(err)) => {
                crate::log_debug!("{} handshake failed: {}", kind, err);
                last_error = err;
            }
            Err(_) => {
                crate::log_debug!("{} handshake timed out after {:?}", kind, timeout);
                last_error = TransportError::HandshakeTimeout(timeout);
            }
        }
    }

    Err(last_error)
}

/// Relay inbound frames until the link goes away. Returns the close reason.
async fn pump(inner: &Inner, mut inbound_rx: mpsc::UnboundedReceiver<LinkEvent>) -> String {
    while let Some(event) = inbound_rx.recv().await {
        match event {
            LinkEvent::Frame(Frame { event, data }) => {
                if inbound::is_data_event(&event) {
                    inner.dispatcher.emit(&event, &data);
                } else {
                    crate::log_debug!("Ignoring frame '{}'", event);
                }
            }
            LinkEvent::Closed(reason) => return reason,
        }
    }
    "transport closed".to_string()
}

fn mark_connected(
    inner: &Inner,
    generation: u64,
    kind: TransportKind,
    outbound: mpsc::UnboundedSender<Frame>,
) -> bool {
    let updated = inner.update_link(generation, |link| {
        link.attempts = 0;
        link.outbound = Some(outbound);
        link.state = ConnectionState::Connected;
    });
    let Some(state) = updated else {
        return false;
    };

    crate::log_info!("Connected over {}", kind);
    inner.emit_state(&state);
    inner
        .dispatcher
        .emit(events::CONNECTED, &json!({ "transport": kind.as_str() }));
    true
}

fn mark_lost(inner: &Inner, generation: u64, reason: &str) -> bool {
    let updated = inner.update_link(generation, |link| {
        link.outbound = None;
        link.state = ConnectionState::Disconnected;
    });
    let Some(state) = updated else {
        return false;
    };

    crate::log_warn!("Connection lost: {}", reason);
    inner.emit_state(&state);
    inner
        .dispatcher
        .emit(events::DISCONNECTED, &json!({ "reason": reason }));
    true
}

/// Bump the attempt counter and return the delay before the next try, or give
/// up once the ceiling is reached.
fn schedule_reconnect(inner: &Inner, generation: u64) -> Option<Duration> {
    let policy = &inner.config.reconnect;
    let mut delay = None;
    let state = inner.update_link(generation, |link| {
        if policy.allows_attempt(link.attempts) {
            link.attempts += 1;
            link.state = ConnectionState::Reconnecting {
                attempt: link.attempts,
            };
            delay = Some(policy.delay_for_attempt(link.attempts));
        } else {
            link.outbound = None;
            link.state = ConnectionState::Failed {
                reason: format!("gave up after {} reconnect attempts", link.attempts),
            };
        }
    })?;

    match delay {
        Some(delay) => {
            crate::log_info!("Reconnecting in {:?} ({:?})", delay, state);
        }
        None => {
            crate::log_error!("Giving up on the relay: {:?}", state);
        }
    }
    inner.emit_state(&state);
    delay
}

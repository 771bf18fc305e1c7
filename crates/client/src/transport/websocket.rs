//! WebSocket transport using tokio-tungstenite.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use lunchparty_shared::Frame;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use super::{join_path, LinkEvent, Transport, TransportKind, TransportLink};
use crate::error::TransportError;

/// Path of the relay's upgrade endpoint, relative to the server address.
pub const SOCKET_PATH: &str = "socket";

#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }

    /// Map an `http(s)` server address to its `ws(s)` upgrade endpoint.
    pub fn endpoint(base: &Url) -> Result<Url, TransportError> {
        let scheme = match base.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(TransportError::UnsupportedScheme {
                    transport: "websocket",
                    scheme: other.to_string(),
                })
            }
        };
        let mut url = join_path(base, &[SOCKET_PATH])?;
        url.set_scheme(scheme)
            .map_err(|_| TransportError::UnsupportedScheme {
                transport: "websocket",
                scheme: base.scheme().to_string(),
            })?;
        Ok(url)
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::WebSocket
    }

    async fn open(&self, base: &Url) -> Result<TransportLink, TransportError> {
        let url = Self::endpoint(base)?;
        let (ws_stream, _response) = connect_async(url.as_str()).await?;
        crate::log_debug!("websocket upgraded at {}", url);

        let (mut write, mut read) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Frame>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<LinkEvent>();

        // Read task
        let reader_tx = inbound_tx.clone();
        tokio::spawn(async move {
            let reason = loop {
                match read.next().await {
                    Some(Ok(Message::Text(text))) => match Frame::decode(&text) {
                        Ok(frame) => {
                            if reader_tx.send(LinkEvent::Frame(frame)).is_err() {
                                return;
                            }
                        }
                        Err(e) => crate::log_warn!("Dropping malformed frame: {}", e),
                    },
                    Some(Ok(Message::Close(close))) => {
                        break match close {
                            Some(close) => {
                                let reason: &str = &close.reason;
                                format!("closed by server ({}): {}", u16::from(close.code), reason)
                            }
                            None => "closed by server".to_string(),
                        };
                    }
                    Some(Ok(_)) => {
                        // Ping/pong are answered by tungstenite; binary is not part of the protocol.
                    }
                    Some(Err(e)) => break format!("read error: {e}"),
                    None => break "stream ended".to_string(),
                }
            };
            let _ = reader_tx.send(LinkEvent::Closed(reason));
        });

        // Write task
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let text = match frame.encode() {
                    Ok(text) => text,
                    Err(e) => {
                        crate::log_error!("Serialize failed for {}: {}", frame.event, e);
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::Text(text.into())).await {
                    crate::log_error!("Send failed: {}", e);
                    let _ = inbound_tx.send(LinkEvent::Closed(format!("write error: {e}")));
                    return;
                }
            }
            // Sender dropped: the socket let go of this link.
            let _ = write.close().await;
        });

        Ok(TransportLink {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

//! HTTP long-polling transport, the fallback when a WebSocket upgrade fails.
//!
//! Handshake is `POST {base}/poll`, which returns a session id. Inbound frames
//! arrive as JSON arrays from `GET {base}/poll/{sid}` (the relay holds the
//! request until something is queued or its poll window passes). Outbound
//! frames are batched into `POST {base}/poll/{sid}`. Dropping the link sends
//! `DELETE {base}/poll/{sid}`.

use async_trait::async_trait;
use lunchparty_shared::Frame;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::mpsc;
use url::Url;

use super::{join_path, LinkEvent, Transport, TransportKind, TransportLink};
use crate::error::TransportError;

/// Path of the relay's polling endpoints, relative to the server address.
pub const POLL_PATH: &str = "poll";

#[derive(Debug, Deserialize)]
struct OpenResponse {
    sid: String,
}

#[derive(Debug, Clone, Default)]
pub struct PollingTransport {
    client: Client,
}

impl PollingTransport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for PollingTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Polling
    }

    async fn open(&self, base: &Url) -> Result<TransportLink, TransportError> {
        if !matches!(base.scheme(), "http" | "https") {
            return Err(TransportError::UnsupportedScheme {
                transport: "polling",
                scheme: base.scheme().to_string(),
            });
        }

        let open_url = join_path(base, &[POLL_PATH])?;
        let resp = self.client.post(open_url).send().await?;
        if !resp.status().is_success() {
            return Err(TransportError::Status(resp.status().as_u16()));
        }
        let OpenResponse { sid } = resp.json().await?;
        let session_url = join_path(base, &[POLL_PATH, &sid])?;
        crate::log_debug!("polling session {} opened", sid);

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<Frame>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<LinkEvent>();

        tokio::spawn(poll_loop(
            self.client.clone(),
            session_url.clone(),
            inbound_tx.clone(),
        ));
        tokio::spawn(write_loop(
            self.client.clone(),
            session_url,
            outbound_rx,
            inbound_tx,
        ));

        Ok(TransportLink {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

async fn poll_loop(client: Client, url: Url, inbound_tx: mpsc::UnboundedSender<LinkEvent>) {
    loop {
        let resp = tokio::select! {
            _ = inbound_tx.closed() => return,
            resp = client.get(url.clone()).send() => resp,
        };

        let resp = match resp {
            Ok(resp) => resp,
            Err(e) => {
                let _ = inbound_tx.send(LinkEvent::Closed(format!("poll failed: {e}")));
                return;
            }
        };

        match resp.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => {
                let _ = inbound_tx.send(LinkEvent::Closed("polling session expired".to_string()));
                return;
            }
            status => {
                let _ = inbound_tx.send(LinkEvent::Closed(format!(
                    "poll returned http status {}",
                    status.as_u16()
                )));
                return;
            }
        }

        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => {
                let _ = inbound_tx.send(LinkEvent::Closed(format!("poll body failed: {e}")));
                return;
            }
        };

        match Frame::decode_batch(&body) {
            Ok(frames) => {
                for frame in frames {
                    if inbound_tx.send(LinkEvent::Frame(frame)).is_err() {
                        return;
                    }
                }
            }
            Err(e) => crate::log_warn!("Dropping malformed poll batch: {}", e),
        }
    }
}

async fn write_loop(
    client: Client,
    url: Url,
    mut outbound_rx: mpsc::UnboundedReceiver<Frame>,
    inbound_tx: mpsc::UnboundedSender<LinkEvent>,
) {
    while let Some(first) = outbound_rx.recv().await {
        let mut batch = vec![first];
        while let Ok(next) = outbound_rx.try_recv() {
            batch.push(next);
        }

        let body = match Frame::encode_batch(&batch) {
            Ok(body) => body,
            Err(e) => {
                crate::log_error!("Serialize failed for poll batch: {}", e);
                continue;
            }
        };

        let sent = client
            .post(url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await;
        match sent {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => {
                let _ = inbound_tx.send(LinkEvent::Closed(format!(
                    "send returned http status {}",
                    resp.status().as_u16()
                )));
                return;
            }
            Err(e) => {
                let _ = inbound_tx.send(LinkEvent::Closed(format!("send failed: {e}")));
                return;
            }
        }
    }

    // Sender dropped: release the session so the relay forgets this peer.
    if let Err(e) = client.delete(url).send().await {
        crate::log_debug!("Closing polling session failed: {}", e);
    }
}

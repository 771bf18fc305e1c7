//! WebSocket handler for the relay.

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};

use crate::state::AppState;

/// How long the writer gets to flush queued frames and the close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// WebSocket upgrade handler
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// One frame per text message in both directions.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (peer, mut outbound) = state.relay.connect().await;
    tracing::info!("WebSocket peer {} connected", peer);

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let text = match frame.encode() {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("Failed to encode frame for {}: {}", peer, e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.send(Message::Close(None)).await;
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => state.relay.handle_text(peer, text.as_str()).await,
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::debug!("WebSocket peer {} errored: {}", peer, e);
                break;
            }
            _ => {}
        }
    }

    // Dropping the peer ends its queue, so the writer sends Close and exits.
    state.relay.disconnect(peer).await;
    if tokio::time::timeout(CLOSE_GRACE, &mut send_task).await.is_err() {
        send_task.abort();
    }
    tracing::info!("WebSocket peer {} closed", peer);
}

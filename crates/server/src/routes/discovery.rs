//! Relay address discovery endpoint.

use axum::{extract::State, Json};
use lunchparty_shared::SocketConfig;

use crate::state::AppState;

/// `GET /api/socket-config`: where clients should open their socket.
pub async fn socket_config(State(state): State<AppState>) -> Json<SocketConfig> {
    Json(SocketConfig {
        socket_url: state.config.public_url.clone(),
    })
}

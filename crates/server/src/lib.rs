//! Lunchparty Server - chat relay
//!
//! A pure Axum server that relays chat commands between clients in the same
//! room, over WebSocket or HTTP long-polling.

use axum::{
    http::HeaderValue,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod config;
pub mod poll;
pub mod relay;
pub mod routes;
pub mod state;
pub mod ws;

pub use config::ServerConfig;
pub use state::AppState;

/// Build the router for the given state.
pub fn app(state: AppState) -> anyhow::Result<Router> {
    let origin = match &state.config.cors_origin {
        Some(origin) => AllowOrigin::exact(HeaderValue::from_str(origin)?),
        None => AllowOrigin::from(Any),
    };
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(Router::new()
        // Discovery
        .route("/api/socket-config", get(routes::discovery::socket_config))
        // WebSocket
        .route("/socket", get(ws::ws_handler))
        // Long-polling
        .route("/poll", axum::routing::post(poll::open))
        .route(
            "/poll/{sid}",
            get(poll::poll).post(poll::push).delete(poll::close),
        )
        // Apply middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state))
}

/// Serve on an already bound listener until the process stops.
pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    let app = app(state.clone())?;
    let reaper = poll::spawn_reaper(state);
    let result = axum::serve(listener, app).await;
    reaper.abort();
    Ok(result?)
}

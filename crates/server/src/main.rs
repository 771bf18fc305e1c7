//! Lunchparty Server - chat relay entry point

use lunchparty_server::{AppState, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lunchparty_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    let addr = config.bind_addr;
    let state = AppState::new(config);

    tracing::info!("Starting relay on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    lunchparty_server::serve(listener, state).await
}

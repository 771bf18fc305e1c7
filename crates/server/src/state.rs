//! Application state shared across request handlers.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::poll::PollSessions;
use crate::relay::Relay;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub polls: Arc<PollSessions>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            relay: Arc::new(Relay::new()),
            polls: Arc::new(PollSessions::new()),
            config: Arc::new(config),
        }
    }
}

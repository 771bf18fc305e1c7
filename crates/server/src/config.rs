//! Server configuration from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_PUBLIC_URL: &str = "http://localhost:8080";
pub const DEFAULT_POLL_WINDOW: Duration = Duration::from_secs(25);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Address handed out by `/api/socket-config`.
    pub public_url: String,
    /// How long a long-poll request is held open before answering empty.
    pub poll_window: Duration,
    /// Allowed CORS origin; any origin when unset.
    pub cors_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            public_url: DEFAULT_PUBLIC_URL.to_string(),
            poll_window: DEFAULT_POLL_WINDOW,
            cors_origin: None,
        }
    }
}

impl ServerConfig {
    /// Parse configuration from environment variables.
    ///
    /// Environment variables:
    /// - `LUNCHPARTY_BIND_ADDR`: listen address (default: "0.0.0.0:8080")
    /// - `LUNCHPARTY_PUBLIC_URL`: address clients should connect to (default: "http://localhost:8080")
    /// - `LUNCHPARTY_POLL_WINDOW_SECS`: long-poll hold time (default: 25)
    /// - `LUNCHPARTY_CORS_ORIGIN`: allowed origin (default: any)
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("LUNCHPARTY_BIND_ADDR") {
            config.bind_addr = addr
                .parse()
                .with_context(|| format!("LUNCHPARTY_BIND_ADDR is not a socket address: {addr}"))?;
        }
        if let Ok(url) = std::env::var("LUNCHPARTY_PUBLIC_URL") {
            config.public_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(secs) = std::env::var("LUNCHPARTY_POLL_WINDOW_SECS") {
            let secs: u64 = secs
                .parse()
                .with_context(|| format!("LUNCHPARTY_POLL_WINDOW_SECS is not a number: {secs}"))?;
            config.poll_window = Duration::from_secs(secs);
        }
        config.cors_origin = std::env::var("LUNCHPARTY_CORS_ORIGIN")
            .ok()
            .filter(|origin| !origin.is_empty());

        Ok(config)
    }

    /// Sessions that have not polled for this long are reaped.
    pub fn session_idle_timeout(&self) -> Duration {
        self.poll_window * 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR.parse().unwrap());
        assert_eq!(config.public_url, DEFAULT_PUBLIC_URL);
        assert_eq!(config.session_idle_timeout(), Duration::from_secs(75));
    }
}

//! Client configuration from environment variables.

use std::time::Duration;

use crate::error::ConfigError;
use crate::transport::TransportKind;
use crate::ws::ReconnectConfig;

/// Address used when no address is given and the lookup fails.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";

pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(20);

/// Upper bound for one address lookup request.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

const ENV_SERVER_URL: &str = "LUNCHPARTY_SERVER_URL";
const ENV_LOOKUP_URL: &str = "LUNCHPARTY_LOOKUP_URL";
const ENV_LOOKUP_TIMEOUT_MS: &str = "LUNCHPARTY_LOOKUP_TIMEOUT_MS";
const ENV_RECONNECT_ATTEMPTS: &str = "LUNCHPARTY_RECONNECT_ATTEMPTS";
const ENV_RECONNECT_DELAY_MS: &str = "LUNCHPARTY_RECONNECT_DELAY_MS";
const ENV_HANDSHAKE_TIMEOUT_SECS: &str = "LUNCHPARTY_HANDSHAKE_TIMEOUT_SECS";
const ENV_TRANSPORTS: &str = "LUNCHPARTY_TRANSPORTS";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Fallback relay address.
    pub server_url: String,
    /// Endpoint serving `{"socket_url": ...}`; no lookup when unset.
    pub lookup_url: Option<String>,
    /// Per-attempt bound on the lookup request.
    pub lookup_timeout: Duration,
    pub reconnect: ReconnectConfig,
    pub handshake_timeout: Duration,
    /// Transports tried in order on every (re)connect.
    pub transports: Vec<TransportKind>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            lookup_url: None,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            reconnect: ReconnectConfig::default(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            transports: vec![TransportKind::WebSocket, TransportKind::Polling],
        }
    }
}

impl ClientConfig {
    /// Read configuration from the process environment.
    ///
    /// Environment variables:
    /// - `LUNCHPARTY_SERVER_URL`: fallback relay address (default: "http://localhost:8080")
    /// - `LUNCHPARTY_LOOKUP_URL`: address lookup endpoint (default: none)
    /// - `LUNCHPARTY_LOOKUP_TIMEOUT_MS`: per-attempt lookup timeout (default: 5000)
    /// - `LUNCHPARTY_RECONNECT_ATTEMPTS`: reconnect ceiling (default: 5)
    /// - `LUNCHPARTY_RECONNECT_DELAY_MS`: linear backoff unit (default: 1000)
    /// - `LUNCHPARTY_HANDSHAKE_TIMEOUT_SECS`: per-transport handshake timeout (default: 20)
    /// - `LUNCHPARTY_TRANSPORTS`: comma separated order (default: "websocket,polling")
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an arbitrary key lookup.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let get = |key: &str| get(key).filter(|value| !value.trim().is_empty());

        if let Some(url) = get(ENV_SERVER_URL) {
            config.server_url = url.trim().trim_end_matches('/').to_string();
        }
        config.lookup_url = get(ENV_LOOKUP_URL).map(|url| url.trim().to_string());
        if let Some(value) = get(ENV_LOOKUP_TIMEOUT_MS) {
            config.lookup_timeout =
                Duration::from_millis(parse_number(ENV_LOOKUP_TIMEOUT_MS, &value)?);
        }

        if let Some(value) = get(ENV_RECONNECT_ATTEMPTS) {
            config.reconnect.max_attempts = parse_number(ENV_RECONNECT_ATTEMPTS, &value)? as u32;
        }
        if let Some(value) = get(ENV_RECONNECT_DELAY_MS) {
            config.reconnect.base_delay =
                Duration::from_millis(parse_number(ENV_RECONNECT_DELAY_MS, &value)?);
        }
        if let Some(value) = get(ENV_HANDSHAKE_TIMEOUT_SECS) {
            config.handshake_timeout =
                Duration::from_secs(parse_number(ENV_HANDSHAKE_TIMEOUT_SECS, &value)?);
        }
        if let Some(value) = get(ENV_TRANSPORTS) {
            config.transports = parse_transports(&value)?;
        }

        Ok(config)
    }
}

fn parse_number(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    let parsed = value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidNumber {
            key,
            value: value.to_string(),
        })?;
    if key == ENV_RECONNECT_ATTEMPTS && parsed > u64::from(u32::MAX) {
        return Err(ConfigError::InvalidNumber {
            key,
            value: value.to_string(),
        });
    }
    Ok(parsed)
}

fn parse_transports(value: &str) -> Result<Vec<TransportKind>, ConfigError> {
    let mut kinds = Vec::new();
    for name in value.split(',').filter(|name| !name.trim().is_empty()) {
        let kind = name
            .parse::<TransportKind>()
            .map_err(|value| ConfigError::UnknownTransport {
                key: ENV_TRANSPORTS,
                value,
            })?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    if kinds.is_empty() {
        return Err(ConfigError::EmptyTransports {
            key: ENV_TRANSPORTS,
        });
    }
    Ok(kinds)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.reconnect.base_delay, Duration::from_millis(1000));
        assert_eq!(config.handshake_timeout, Duration::from_secs(20));
        assert_eq!(config.lookup_timeout, Duration::from_secs(5));
        assert_eq!(
            config.transports,
            vec![TransportKind::WebSocket, TransportKind::Polling]
        );
    }

    #[test]
    fn reads_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("LUNCHPARTY_SERVER_URL", "https://lunch.example.com/"),
            ("LUNCHPARTY_LOOKUP_URL", "https://config.example.com/socket"),
            ("LUNCHPARTY_LOOKUP_TIMEOUT_MS", "250"),
            ("LUNCHPARTY_RECONNECT_ATTEMPTS", "3"),
            ("LUNCHPARTY_RECONNECT_DELAY_MS", "50"),
            ("LUNCHPARTY_HANDSHAKE_TIMEOUT_SECS", "2"),
            ("LUNCHPARTY_TRANSPORTS", "polling"),
        ]))
        .unwrap();

        assert_eq!(config.server_url, "https://lunch.example.com");
        assert_eq!(
            config.lookup_url.as_deref(),
            Some("https://config.example.com/socket")
        );
        assert_eq!(config.lookup_timeout, Duration::from_millis(250));
        assert_eq!(config.reconnect.max_attempts, 3);
        assert_eq!(config.reconnect.base_delay, Duration::from_millis(50));
        assert_eq!(config.handshake_timeout, Duration::from_secs(2));
        assert_eq!(config.transports, vec![TransportKind::Polling]);
    }

    #[test]
    fn rejects_bad_numbers_and_transports() {
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[("LUNCHPARTY_RECONNECT_ATTEMPTS", "-1")])),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[("LUNCHPARTY_TRANSPORTS", "websocket,carrier-pigeon")])),
            Err(ConfigError::UnknownTransport { .. })
        ));
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[("LUNCHPARTY_TRANSPORTS", " , ")])),
            Err(ConfigError::EmptyTransports { .. })
        ));
    }

    #[test]
    fn duplicate_transports_collapse() {
        let config =
            ClientConfig::from_lookup(lookup(&[("LUNCHPARTY_TRANSPORTS", "ws,websocket,polling")]))
                .unwrap();
        assert_eq!(
            config.transports,
            vec![TransportKind::WebSocket, TransportKind::Polling]
        );
    }
}

//! Connection state and the reconnect policy.
//!
//! The state machine is driven by the background worker in `worker.rs`:
//!
//! ```text
//! Disconnected --connect--> Connecting --handshake ok--> Connected
//!      ^                        |                            |
//!      |                  handshake failed              link lost
//!      |                        v                            v
//!  disconnect()   Reconnecting { attempt } <--- attempt < max_attempts
//!                               |
//!                     attempts exhausted
//!                               v
//!                      Failed { reason }
//! ```

use std::time::Duration;

use serde::Serialize;

pub(crate) mod worker;

/// Connection state for the relay socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Failed { reason: String },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Reconnecting { .. }
        )
    }

    /// A worker owns (or is about to own) a transport link.
    pub fn is_active(&self) -> bool {
        self.is_connected() || self.is_connecting()
    }
}

/// Linear reconnect policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Reconnect attempts allowed before giving up.
    pub max_attempts: u32,
    /// Delay unit; attempt `n` waits `n * base_delay`.
    pub base_delay: Duration,
}

pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(1000);

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            base_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

impl ReconnectConfig {
    /// Delay before the given 1-based attempt. No jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Whether another attempt is allowed after `attempts_made` attempts.
    pub fn allows_attempt(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_linearly() {
        let config = ReconnectConfig {
            max_attempts: 5,
            base_delay: Duration::from_millis(250),
        };
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(250));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(5), Duration::from_millis(1250));
    }

    #[test]
    fn ceiling_stops_attempts() {
        let config = ReconnectConfig::default();
        assert!(config.allows_attempt(0));
        assert!(config.allows_attempt(4));
        assert!(!config.allows_attempt(5));
    }

    #[test]
    fn state_serializes_with_tag() {
        let value = serde_json::to_value(ConnectionState::Reconnecting { attempt: 2 }).unwrap();
        assert_eq!(value, serde_json::json!({"state": "reconnecting", "attempt": 2}));
        let value = serde_json::to_value(ConnectionState::Connected).unwrap();
        assert_eq!(value, serde_json::json!({"state": "connected"}));
    }

    #[test]
    fn activity_covers_connecting_and_connected() {
        assert!(ConnectionState::Connecting.is_active());
        assert!(ConnectionState::Reconnecting { attempt: 1 }.is_active());
        assert!(ConnectionState::Connected.is_active());
        assert!(!ConnectionState::Disconnected.is_active());
        assert!(!ConnectionState::Failed {
            reason: "gave up".to_string()
        }
        .is_active());
    }
}

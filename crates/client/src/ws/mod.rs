//! Realtime chat socket for the lunchparty relay.
//!
//! This module provides:
//! - Connection management with linear-backoff reconnect
//! - Single-room membership tracking
//! - Name-keyed event fan-out to registered callbacks
//! - Typed builders for every outbound command
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    ChatSocket                       │
//! │  (cloneable handle: membership, dispatcher, link)   │
//! └─────────────────────────────────────────────────────┘
//!             │ send_*           ▲ emit(event, payload)
//!             ▼                  │
//!   ┌──────────────────┐  ┌──────────────────┐
//!   │ outbound channel │  │ connection worker│
//!   └──────────────────┘  └──────────────────┘
//!             │                  ▲
//!             ▼                  │
//!   ┌─────────────────────────────────────────┐
//!   │ Transport (websocket → polling)         │
//!   └─────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let socket = ChatSocket::new(ClientConfig::from_env()?);
//!
//! let chat = socket.downgrade();
//! let _joined = socket.on(events::CONNECTED, move |_| {
//!     if let Some(chat) = chat.upgrade() {
//!         chat.join_room("party", 42);
//!     }
//! });
//! let _messages = socket.on("new_message", |payload| println!("{payload}"));
//!
//! socket.connect(None).await;
//! ```

pub mod commands;
mod connection;
mod dispatcher;
mod manager;
mod room;

pub use connection::{
    ConnectionState, ReconnectConfig, DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_DELAY,
};
pub use dispatcher::{EventDispatcher, Subscription, SubscriptionId};
pub use manager::{ChatSocket, ChatSocketBuilder, WeakChatSocket};
pub use room::RoomMembership;

/// Lifecycle events the socket raises on its own dispatcher.
///
/// Relayed data events keep their wire names (see
/// [`lunchparty_shared::inbound`]).
pub mod events {
    /// `{"transport": "websocket" | "polling" | "memory"}`
    pub const CONNECTED: &str = "connected";
    /// `{"reason": "..."}`
    pub const DISCONNECTED: &str = "disconnected";
    /// `{"message": "..."}`
    pub const CONNECT_ERROR: &str = "connect_error";
    /// The new [`super::ConnectionState`], serialized.
    pub const STATE_CHANGED: &str = "state_changed";
}

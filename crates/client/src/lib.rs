//! Lunchparty Client - realtime chat socket
//!
//! This crate contains the client side of the lunchparty chat relay: a
//! cloneable [`ChatSocket`] that keeps one transport link alive, tracks the
//! joined room, fans inbound events out to callbacks and encodes outbound
//! commands.

pub mod logging;

pub mod config;
pub mod error;
pub mod resolver;
pub mod retry;
pub mod transport;
pub mod ws;

pub use config::ClientConfig;
pub use error::{ConfigError, ResolveError, TransportError};
pub use resolver::{AddressResolver, HttpResolver, HttpResolverOptions, StaticResolver};
pub use transport::{MemoryPeer, MemoryTransport, Transport, TransportKind};
pub use ws::{
    events, ChatSocket, ConnectionState, ReconnectConfig, Subscription, WeakChatSocket,
};

//! The relay socket handle shared across the application.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use lunchparty_shared::{ChatId, ClientCommand, Frame, MessageId, RoomRef, SendMessage};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

use super::commands;
use super::connection::{worker, ConnectionState};
use super::dispatcher::{EventDispatcher, Subscription};
use super::events;
use super::room::RoomMembership;
use crate::config::ClientConfig;
use crate::resolver::{AddressResolver, HttpResolver, HttpResolverOptions, StaticResolver};
use crate::transport::{self, Transport};

/// Everything the connection worker mutates, kept under one lock.
#[derive(Debug)]
pub(crate) struct LinkState {
    pub(crate) state: ConnectionState,
    pub(crate) attempts: u32,
    pub(crate) outbound: Option<mpsc::UnboundedSender<Frame>>,
    worker: Option<JoinHandle<()>>,
    generation: u64,
}

impl Default for LinkState {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempts: 0,
            outbound: None,
            worker: None,
            generation: 0,
        }
    }
}

pub(crate) struct Inner {
    pub(crate) config: ClientConfig,
    pub(crate) transports: Vec<Arc<dyn Transport>>,
    resolver: Arc<dyn AddressResolver>,
    pub(crate) dispatcher: EventDispatcher,
    membership: Mutex<RoomMembership>,
    link: Mutex<LinkState>,
}

impl Inner {
    fn link(&self) -> MutexGuard<'_, LinkState> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn membership(&self) -> MutexGuard<'_, RoomMembership> {
        self.membership.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.link().generation == generation
    }

    /// Apply `update` if `generation` still owns the link; returns the new state.
    pub(crate) fn update_link(
        &self,
        generation: u64,
        update: impl FnOnce(&mut LinkState),
    ) -> Option<ConnectionState> {
        let mut link = self.link();
        if link.generation != generation {
            return None;
        }
        update(&mut link);
        Some(link.state.clone())
    }

    pub(crate) fn emit_state(&self, state: &ConnectionState) {
        let payload = serde_json::to_value(state).unwrap_or(Value::Null);
        self.dispatcher.emit(events::STATE_CHANGED, &payload);
    }

    /// Stop the worker and drop the link.
    fn shutdown(&self) {
        let worker = {
            let mut link = self.link();
            link.generation += 1;
            link.attempts = 0;
            link.outbound = None;
            link.state = ConnectionState::Disconnected;
            link.worker.take()
        };
        if let Some(worker) = worker {
            worker.abort();
        }
    }
}

/// Aborts the worker once the last [`ChatSocket`] clone is gone.
struct Owner {
    inner: Arc<Inner>,
}

impl Drop for Owner {
    fn drop(&mut self) {
        self.inner.shutdown();
    }
}

/// Cloneable handle to one relay connection, one room membership slot and
/// one event dispatcher.
///
/// Build it once at startup and hand clones to whatever needs it. Send-type
/// methods never fail loudly: when the socket is not connected (or no room is
/// joined, for typing) they log and do nothing.
///
/// Callbacks that talk back to the socket should capture a
/// [`WeakChatSocket`] from [`ChatSocket::downgrade`]. A full clone stored in
/// the socket's own dispatcher keeps it alive until [`ChatSocket::disconnect`].
#[derive(Clone)]
pub struct ChatSocket {
    owner: Arc<Owner>,
}

impl std::fmt::Debug for ChatSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSocket")
            .field("state", &self.state())
            .field("current_room", &self.current_room())
            .finish()
    }
}

/// Handle that does not keep the socket alive.
#[derive(Clone, Debug)]
pub struct WeakChatSocket {
    owner: Weak<Owner>,
}

impl WeakChatSocket {
    /// `None` once every [`ChatSocket`] clone is gone.
    pub fn upgrade(&self) -> Option<ChatSocket> {
        self.owner.upgrade().map(|owner| ChatSocket { owner })
    }
}

pub struct ChatSocketBuilder {
    config: ClientConfig,
    transports: Vec<Arc<dyn Transport>>,
    resolver: Option<Arc<dyn AddressResolver>>,
}

impl ChatSocketBuilder {
    /// Append a transport. Once any transport is added, the configured
    /// transport list is ignored.
    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transports.push(Arc::new(transport));
        self
    }

    pub fn with_resolver(mut self, resolver: impl AddressResolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn build(self) -> ChatSocket {
        let transports = if self.transports.is_empty() {
            self.config
                .transports
                .iter()
                .filter_map(|kind| transport::for_kind(*kind))
                .collect()
        } else {
            self.transports
        };

        let resolver: Arc<dyn AddressResolver> = match (self.resolver, &self.config.lookup_url) {
            (Some(resolver), _) => resolver,
            (None, Some(lookup_url)) => {
                let options = HttpResolverOptions {
                    attempt_timeout: self.config.lookup_timeout,
                    ..HttpResolverOptions::default()
                };
                match HttpResolver::with_options(lookup_url.clone(), options) {
                    Ok(resolver) => Arc::new(resolver),
                    Err(err) => {
                        crate::log_warn!("Address lookup unavailable: {}", err);
                        Arc::new(StaticResolver::new(self.config.server_url.clone()))
                    }
                }
            }
            (None, None) => Arc::new(StaticResolver::new(self.config.server_url.clone())),
        };

        let inner = Inner {
            config: self.config,
            transports,
            resolver,
            dispatcher: EventDispatcher::new(),
            membership: Mutex::new(RoomMembership::default()),
            link: Mutex::new(LinkState::default()),
        };

        ChatSocket {
            owner: Arc::new(Owner {
                inner: Arc::new(inner),
            }),
        }
    }
}

impl ChatSocket {
    pub fn new(config: ClientConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: ClientConfig) -> ChatSocketBuilder {
        ChatSocketBuilder {
            config,
            transports: Vec::new(),
            resolver: None,
        }
    }

    pub fn downgrade(&self) -> WeakChatSocket {
        WeakChatSocket {
            owner: Arc::downgrade(&self.owner),
        }
    }

    fn inner(&self) -> &Arc<Inner> {
        &self.owner.inner
    }

    /// Start connecting to `address`, or to the resolved address when `None`.
    ///
    /// Returns once the worker is running; the outcome arrives as `connected`
    /// or `connect_error` events. A no-op while a connection is already up or
    /// being established.
    pub async fn connect(&self, address: Option<String>) {
        if self.inner().link().state.is_active() {
            crate::log_debug!("connect ignored: already {:?}", self.state());
            return;
        }

        let address = match address {
            Some(address) => address,
            None => self.resolve_address().await,
        };

        let url = match Url::parse(&address) {
            Ok(url) => url,
            Err(err) => {
                crate::log_error!("Invalid relay address '{}': {}", address, err);
                let state = ConnectionState::Failed {
                    reason: format!("invalid address: {err}"),
                };
                let worker = {
                    let mut link = self.inner().link();
                    // Retire any worker still finishing a lost link.
                    link.generation += 1;
                    link.attempts = 0;
                    link.outbound = None;
                    link.state = state.clone();
                    link.worker.take()
                };
                if let Some(worker) = worker {
                    worker.abort();
                }
                self.inner().emit_state(&state);
                self.inner().dispatcher.emit(
                    events::CONNECT_ERROR,
                    &serde_json::json!({ "message": format!("invalid server address: {err}") }),
                );
                return;
            }
        };

        let generation = {
            let mut link = self.inner().link();
            // Another connect may have won while the address was resolving.
            if link.state.is_active() {
                return;
            }
            link.generation += 1;
            link.attempts = 0;
            link.outbound = None;
            link.state = ConnectionState::Connecting;
            link.generation
        };

        crate::log_info!("Connecting to {}", url);
        self.inner().emit_state(&ConnectionState::Connecting);

        let handle = tokio::spawn(worker::run(Arc::clone(self.inner()), url, generation));
        let mut link = self.inner().link();
        if link.generation == generation {
            if let Some(previous) = link.worker.replace(handle) {
                previous.abort();
            }
        } else {
            handle.abort();
        }
    }

    async fn resolve_address(&self) -> String {
        match self.inner().resolver.resolve().await {
            Ok(address) => address,
            Err(err) => {
                let fallback = self.inner().config.server_url.clone();
                crate::log_warn!("Address lookup failed ({}); using {}", err, fallback);
                fallback
            }
        }
    }

    /// Tear down the link, forget the joined room and drop every listener.
    pub fn disconnect(&self) {
        self.inner().shutdown();
        self.inner().membership().clear();
        self.inner().dispatcher.clear();
        crate::log_info!("Disconnected from relay");
    }

    pub fn on<F>(&self, event: &str, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner().dispatcher.on(event, callback)
    }

    pub fn off(&self, subscription: &Subscription) -> bool {
        self.inner().dispatcher.off(subscription)
    }

    pub fn state(&self) -> ConnectionState {
        self.inner().link().state.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.inner().link().state.is_connected()
    }

    pub fn current_room(&self) -> Option<RoomRef> {
        self.inner().membership().current().cloned()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.inner().link().attempts
    }

    /// Join a room. Joining a different room leaves the previous one first.
    pub fn join_room(&self, chat_type: &str, chat_id: ChatId) {
        if !self.guard_connected("join a room") {
            return;
        }
        let room = RoomRef::new(chat_type, chat_id);
        let previous = self.inner().membership().join(room.clone());
        if let Some(previous) = previous {
            crate::log_debug!("Leaving {} before joining {}", previous, room);
            self.send(commands::leave_chat(previous));
        }
        self.send(commands::join_chat(room));
    }

    /// Leave a room. The command is sent even if `room` is not the joined one.
    pub fn leave_room(&self, chat_type: &str, chat_id: ChatId) {
        if !self.guard_connected("leave a room") {
            return;
        }
        let room = RoomRef::new(chat_type, chat_id);
        self.inner().membership().leave(&room);
        self.send(commands::leave_chat(room));
    }

    pub fn send_message(&self, message: SendMessage) {
        self.send(commands::send_message(message));
    }

    pub fn mark_read(&self, room: &RoomRef, message_id: MessageId, employee_id: &str) {
        self.send(commands::mark_read(room, message_id, employee_id));
    }

    pub fn add_reaction(
        &self,
        room: &RoomRef,
        message_id: MessageId,
        employee_id: &str,
        reaction: &str,
    ) {
        self.send(commands::add_reaction(room, message_id, employee_id, reaction));
    }

    pub fn edit_message(
        &self,
        room: &RoomRef,
        message_id: MessageId,
        employee_id: &str,
        message: &str,
    ) {
        self.send(commands::edit_message(room, message_id, employee_id, message));
    }

    pub fn delete_message(&self, room: &RoomRef, message_id: MessageId, employee_id: &str) {
        self.send(commands::delete_message(room, message_id, employee_id));
    }

    /// Announce typing in the joined room.
    pub fn start_typing(&self, employee_id: &str) {
        if let Some(room) = self.joined_room("start typing") {
            self.send(commands::typing_start(&room, employee_id));
        }
    }

    pub fn stop_typing(&self, employee_id: &str) {
        if let Some(room) = self.joined_room("stop typing") {
            self.send(commands::typing_stop(&room, employee_id));
        }
    }

    pub fn set_online(&self, employee_id: &str) {
        self.send(commands::user_online(employee_id));
    }

    pub fn set_offline(&self, employee_id: &str) {
        self.send(commands::user_offline(employee_id));
    }

    fn guard_connected(&self, operation: &str) -> bool {
        let connected = self.is_connected();
        if !connected {
            crate::log_warn!("Cannot {}: not connected", operation);
        }
        connected
    }

    fn joined_room(&self, operation: &str) -> Option<RoomRef> {
        if !self.guard_connected(operation) {
            return None;
        }
        let room = self.current_room();
        if room.is_none() {
            crate::log_warn!("Cannot {}: no room joined", operation);
        }
        room
    }

    fn send(&self, command: ClientCommand) {
        let name = command.event_name();
        let frame = match command.to_frame() {
            Ok(frame) => frame,
            Err(err) => {
                crate::log_error!("Failed to encode {}: {}", name, err);
                return;
            }
        };

        let link = self.inner().link();
        match (&link.state, &link.outbound) {
            (ConnectionState::Connected, Some(outbound)) => {
                if outbound.send(frame).is_err() {
                    crate::log_warn!("Dropped {}: link is closing", name);
                }
            }
            _ => crate::log_warn!("Cannot send {}: not connected", name),
        }
    }
}

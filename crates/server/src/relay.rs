//! Room registry and command fan-out.
//!
//! Transport handlers (websocket, long-polling) register a peer, feed it the
//! frames the client sends and drain the peer's queue back to the client. The
//! relay itself never touches a socket.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use lunchparty_shared::{
    ChatMessage, ClientCommand, Frame, MessageDeleted, MessageEdited, MessageReaction,
    MessageRead, ProtocolError, RoomRef, ServerEvent, Typing, UserStatus, UserStatusChanged,
    UserTyping,
};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

pub type PeerId = Uuid;

pub const NOT_IN_ROOM: &str = "not_in_room";

#[derive(Debug)]
struct Peer {
    sender: mpsc::UnboundedSender<Frame>,
    /// Set by `user_online`, cleared by `user_offline`.
    employee_id: Option<String>,
}

#[derive(Debug)]
pub struct Relay {
    peers: RwLock<HashMap<PeerId, Peer>>,
    rooms: RwLock<HashMap<RoomRef, HashSet<PeerId>>>,
    next_message_id: AtomicU64,
}

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}

impl Relay {
    pub fn new() -> Self {
        Self {
            peers: RwLock::new(HashMap::new()),
            rooms: RwLock::new(HashMap::new()),
            next_message_id: AtomicU64::new(1),
        }
    }

    /// Register a new peer and return the queue of frames addressed to it.
    pub async fn connect(&self) -> (PeerId, mpsc::UnboundedReceiver<Frame>) {
        let id = Uuid::new_v4();
        let (sender, receiver) = mpsc::unbounded_channel();
        self.peers.write().await.insert(
            id,
            Peer {
                sender,
                employee_id: None,
            },
        );
        tracing::debug!("Peer {} connected", id);
        (id, receiver)
    }

    /// Drop a peer from every room. If it was the last link announcing its
    /// employee, everyone is told that employee went offline.
    pub async fn disconnect(&self, peer: PeerId) {
        {
            let mut rooms = self.rooms.write().await;
            rooms.retain(|_, members| {
                members.remove(&peer);
                !members.is_empty()
            });
        }

        let went_offline = {
            let mut peers = self.peers.write().await;
            let Some(removed) = peers.remove(&peer) else {
                return;
            };
            removed.employee_id.filter(|employee| {
                !peers
                    .values()
                    .any(|other| other.employee_id.as_deref() == Some(employee.as_str()))
            })
        };

        tracing::debug!("Peer {} disconnected", peer);
        if let Some(employee_id) = went_offline {
            self.broadcast_all(&ServerEvent::UserStatusChanged(UserStatusChanged {
                employee_id,
                status: UserStatus::Offline,
            }))
            .await;
        }
    }

    /// Handle one raw websocket text message.
    pub async fn handle_text(&self, peer: PeerId, text: &str) {
        match Frame::decode(text) {
            Ok(frame) => self.handle_frame(peer, &frame).await,
            Err(err) => self.reject(peer, &err).await,
        }
    }

    pub async fn handle_frame(&self, peer: PeerId, frame: &Frame) {
        match ClientCommand::from_frame(frame) {
            Ok(command) => self.handle_command(peer, command).await,
            Err(err) => self.reject(peer, &err).await,
        }
    }

    pub async fn handle_command(&self, peer: PeerId, command: ClientCommand) {
        if let Some(room) = command.room() {
            let scoped = !matches!(
                command,
                ClientCommand::JoinChat(_) | ClientCommand::LeaveChat(_)
            );
            if scoped && !self.is_member(&room, peer).await {
                tracing::debug!("Peer {} sent {} outside {}", peer, command.event_name(), room);
                let event = ServerEvent::error(
                    NOT_IN_ROOM,
                    format!("join {} before sending {}", room, command.event_name()),
                );
                self.send_to(peer, &event).await;
                return;
            }
        }

        match command {
            ClientCommand::JoinChat(room) => {
                tracing::debug!("Peer {} joined {}", peer, room);
                self.rooms.write().await.entry(room).or_default().insert(peer);
            }
            ClientCommand::LeaveChat(room) => {
                tracing::debug!("Peer {} left {}", peer, room);
                let mut rooms = self.rooms.write().await;
                if let Some(members) = rooms.get_mut(&room) {
                    members.remove(&peer);
                    if members.is_empty() {
                        rooms.remove(&room);
                    }
                }
            }
            ClientCommand::SendMessage(message) => {
                let room = RoomRef::new(message.chat_type.clone(), message.chat_id);
                let event = ServerEvent::NewMessage(ChatMessage {
                    id: self.next_message_id.fetch_add(1, Ordering::Relaxed),
                    chat_type: message.chat_type,
                    chat_id: message.chat_id,
                    sender_employee_id: message.sender_employee_id,
                    message: message.message,
                    message_type: message.message_type,
                    created_at: Utc::now(),
                });
                self.broadcast_room(&room, &event, None).await;
            }
            ClientCommand::MarkRead(read) => {
                let room = RoomRef::new(read.chat_type.clone(), read.chat_id);
                let event = ServerEvent::MessageRead(MessageRead {
                    chat_type: read.chat_type,
                    chat_id: read.chat_id,
                    message_id: read.message_id,
                    employee_id: read.employee_id,
                    read_at: Utc::now(),
                });
                self.broadcast_room(&room, &event, None).await;
            }
            ClientCommand::AddReaction(reaction) => {
                let room = RoomRef::new(reaction.chat_type.clone(), reaction.chat_id);
                let event = ServerEvent::MessageReaction(MessageReaction {
                    chat_type: reaction.chat_type,
                    chat_id: reaction.chat_id,
                    message_id: reaction.message_id,
                    employee_id: reaction.employee_id,
                    reaction: reaction.reaction,
                });
                self.broadcast_room(&room, &event, None).await;
            }
            ClientCommand::EditMessage(edit) => {
                let room = RoomRef::new(edit.chat_type.clone(), edit.chat_id);
                let event = ServerEvent::MessageEdited(MessageEdited {
                    chat_type: edit.chat_type,
                    chat_id: edit.chat_id,
                    message_id: edit.message_id,
                    employee_id: edit.employee_id,
                    message: edit.message,
                    edited_at: Utc::now(),
                });
                self.broadcast_room(&room, &event, None).await;
            }
            ClientCommand::DeleteMessage(delete) => {
                let room = RoomRef::new(delete.chat_type.clone(), delete.chat_id);
                let event = ServerEvent::MessageDeleted(MessageDeleted {
                    chat_type: delete.chat_type,
                    chat_id: delete.chat_id,
                    message_id: delete.message_id,
                    employee_id: delete.employee_id,
                });
                self.broadcast_room(&room, &event, None).await;
            }
            ClientCommand::TypingStart(typing) => self.relay_typing(peer, typing, true).await,
            ClientCommand::TypingStop(typing) => self.relay_typing(peer, typing, false).await,
            ClientCommand::UserOnline(update) => {
                self.set_employee(peer, update.employee_id.clone()).await;
                self.broadcast_all(&ServerEvent::UserStatusChanged(UserStatusChanged {
                    employee_id: update.employee_id,
                    status: UserStatus::Online,
                }))
                .await;
            }
            ClientCommand::UserOffline(update) => {
                self.clear_employee(peer, &update.employee_id).await;
                self.broadcast_all(&ServerEvent::UserStatusChanged(UserStatusChanged {
                    employee_id: update.employee_id,
                    status: UserStatus::Offline,
                }))
                .await;
            }
        }
    }

    async fn relay_typing(&self, peer: PeerId, typing: Typing, is_typing: bool) {
        let room = RoomRef::new(typing.chat_type.clone(), typing.chat_id);
        let event = ServerEvent::UserTyping(UserTyping {
            chat_type: typing.chat_type,
            chat_id: typing.chat_id,
            employee_id: typing.employee_id,
            is_typing,
        });
        self.broadcast_room(&room, &event, Some(peer)).await;
    }

    async fn set_employee(&self, peer: PeerId, employee_id: String) {
        if let Some(entry) = self.peers.write().await.get_mut(&peer) {
            entry.employee_id = Some(employee_id);
        }
    }

    /// Forget the peer's employee only if `employee_id` is the one it announced.
    async fn clear_employee(&self, peer: PeerId, employee_id: &str) {
        if let Some(entry) = self.peers.write().await.get_mut(&peer) {
            if entry.employee_id.as_deref() == Some(employee_id) {
                entry.employee_id = None;
            }
        }
    }

    async fn reject(&self, peer: PeerId, err: &ProtocolError) {
        tracing::debug!("Rejected frame from {}: {}", peer, err);
        self.send_to(peer, &ServerEvent::error(err.code(), err.to_string()))
            .await;
    }

    async fn is_member(&self, room: &RoomRef, peer: PeerId) -> bool {
        self.rooms
            .read()
            .await
            .get(room)
            .is_some_and(|members| members.contains(&peer))
    }

    pub async fn send_to(&self, peer: PeerId, event: &ServerEvent) {
        let Some(frame) = encode(event) else {
            return;
        };
        if let Some(entry) = self.peers.read().await.get(&peer) {
            let _ = entry.sender.send(frame);
        }
    }

    /// Deliver to every member of `room`, optionally skipping one peer.
    async fn broadcast_room(&self, room: &RoomRef, event: &ServerEvent, except: Option<PeerId>) {
        let Some(frame) = encode(event) else {
            return;
        };
        let rooms = self.rooms.read().await;
        let Some(members) = rooms.get(room) else {
            return;
        };
        let peers = self.peers.read().await;
        for member in members.iter().filter(|member| Some(**member) != except) {
            if let Some(entry) = peers.get(member) {
                let _ = entry.sender.send(frame.clone());
            }
        }
    }

    async fn broadcast_all(&self, event: &ServerEvent) {
        let Some(frame) = encode(event) else {
            return;
        };
        for entry in self.peers.read().await.values() {
            let _ = entry.sender.send(frame.clone());
        }
    }

    pub async fn peer_count(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn member_count(&self, room: &RoomRef) -> usize {
        self.rooms.read().await.get(room).map_or(0, HashSet::len)
    }
}

fn encode(event: &ServerEvent) -> Option<Frame> {
    match event.to_frame() {
        Ok(frame) => Some(frame),
        Err(err) => {
            tracing::error!("Failed to encode server event: {}", err);
            None
        }
    }
}

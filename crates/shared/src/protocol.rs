//! Relay protocol: event names, the frame envelope, and typed commands/events.
//!
//! Every unit on the wire is a [`Frame`], a JSON object of the form
//! `{"event": "<name>", "data": <payload>}`. WebSocket peers send one frame per
//! text message; long-polling peers exchange JSON arrays of frames.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::models::{
    AddReaction, ChatMessage, DeleteMessage, EditMessage, ErrorPayload, MarkRead, MessageDeleted,
    MessageEdited, MessageReaction, MessageRead, PresenceUpdate, RoomRef, SendMessage, Typing,
    UserStatusChanged, UserTyping,
};

/// Client → server event names.
pub mod outbound {
    pub const JOIN_CHAT: &str = "join_chat";
    pub const LEAVE_CHAT: &str = "leave_chat";
    pub const SEND_MESSAGE: &str = "send_message";
    pub const MARK_MESSAGE_READ: &str = "mark_message_read";
    pub const ADD_MESSAGE_REACTION: &str = "add_message_reaction";
    pub const EDIT_MESSAGE: &str = "edit_message";
    pub const DELETE_MESSAGE: &str = "delete_message";
    pub const TYPING_START: &str = "typing_start";
    pub const TYPING_STOP: &str = "typing_stop";
    pub const USER_ONLINE: &str = "user_online";
    pub const USER_OFFLINE: &str = "user_offline";

    pub const ALL: [&str; 11] = [
        JOIN_CHAT,
        LEAVE_CHAT,
        SEND_MESSAGE,
        MARK_MESSAGE_READ,
        ADD_MESSAGE_REACTION,
        EDIT_MESSAGE,
        DELETE_MESSAGE,
        TYPING_START,
        TYPING_STOP,
        USER_ONLINE,
        USER_OFFLINE,
    ];
}

/// Server → client event names, including the transport lifecycle names.
pub mod inbound {
    pub const CONNECT: &str = "connect";
    pub const DISCONNECT: &str = "disconnect";
    pub const CONNECT_ERROR: &str = "connect_error";
    pub const NEW_MESSAGE: &str = "new_message";
    pub const MESSAGE_READ: &str = "message_read";
    pub const MESSAGE_REACTION: &str = "message_reaction";
    pub const MESSAGE_EDITED: &str = "message_edited";
    pub const MESSAGE_DELETED: &str = "message_deleted";
    pub const USER_TYPING: &str = "user_typing";
    pub const USER_STATUS_CHANGED: &str = "user_status_changed";
    pub const ERROR: &str = "error";

    /// The fixed listener set a client relays to its subscribers.
    pub const ALL: [&str; 11] = [
        CONNECT,
        DISCONNECT,
        CONNECT_ERROR,
        NEW_MESSAGE,
        MESSAGE_READ,
        MESSAGE_REACTION,
        MESSAGE_EDITED,
        MESSAGE_DELETED,
        USER_TYPING,
        USER_STATUS_CHANGED,
        ERROR,
    ];

    /// Names that carry relayed data (everything but transport lifecycle).
    pub fn is_data_event(name: &str) -> bool {
        ALL.contains(&name) && !matches!(name, CONNECT | DISCONNECT | CONNECT_ERROR)
    }
}

/// A single event on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Serialize to the JSON text sent over a socket.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse one frame from JSON text.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let frame: Frame = serde_json::from_str(text)?;
        if frame.event.trim().is_empty() {
            return Err(ProtocolError::EmptyEvent);
        }
        Ok(frame)
    }

    /// Serialize a batch of frames (long-polling bodies).
    pub fn encode_batch(frames: &[Frame]) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(frames)?)
    }

    /// Parse a batch of frames, rejecting the whole batch if any frame is unnamed.
    pub fn decode_batch(text: &str) -> Result<Vec<Self>, ProtocolError> {
        let frames: Vec<Frame> = serde_json::from_str(text)?;
        if frames.iter().any(|f| f.event.trim().is_empty()) {
            return Err(ProtocolError::EmptyEvent);
        }
        Ok(frames)
    }
}

/// Commands a client sends to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientCommand {
    JoinChat(RoomRef),
    LeaveChat(RoomRef),
    SendMessage(SendMessage),
    #[serde(rename = "mark_message_read")]
    MarkRead(MarkRead),
    #[serde(rename = "add_message_reaction")]
    AddReaction(AddReaction),
    EditMessage(EditMessage),
    DeleteMessage(DeleteMessage),
    TypingStart(Typing),
    TypingStop(Typing),
    UserOnline(PresenceUpdate),
    UserOffline(PresenceUpdate),
}

impl ClientCommand {
    pub fn event_name(&self) -> &'static str {
        match self {
            ClientCommand::JoinChat(_) => outbound::JOIN_CHAT,
            ClientCommand::LeaveChat(_) => outbound::LEAVE_CHAT,
            ClientCommand::SendMessage(_) => outbound::SEND_MESSAGE,
            ClientCommand::MarkRead(_) => outbound::MARK_MESSAGE_READ,
            ClientCommand::AddReaction(_) => outbound::ADD_MESSAGE_REACTION,
            ClientCommand::EditMessage(_) => outbound::EDIT_MESSAGE,
            ClientCommand::DeleteMessage(_) => outbound::DELETE_MESSAGE,
            ClientCommand::TypingStart(_) => outbound::TYPING_START,
            ClientCommand::TypingStop(_) => outbound::TYPING_STOP,
            ClientCommand::UserOnline(_) => outbound::USER_ONLINE,
            ClientCommand::UserOffline(_) => outbound::USER_OFFLINE,
        }
    }

    /// The room a command targets, if it is room scoped.
    pub fn room(&self) -> Option<RoomRef> {
        let (chat_type, chat_id) = match self {
            ClientCommand::JoinChat(r) | ClientCommand::LeaveChat(r) => (&r.chat_type, r.chat_id),
            ClientCommand::SendMessage(m) => (&m.chat_type, m.chat_id),
            ClientCommand::MarkRead(m) => (&m.chat_type, m.chat_id),
            ClientCommand::AddReaction(m) => (&m.chat_type, m.chat_id),
            ClientCommand::EditMessage(m) => (&m.chat_type, m.chat_id),
            ClientCommand::DeleteMessage(m) => (&m.chat_type, m.chat_id),
            ClientCommand::TypingStart(t) | ClientCommand::TypingStop(t) => {
                (&t.chat_type, t.chat_id)
            }
            ClientCommand::UserOnline(_) | ClientCommand::UserOffline(_) => return None,
        };
        Some(RoomRef::new(chat_type.clone(), chat_id))
    }

    pub fn to_frame(&self) -> Result<Frame, ProtocolError> {
        Ok(serde_json::from_value(serde_json::to_value(self)?)?)
    }

    pub fn from_frame(frame: &Frame) -> Result<Self, ProtocolError> {
        if !outbound::ALL.contains(&frame.event.as_str()) {
            return Err(ProtocolError::UnknownEvent(frame.event.clone()));
        }
        Ok(serde_json::from_value(serde_json::to_value(frame)?)?)
    }
}

/// Events the relay pushes to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    NewMessage(ChatMessage),
    MessageRead(MessageRead),
    MessageReaction(MessageReaction),
    MessageEdited(MessageEdited),
    MessageDeleted(MessageDeleted),
    UserTyping(UserTyping),
    UserStatusChanged(UserStatusChanged),
    Error(ErrorPayload),
}

impl ServerEvent {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerEvent::Error(ErrorPayload {
            code: code.into(),
            message: message.into(),
        })
    }

    pub fn to_frame(&self) -> Result<Frame, ProtocolError> {
        Ok(serde_json::from_value(serde_json::to_value(self)?)?)
    }

    pub fn from_frame(frame: &Frame) -> Result<Self, ProtocolError> {
        if !inbound::is_data_event(&frame.event) {
            return Err(ProtocolError::UnknownEvent(frame.event.clone()));
        }
        Ok(serde_json::from_value(serde_json::to_value(frame)?)?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::{MessageType, UserStatus};

    #[test]
    fn send_message_frame_has_flat_snake_case_payload() {
        let command = ClientCommand::SendMessage(SendMessage {
            chat_type: "party".to_string(),
            chat_id: 42,
            sender_employee_id: "u1".to_string(),
            message: "hi".to_string(),
            message_type: MessageType::Text,
        });

        let frame = command.to_frame().expect("frame");
        assert_eq!(frame.event, "send_message");
        assert_eq!(
            frame.data,
            json!({
                "chat_type": "party",
                "chat_id": 42,
                "sender_employee_id": "u1",
                "message": "hi",
                "message_type": "text",
            })
        );
    }

    #[test]
    fn renamed_commands_use_wire_names() {
        let read = ClientCommand::MarkRead(MarkRead {
            chat_type: "party".to_string(),
            chat_id: 1,
            message_id: 9,
            employee_id: "u2".to_string(),
        });
        assert_eq!(read.to_frame().unwrap().event, outbound::MARK_MESSAGE_READ);
        assert_eq!(read.event_name(), outbound::MARK_MESSAGE_READ);

        let online = ClientCommand::UserOnline(PresenceUpdate {
            employee_id: "u2".to_string(),
        });
        assert_eq!(online.to_frame().unwrap().event, outbound::USER_ONLINE);
        assert!(online.room().is_none());
    }

    #[test]
    fn client_command_parses_back_from_frame() {
        let frame = Frame::decode(r#"{"event":"join_chat","data":{"chat_type":"party","chat_id":3}}"#)
            .expect("decode");
        let command = ClientCommand::from_frame(&frame).expect("command");
        assert_eq!(command, ClientCommand::JoinChat(RoomRef::new("party", 3)));
    }

    #[test]
    fn unknown_command_is_rejected_by_name() {
        let frame = Frame::new("launch_rocket", json!({}));
        let err = ClientCommand::from_frame(&frame).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownEvent(name) if name == "launch_rocket"));
    }

    #[test]
    fn frame_without_event_name_is_rejected() {
        assert!(matches!(
            Frame::decode(r#"{"event":"  ","data":null}"#),
            Err(ProtocolError::EmptyEvent)
        ));
        assert!(Frame::decode("not json").is_err());
    }

    #[test]
    fn frame_data_defaults_to_null() {
        let frame = Frame::decode(r#"{"event":"connect"}"#).expect("decode");
        assert_eq!(frame.data, serde_json::Value::Null);
    }

    #[test]
    fn batch_decoding_rejects_any_unnamed_frame() {
        let ok = Frame::decode_batch(r#"[{"event":"a","data":1},{"event":"b"}]"#).expect("batch");
        assert_eq!(ok.len(), 2);
        assert!(Frame::decode_batch(r#"[{"event":"a"},{"event":""}]"#).is_err());
    }

    #[test]
    fn server_event_round_trips_through_frame() {
        let event = ServerEvent::UserStatusChanged(UserStatusChanged {
            employee_id: "u5".to_string(),
            status: UserStatus::Online,
        });
        let frame = event.to_frame().expect("frame");
        assert_eq!(frame.event, inbound::USER_STATUS_CHANGED);
        assert_eq!(frame.data, json!({"employee_id": "u5", "status": "online"}));
        assert_eq!(ServerEvent::from_frame(&frame).expect("event"), event);
    }

    #[test]
    fn lifecycle_names_are_not_data_events() {
        assert!(inbound::is_data_event(inbound::NEW_MESSAGE));
        assert!(inbound::is_data_event(inbound::ERROR));
        assert!(!inbound::is_data_event(inbound::CONNECT));
        assert!(!inbound::is_data_event("join_chat"));
    }
}

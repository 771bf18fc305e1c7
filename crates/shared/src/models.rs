//! Payload shapes carried in relay frames.
//!
//! Field names are the snake_case names the mobile app and relay already agree
//! on (`chat_type`, `chat_id`, `sender_employee_id`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Numeric chat room identifier.
pub type ChatId = u64;

/// Numeric message identifier assigned by the relay.
pub type MessageId = u64;

// --- Rooms ---

/// A chat room address: the chat type tag plus the room id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomRef {
    pub chat_type: String,
    pub chat_id: ChatId,
}

impl RoomRef {
    pub fn new(chat_type: impl Into<String>, chat_id: ChatId) -> Self {
        Self {
            chat_type: chat_type.into(),
            chat_id,
        }
    }
}

impl std::fmt::Display for RoomRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.chat_type, self.chat_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Online,
    Offline,
}

// --- Client commands ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendMessage {
    pub chat_type: String,
    pub chat_id: ChatId,
    pub sender_employee_id: String,
    pub message: String,
    #[serde(default)]
    pub message_type: MessageType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkRead {
    pub chat_type: String,
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub employee_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddReaction {
    pub chat_type: String,
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub employee_id: String,
    pub reaction: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditMessage {
    pub chat_type: String,
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub employee_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteMessage {
    pub chat_type: String,
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub employee_id: String,
}

/// Typing start/stop share one payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Typing {
    pub chat_type: String,
    pub chat_id: ChatId,
    pub employee_id: String,
}

/// Online/offline announcements share one payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceUpdate {
    pub employee_id: String,
}

// --- Server events ---

/// A message as relayed to room members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub chat_type: String,
    pub chat_id: ChatId,
    pub sender_employee_id: String,
    pub message: String,
    #[serde(default)]
    pub message_type: MessageType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRead {
    pub chat_type: String,
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub employee_id: String,
    pub read_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageReaction {
    pub chat_type: String,
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub employee_id: String,
    pub reaction: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEdited {
    pub chat_type: String,
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub employee_id: String,
    pub message: String,
    pub edited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDeleted {
    pub chat_type: String,
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub employee_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTyping {
    pub chat_type: String,
    pub chat_id: ChatId,
    pub employee_id: String,
    pub is_typing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStatusChanged {
    pub employee_id: String,
    pub status: UserStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

// --- Address lookup ---

/// Document served to clients that look up the relay address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocketConfig {
    pub socket_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_defaults_to_text_when_absent() {
        let parsed: SendMessage = serde_json::from_str(
            r#"{"chat_type":"party","chat_id":1,"sender_employee_id":"u1","message":"yo"}"#,
        )
        .expect("parse");
        assert_eq!(parsed.message_type, MessageType::Text);
    }

    #[test]
    fn room_ref_displays_as_type_and_id() {
        assert_eq!(RoomRef::new("party", 42).to_string(), "party:42");
    }
}

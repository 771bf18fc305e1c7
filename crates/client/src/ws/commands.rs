//! Builders for outbound commands.
//!
//! Each function maps call arguments onto the fixed payload shape of one wire
//! command. Nothing here validates content; empty text is sent as-is.

use lunchparty_shared::{
    AddReaction, ChatId, ClientCommand, DeleteMessage, EditMessage, MarkRead, MessageId,
    MessageType, PresenceUpdate, RoomRef, SendMessage, Typing,
};

/// A plain text message for `room`.
pub fn text_message(
    chat_type: impl Into<String>,
    chat_id: ChatId,
    sender_employee_id: impl Into<String>,
    message: impl Into<String>,
) -> SendMessage {
    SendMessage {
        chat_type: chat_type.into(),
        chat_id,
        sender_employee_id: sender_employee_id.into(),
        message: message.into(),
        message_type: MessageType::Text,
    }
}

pub fn join_chat(room: RoomRef) -> ClientCommand {
    ClientCommand::JoinChat(room)
}

pub fn leave_chat(room: RoomRef) -> ClientCommand {
    ClientCommand::LeaveChat(room)
}

pub fn send_message(message: SendMessage) -> ClientCommand {
    ClientCommand::SendMessage(message)
}

pub fn mark_read(room: &RoomRef, message_id: MessageId, employee_id: &str) -> ClientCommand {
    ClientCommand::MarkRead(MarkRead {
        chat_type: room.chat_type.clone(),
        chat_id: room.chat_id,
        message_id,
        employee_id: employee_id.to_string(),
    })
}

pub fn add_reaction(
    room: &RoomRef,
    message_id: MessageId,
    employee_id: &str,
    reaction: &str,
) -> ClientCommand {
    ClientCommand::AddReaction(AddReaction {
        chat_type: room.chat_type.clone(),
        chat_id: room.chat_id,
        message_id,
        employee_id: employee_id.to_string(),
        reaction: reaction.to_string(),
    })
}

pub fn edit_message(
    room: &RoomRef,
    message_id: MessageId,
    employee_id: &str,
    message: &str,
) -> ClientCommand {
    ClientCommand::EditMessage(EditMessage {
        chat_type: room.chat_type.clone(),
        chat_id: room.chat_id,
        message_id,
        employee_id: employee_id.to_string(),
        message: message.to_string(),
    })
}

pub fn delete_message(room: &RoomRef, message_id: MessageId, employee_id: &str) -> ClientCommand {
    ClientCommand::DeleteMessage(DeleteMessage {
        chat_type: room.chat_type.clone(),
        chat_id: room.chat_id,
        message_id,
        employee_id: employee_id.to_string(),
    })
}

fn typing(room: &RoomRef, employee_id: &str) -> Typing {
    Typing {
        chat_type: room.chat_type.clone(),
        chat_id: room.chat_id,
        employee_id: employee_id.to_string(),
    }
}

pub fn typing_start(room: &RoomRef, employee_id: &str) -> ClientCommand {
    ClientCommand::TypingStart(typing(room, employee_id))
}

pub fn typing_stop(room: &RoomRef, employee_id: &str) -> ClientCommand {
    ClientCommand::TypingStop(typing(room, employee_id))
}

pub fn user_online(employee_id: &str) -> ClientCommand {
    ClientCommand::UserOnline(PresenceUpdate {
        employee_id: employee_id.to_string(),
    })
}

pub fn user_offline(employee_id: &str) -> ClientCommand {
    ClientCommand::UserOffline(PresenceUpdate {
        employee_id: employee_id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use lunchparty_shared::outbound;
    use serde_json::json;

    use super::*;

    #[test]
    fn reaction_payload_shape() {
        let frame = add_reaction(&RoomRef::new("party", 42), 7, "u1", "👍")
            .to_frame()
            .unwrap();
        assert_eq!(frame.event, outbound::ADD_MESSAGE_REACTION);
        assert_eq!(
            frame.data,
            json!({
                "chat_type": "party",
                "chat_id": 42,
                "message_id": 7,
                "employee_id": "u1",
                "reaction": "👍",
            })
        );
    }

    #[test]
    fn typing_commands_share_payload_but_not_name() {
        let room = RoomRef::new("party", 3);
        let start = typing_start(&room, "u9").to_frame().unwrap();
        let stop = typing_stop(&room, "u9").to_frame().unwrap();
        assert_eq!(start.event, outbound::TYPING_START);
        assert_eq!(stop.event, outbound::TYPING_STOP);
        assert_eq!(start.data, stop.data);
    }

    #[test]
    fn empty_text_is_not_rejected_here() {
        let frame = send_message(text_message("party", 1, "u1", ""))
            .to_frame()
            .unwrap();
        assert_eq!(frame.data["message"], json!(""));
    }
}

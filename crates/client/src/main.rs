//! Lunchparty Chat - terminal client
//!
//! Connects to the relay, joins one room, prints what arrives and sends each
//! stdin line as a message. Lines starting with `/` are commands:
//! `/quit`, `/typing`, `/idle`, `/online`, `/offline`, `/read <id>`,
//! `/react <id> <emoji>`, `/edit <id> <text>`, `/delete <id>`.

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use lunchparty_client::logging::init_tracing;
use lunchparty_client::ws::commands;
use lunchparty_client::{events, ChatSocket, ClientConfig};
use lunchparty_shared::{inbound, ChatId, ChatMessage, RoomRef};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(name = "lunchparty-chat", about = "Chat in a lunchparty room from the terminal", version)]
struct Cli {
    /// Relay address; looked up (or taken from LUNCHPARTY_SERVER_URL) when omitted
    #[arg(long)]
    server: Option<String>,

    #[arg(long, default_value = "party")]
    chat_type: String,

    #[arg(long)]
    chat_id: ChatId,

    #[arg(long, env = "LUNCHPARTY_EMPLOYEE_ID")]
    employee_id: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing("lunchparty_client=info");

    let config = ClientConfig::from_env().context("reading client configuration")?;
    let socket = ChatSocket::new(config);
    let room = RoomRef::new(cli.chat_type.clone(), cli.chat_id);

    // Rejoin after every (re)connect; the relay forgets rooms with the link.
    let chat = socket.downgrade();
    let rejoin = room.clone();
    let me = cli.employee_id.clone();
    let _connected = socket.on(events::CONNECTED, move |payload| {
        println!("* connected ({})", payload["transport"].as_str().unwrap_or("?"));
        if let Some(chat) = chat.upgrade() {
            chat.join_room(&rejoin.chat_type, rejoin.chat_id);
            chat.set_online(&me);
        }
    });
    let _disconnected = socket.on(events::DISCONNECTED, |payload| {
        println!("* disconnected: {}", payload["reason"].as_str().unwrap_or("unknown"));
    });
    let _connect_error = socket.on(events::CONNECT_ERROR, |payload| {
        println!("* connect error: {}", payload["message"].as_str().unwrap_or("unknown"));
    });
    let _new_message = socket.on(inbound::NEW_MESSAGE, print_message);
    for event in [
        inbound::MESSAGE_READ,
        inbound::MESSAGE_REACTION,
        inbound::MESSAGE_EDITED,
        inbound::MESSAGE_DELETED,
        inbound::USER_TYPING,
        inbound::USER_STATUS_CHANGED,
        inbound::ERROR,
    ] {
        // Registrations live until disconnect clears them.
        let _ = socket.on(event, move |payload| println!("* {event}: {payload}"));
    }

    socket.connect(cli.server.clone()).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }
        if !run_command(&socket, &room, &cli.employee_id, line) {
            socket.send_message(commands::text_message(
                room.chat_type.clone(),
                room.chat_id,
                cli.employee_id.clone(),
                line,
            ));
        }
    }

    socket.set_offline(&cli.employee_id);
    socket.leave_room(&room.chat_type, room.chat_id);
    socket.disconnect();
    Ok(())
}

fn print_message(payload: &Value) {
    match serde_json::from_value::<ChatMessage>(payload.clone()) {
        Ok(message) => println!(
            "[{}] #{} {}: {}",
            message.created_at.with_timezone(&Local).format("%H:%M"),
            message.id,
            message.sender_employee_id,
            message.message
        ),
        Err(_) => println!("* new_message: {payload}"),
    }
}

/// Handle a `/command` line. Returns false when the line is plain text.
fn run_command(socket: &ChatSocket, room: &RoomRef, employee_id: &str, line: &str) -> bool {
    let Some(rest) = line.strip_prefix('/') else {
        return false;
    };
    let mut parts = rest.splitn(3, ' ');
    let name = parts.next().unwrap_or_default();
    let message_id = parts.next().and_then(|id| id.parse().ok());
    let argument = parts.next().unwrap_or_default();

    match (name, message_id) {
        ("typing", _) => socket.start_typing(employee_id),
        ("idle", _) => socket.stop_typing(employee_id),
        ("online", _) => socket.set_online(employee_id),
        ("offline", _) => socket.set_offline(employee_id),
        ("read", Some(id)) => socket.mark_read(room, id, employee_id),
        ("react", Some(id)) => socket.add_reaction(room, id, employee_id, argument),
        ("edit", Some(id)) => socket.edit_message(room, id, employee_id, argument),
        ("delete", Some(id)) => socket.delete_message(room, id, employee_id),
        _ => println!("* unknown command: {line}"),
    }
    true
}

use std::time::Duration;

use axum::{http::StatusCode, routing::get, Router};
use futures_util::{SinkExt, StreamExt};
use lunchparty_client::ws::commands;
use lunchparty_client::{events, ChatSocket, ClientConfig, ReconnectConfig, TransportKind};
use lunchparty_server::{AppState, ServerConfig};
use lunchparty_shared::{inbound, RoomRef, SocketConfig};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

async fn spawn_relay() -> (String, AppState) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base = format!("http://{addr}");
    let state = AppState::new(ServerConfig {
        bind_addr: addr,
        public_url: base.clone(),
        poll_window: Duration::from_secs(1),
        cors_origin: None,
    });
    tokio::spawn(lunchparty_server::serve(listener, state.clone()));
    (base, state)
}

fn client_config(base: &str, transport: TransportKind) -> ClientConfig {
    ClientConfig {
        server_url: base.to_string(),
        reconnect: ReconnectConfig {
            max_attempts: 2,
            base_delay: Duration::from_millis(50),
        },
        handshake_timeout: Duration::from_secs(2),
        transports: vec![transport],
        ..ClientConfig::default()
    }
}

async fn wait_connected(socket: &ChatSocket, address: Option<String>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let sub = socket.on(events::CONNECTED, move |payload| {
        let _ = tx.send(payload.clone());
    });
    socket.connect(address).await;
    timeout(WAIT, rx.recv())
        .await
        .expect("client did not connect")
        .expect("listener dropped");
    sub.unsubscribe();
}

async fn connected_client(base: &str, transport: TransportKind) -> ChatSocket {
    let socket = ChatSocket::new(client_config(base, transport));
    wait_connected(&socket, Some(base.to_string())).await;
    socket
}

fn collect(socket: &ChatSocket, event: &str) -> mpsc::UnboundedReceiver<Value> {
    let (tx, rx) = mpsc::unbounded_channel();
    // Registration lives until the socket disconnects.
    let _ = socket.on(event, move |payload| {
        let _ = tx.send(payload.clone());
    });
    rx
}

async fn wait_members(state: &AppState, room: &RoomRef, count: usize) {
    timeout(WAIT, async {
        while state.relay.member_count(room).await != count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("room membership did not settle");
}

async fn wait_peers(state: &AppState, count: usize) {
    timeout(WAIT, async {
        while state.relay.peer_count().await != count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("peer count did not settle");
}

async fn exchange_message(transport: TransportKind) {
    let (base, state) = spawn_relay().await;
    let alice = connected_client(&base, transport).await;
    let bob = connected_client(&base, transport).await;
    let mut alice_inbox = collect(&alice, inbound::NEW_MESSAGE);
    let mut bob_inbox = collect(&bob, inbound::NEW_MESSAGE);

    alice.join_room("party", 42);
    bob.join_room("party", 42);
    wait_members(&state, &RoomRef::new("party", 42), 2).await;

    alice.send_message(commands::text_message("party", 42, "u1", "hi"));

    for inbox in [&mut alice_inbox, &mut bob_inbox] {
        let payload = timeout(WAIT, inbox.recv()).await.unwrap().unwrap();
        assert_eq!(payload["message"], "hi");
        assert_eq!(payload["sender_employee_id"], "u1");
        assert_eq!(payload["chat_id"], 42);
        assert_eq!(payload["id"], 1);
    }

    alice.disconnect();
    bob.disconnect();
    wait_peers(&state, 0).await;
}

#[tokio::test]
async fn two_clients_exchange_a_message_over_websocket() {
    exchange_message(TransportKind::WebSocket).await;
}

#[tokio::test]
async fn two_clients_exchange_a_message_over_polling() {
    exchange_message(TransportKind::Polling).await;
}

#[tokio::test]
async fn typing_is_relayed_to_the_other_member_only() {
    let (base, state) = spawn_relay().await;
    let alice = connected_client(&base, TransportKind::WebSocket).await;
    let bob = connected_client(&base, TransportKind::WebSocket).await;
    let mut alice_typing = collect(&alice, inbound::USER_TYPING);
    let mut bob_typing = collect(&bob, inbound::USER_TYPING);

    alice.join_room("party", 7);
    bob.join_room("party", 7);
    wait_members(&state, &RoomRef::new("party", 7), 2).await;

    bob.start_typing("u2");

    let payload = timeout(WAIT, alice_typing.recv()).await.unwrap().unwrap();
    assert_eq!(payload["employee_id"], "u2");
    assert_eq!(payload["is_typing"], true);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(bob_typing.try_recv().is_err());
}

#[tokio::test]
async fn commands_for_an_unjoined_room_come_back_as_errors() {
    let (base, _state) = spawn_relay().await;
    let alice = connected_client(&base, TransportKind::WebSocket).await;
    let mut errors = collect(&alice, inbound::ERROR);

    alice.mark_read(&RoomRef::new("party", 9), 3, "u1");

    let payload = timeout(WAIT, errors.recv()).await.unwrap().unwrap();
    assert_eq!(payload["code"], "not_in_room");
}

#[tokio::test]
async fn socket_config_serves_the_public_url() {
    let (base, _state) = spawn_relay().await;

    let config: SocketConfig = reqwest::get(format!("{base}/api/socket-config"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(config.socket_url, base);
}

#[tokio::test]
async fn client_connects_through_the_lookup_endpoint() {
    let (base, state) = spawn_relay().await;
    let config = ClientConfig {
        server_url: "http://127.0.0.1:9".to_string(),
        lookup_url: Some(format!("{base}/api/socket-config")),
        ..client_config(&base, TransportKind::WebSocket)
    };
    let socket = ChatSocket::new(config);

    wait_connected(&socket, None).await;

    wait_peers(&state, 1).await;
}

async fn connect_through_lookup(lookup_url: String) {
    let (base, state) = spawn_relay().await;
    let config = ClientConfig {
        lookup_url: Some(lookup_url),
        lookup_timeout: Duration::from_millis(200),
        ..client_config(&base, TransportKind::WebSocket)
    };
    let socket = ChatSocket::new(config);

    wait_connected(&socket, None).await;

    wait_peers(&state, 1).await;
}

#[tokio::test]
async fn silent_lookup_endpoint_falls_back_to_server_url() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    // Accept and hold every connection without answering.
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    connect_through_lookup(format!("http://{addr}/api/socket-config")).await;
}

#[tokio::test]
async fn failing_lookup_endpoint_falls_back_to_server_url() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let broken = Router::new().route(
        "/api/socket-config",
        get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    tokio::spawn(async move { axum::serve(listener, broken).await });

    connect_through_lookup(format!("http://{addr}/api/socket-config")).await;
}

#[tokio::test]
async fn websocket_close_is_answered_with_close() {
    let (base, state) = spawn_relay().await;
    let url = format!("{}/socket", base.replacen("http://", "ws://", 1));
    let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    wait_peers(&state, 1).await;

    ws.send(Message::Close(None)).await.unwrap();

    let reply = timeout(WAIT, ws.next()).await.expect("no reply to close");
    assert!(matches!(reply, Some(Ok(Message::Close(_)))), "got {reply:?}");
    wait_peers(&state, 0).await;
}

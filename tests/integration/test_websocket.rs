//! Integration tests for the WebSocket console feed.
//!
//! These tests validate connection handling, log and state streaming, and
//! concurrent client support.

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use futures::SinkExt;
use futures::StreamExt;
use pykitchen_core::{
    create_router, AppState, Catalog, EventBroadcaster, EventKind, HintAdvisor, KitchenEvent,
    KitchenRuntime, PacingConfig, Phase, Session,
};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tungstenite::Message;

/// Helper to find an available port for testing.
fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

/// Helper type for WebSocket client
type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Addresses of a spawned test server.
struct TestServer {
    ws_url: String,
    api_url: String,
    runtime: KitchenRuntime,
    _handle: tokio::task::JoinHandle<()>,
}

/// Spawns a server over the bundled catalog.
async fn spawn_test_server() -> TestServer {
    let catalog = Arc::new(Catalog::builtin().expect("bundled catalog loads"));
    let session = Session::new(catalog, PacingConfig::immediate()).expect("session starts");
    let runtime = KitchenRuntime::new(session, HintAdvisor::offline(), EventBroadcaster::default());

    let port = find_available_port();
    let addr = format!("127.0.0.1:{port}");

    let router = create_router(AppState::new(runtime.clone()));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    // Give the server a moment to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestServer {
        ws_url: format!("ws://{addr}/api/ws"),
        api_url: format!("http://{addr}/api"),
        runtime,
        _handle: handle,
    }
}

/// Connects a WebSocket client to the given URL.
async fn connect_client(url: &str) -> WsClient {
    let (ws_stream, _) = connect_async(url)
        .await
        .expect("Failed to connect to WebSocket");
    ws_stream
}

/// Receives the next text message from the WebSocket and parses it as `KitchenEvent`.
/// Automatically handles ping frames by responding with pong.
async fn receive_event(client: &mut WsClient) -> KitchenEvent {
    loop {
        let msg = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("Timeout waiting for message")
            .expect("Stream ended")
            .expect("WebSocket error");

        match msg {
            Message::Text(text) => {
                return serde_json::from_str(&text).expect("Failed to parse event");
            }
            Message::Ping(data) => {
                // Respond to ping and continue waiting for text message
                client
                    .send(Message::Pong(data))
                    .await
                    .expect("Failed to send pong");
            }
            Message::Pong(_) => {
                // Ignore pong messages, continue waiting
            }
            other => panic!("Expected text message, got: {other:?}"),
        }
    }
}

/// Receives events until a log entry arrives, skipping state events.
async fn receive_log(client: &mut WsClient) -> (EventKind, String) {
    loop {
        if let KitchenEvent::Log(payload) = receive_event(client).await {
            return (payload.entry.kind, payload.entry.message);
        }
    }
}

/// Receives events until a state event arrives.
async fn receive_state(client: &mut WsClient) -> (usize, u32, Phase) {
    loop {
        if let KitchenEvent::State(state) = receive_event(client).await {
            return (state.level, state.score, state.phase);
        }
    }
}

/// Connects and consumes the initial `connected` event.
async fn connect_ready(url: &str) -> WsClient {
    let mut client = connect_client(url).await;
    let event = receive_event(&mut client).await;
    assert!(
        matches!(event, KitchenEvent::Connected(_)),
        "Expected Connected event, got: {event:?}"
    );
    client
}

// ============================================================================
// Connection Tests
// ============================================================================

/// Tests that a WebSocket client receives a connected event on connection.
#[tokio::test]
async fn test_client_receives_connected_event_on_connect() {
    let server = spawn_test_server().await;

    let mut client = connect_client(&server.ws_url).await;
    let event = receive_event(&mut client).await;

    let KitchenEvent::Connected(payload) = event else {
        panic!("Expected Connected event");
    };
    assert_eq!(payload.state.level, 0);
    assert_eq!(payload.state.phase, Phase::AwaitingTool);
    assert_eq!(payload.state.order.title, "Checkout total");
}

/// Tests that the connected event reflects commands issued before connecting.
#[tokio::test]
async fn test_connected_event_contains_current_state() {
    let server = spawn_test_server().await;
    server
        .runtime
        .select_tool("tool_len")
        .await
        .expect("tool exists");

    let mut client = connect_client(&server.ws_url).await;
    let event = receive_event(&mut client).await;

    let KitchenEvent::Connected(payload) = event else {
        panic!("Expected Connected event");
    };
    assert_eq!(payload.state.selected_tool.as_deref(), Some("tool_len"));
    assert_eq!(payload.state.phase, Phase::AwaitingArguments);
    assert_eq!(payload.state.log[0].message, "Tool selected: len");
}

// ============================================================================
// Streaming Tests
// ============================================================================

/// Tests that an HTTP command is mirrored as log and state events.
#[tokio::test]
async fn test_http_command_streams_log_then_state() {
    let server = spawn_test_server().await;
    let mut client = connect_ready(&server.ws_url).await;

    let response = reqwest::Client::new()
        .post(format!("{}/tool", server.api_url))
        .json(&json!({"id": "tool_add"}))
        .send()
        .await
        .expect("request sent");
    assert!(response.status().is_success());

    let event = receive_event(&mut client).await;
    let KitchenEvent::Log(payload) = event else {
        panic!("Expected Log event");
    };
    assert_eq!(payload.entry.message, "Tool selected: add");
    assert_eq!(payload.entry.kind, EventKind::Info);

    let event = receive_event(&mut client).await;
    let KitchenEvent::State(state) = event else {
        panic!("Expected State event");
    };
    assert_eq!(state.phase, Phase::AwaitingArguments);
}

/// Tests a solved order streaming success and the next order.
#[tokio::test]
async fn test_success_and_advance_are_streamed() {
    let server = spawn_test_server().await;
    let mut client = connect_ready(&server.ws_url).await;

    let runtime = &server.runtime;
    runtime.select_tool("tool_add").await.expect("tool exists");
    for (slot, ingredient) in ["price_a", "price_b"].iter().enumerate() {
        runtime
            .select_ingredient(ingredient)
            .await
            .expect("ingredient exists");
        runtime.place(slot).await.expect("slot exists");
    }
    runtime.run().await;

    let mut messages = Vec::new();
    loop {
        let (kind, message) = receive_log(&mut client).await;
        messages.push(message.clone());
        if kind == EventKind::Success {
            break;
        }
    }
    assert_eq!(
        messages[messages.len() - 2..],
        [
            "Execution: add(10, 25) returned 35".to_string(),
            "SUCCESS! Order complete. Result: 35".to_string(),
        ]
    );

    assert_eq!(
        receive_state(&mut client).await,
        (0, 100, Phase::LevelComplete)
    );
    assert_eq!(
        receive_log(&mut client).await,
        (EventKind::Info, "New order received!".to_string())
    );
    assert_eq!(
        receive_state(&mut client).await,
        (1, 100, Phase::AwaitingTool)
    );
}

/// Tests that a hint request streams the question and the answer.
#[tokio::test]
async fn test_hint_is_streamed() {
    let server = spawn_test_server().await;
    let mut client = connect_ready(&server.ws_url).await;

    let response = reqwest::Client::new()
        .post(format!("{}/hint", server.api_url))
        .send()
        .await
        .expect("request sent");
    assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);

    assert_eq!(
        receive_log(&mut client).await,
        (EventKind::Advisory, "Asking the chef...".to_string())
    );
    assert_eq!(
        receive_log(&mut client).await,
        (
            EventKind::Advisory,
            "Chef: Use the add() function to add two numbers.".to_string()
        )
    );
}

// ============================================================================
// Multiple Client Tests
// ============================================================================

/// Tests that all connected clients receive the same events.
#[tokio::test]
async fn test_multiple_clients_receive_events() {
    let server = spawn_test_server().await;
    let mut client1 = connect_ready(&server.ws_url).await;
    let mut client2 = connect_ready(&server.ws_url).await;

    server.runtime.run().await;

    for client in [&mut client1, &mut client2] {
        let (kind, message) = receive_log(client).await;
        assert_eq!(kind, EventKind::Error);
        assert_eq!(message, "Error: select a tool first!");
    }
}

/// Tests that a disconnected client does not disturb the others.
#[tokio::test]
async fn test_client_disconnect_does_not_affect_others() {
    let server = spawn_test_server().await;
    let mut client1 = connect_ready(&server.ws_url).await;
    let mut client2 = connect_ready(&server.ws_url).await;

    client1.close(None).await.expect("close sent");
    drop(client1);
    tokio::time::sleep(Duration::from_millis(50)).await;

    server
        .runtime
        .select_tool("tool_sum")
        .await
        .expect("tool exists");

    assert_eq!(
        receive_log(&mut client2).await,
        (EventKind::Info, "Tool selected: sum".to_string())
    );
}

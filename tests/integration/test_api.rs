//! Integration tests for the HTTP API.
//!
//! A real server is bound to a free port and driven with reqwest, the way a
//! browser front end would drive it.

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use pykitchen_core::{
    create_router, AppState, Catalog, EventBroadcaster, HintAdvisor, KitchenRuntime,
    PacingConfig, Session,
};
use reqwest::StatusCode;
use serde_json::{json, Value};

/// Helper to find an available port for testing.
fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

/// Spawns a server over the bundled catalog and returns its API base URL.
async fn spawn_test_server(pacing: PacingConfig) -> (String, tokio::task::JoinHandle<()>) {
    let catalog = Arc::new(Catalog::builtin().expect("bundled catalog loads"));
    let session = Session::new(catalog, pacing).expect("session starts");
    let runtime = KitchenRuntime::new(session, HintAdvisor::offline(), EventBroadcaster::default());

    let port = find_available_port();
    let addr = format!("127.0.0.1:{port}");
    let base_url = format!("http://{addr}/api");

    let router = create_router(AppState::new(runtime));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    // Give the server a moment to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    (base_url, handle)
}

async fn post(client: &reqwest::Client, url: String, body: Option<Value>) -> (StatusCode, Value) {
    let request = client.post(url);
    let request = match body {
        Some(body) => request.json(&body),
        None => request,
    };
    let response = request.send().await.expect("request sent");
    let status = response.status();
    (status, response.json().await.expect("JSON body"))
}

// ============================================================================
// Reading state
// ============================================================================

/// A fresh session starts at the first order with nothing selected.
#[tokio::test]
async fn test_initial_state() {
    let (base, _handle) = spawn_test_server(PacingConfig::default()).await;

    let state: Value = reqwest::get(format!("{base}/state"))
        .await
        .expect("request sent")
        .json()
        .await
        .expect("JSON body");

    assert_eq!(state["level"], 0);
    assert_eq!(state["totalLevels"], 6);
    assert_eq!(state["score"], 0);
    assert_eq!(state["phase"], "awaiting_tool");
    assert_eq!(state["order"]["expectedResult"], 35);
    assert!(state["selectedTool"].is_null());
    assert_eq!(state["log"], json!([]));
}

/// The catalog endpoint serves the definitions the front end renders.
#[tokio::test]
async fn test_catalog_endpoint() {
    let (base, _handle) = spawn_test_server(PacingConfig::default()).await;

    let catalog: Value = reqwest::get(format!("{base}/catalog"))
        .await
        .expect("request sent")
        .json()
        .await
        .expect("JSON body");

    assert_eq!(catalog["orders"].as_array().map(Vec::len), Some(6));
    assert_eq!(catalog["tools"][0]["signature"], "add(a, b)");
    assert_eq!(catalog["ingredients"][0]["name"], "price_a");
}

// ============================================================================
// Commands
// ============================================================================

/// Solves the first order over HTTP and waits for the next one.
#[tokio::test]
async fn test_solve_first_order() {
    let (base, _handle) = spawn_test_server(PacingConfig::immediate()).await;
    let client = reqwest::Client::new();

    let (status, body) = post(&client, format!("{base}/tool"), Some(json!({"id": "add"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["events"][0]["message"], "Tool selected: add");
    assert_eq!(body["state"]["phase"], "awaiting_arguments");

    for (slot, ingredient) in ["price_a", "price_b"].iter().enumerate() {
        let (status, _) = post(
            &client,
            format!("{base}/ingredient"),
            Some(json!({"id": ingredient})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = post(&client, format!("{base}/slots/{slot}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["events"][0]["message"],
            format!("Added {ingredient} to argument {}", slot + 1)
        );
    }

    let (status, body) = post(&client, format!("{base}/run"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verdict"], json!({"verdict": "success", "result": 35}));
    assert_eq!(body["state"]["score"], 100);
    assert_eq!(body["state"]["phase"], "level_complete");

    // The advance timer fires on its own
    let mut level = 0;
    for _ in 0..50 {
        let state: Value = reqwest::get(format!("{base}/state"))
            .await
            .expect("request sent")
            .json()
            .await
            .expect("JSON body");
        level = state["level"].as_u64().unwrap_or(0);
        if level == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(level, 1);
}

/// A wrong answer is reported as a mismatch and counted.
#[tokio::test]
async fn test_wrong_answer() {
    let (base, _handle) = spawn_test_server(PacingConfig::default()).await;
    let client = reqwest::Client::new();

    post(&client, format!("{base}/tool"), Some(json!({"id": "tool_sum"}))).await;
    post(&client, format!("{base}/ingredient"), Some(json!({"id": "cart_items"}))).await;
    post(&client, format!("{base}/slots/0"), None).await;

    let (_, body) = post(&client, format!("{base}/run"), None).await;
    assert_eq!(
        body["verdict"],
        json!({"verdict": "mismatch", "result": 50, "expected": 35})
    );
    assert_eq!(body["state"]["failures"], 1);
    assert_eq!(body["events"][1]["message"], "Wrong result. Expected: 35, got: 50");
}

/// Running with an empty slot executes nothing.
#[tokio::test]
async fn test_run_with_missing_arguments() {
    let (base, _handle) = spawn_test_server(PacingConfig::default()).await;
    let client = reqwest::Client::new();

    post(&client, format!("{base}/tool"), Some(json!({"id": "tool_add"}))).await;
    let (status, body) = post(&client, format!("{base}/run"), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verdict"], json!({"verdict": "incomplete_arguments"}));
    assert_eq!(body["events"][0]["kind"], "error");
    assert_eq!(body["state"]["failures"], 0);
}

/// Clearing slots over HTTP empties them again.
#[tokio::test]
async fn test_clear_slots() {
    let (base, _handle) = spawn_test_server(PacingConfig::default()).await;
    let client = reqwest::Client::new();

    post(&client, format!("{base}/tool"), Some(json!({"id": "tool_add"}))).await;
    post(&client, format!("{base}/ingredient"), Some(json!({"id": "price_a"}))).await;
    post(&client, format!("{base}/slots/0"), None).await;

    let response = client
        .delete(format!("{base}/slots/0"))
        .send()
        .await
        .expect("request sent");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("JSON body");
    assert_eq!(body["events"][0]["message"], "Cleared argument 1");
    assert_eq!(body["state"]["slots"], json!([null, null]));

    let response = client
        .delete(format!("{base}/slots"))
        .send()
        .await
        .expect("request sent");
    assert_eq!(response.status(), StatusCode::OK);
}

// ============================================================================
// Errors
// ============================================================================

/// Unknown ids are 404s; out-of-range slots are 400s.
#[tokio::test]
async fn test_error_statuses() {
    let (base, _handle) = spawn_test_server(PacingConfig::default()).await;
    let client = reqwest::Client::new();

    let (status, body) = post(&client, format!("{base}/tool"), Some(json!({"id": "oven"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Unknown tool: 'oven'");

    let (status, _) = post(
        &client,
        format!("{base}/ingredient"),
        Some(json!({"id": "salt"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    post(&client, format!("{base}/tool"), Some(json!({"id": "tool_len"}))).await;
    let (status, body) = post(&client, format!("{base}/slots/3"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .is_some_and(|e| e.contains("out of range")));
}

/// Hint requests are accepted and answered asynchronously.
#[tokio::test]
async fn test_hint_is_accepted() {
    let (base, _handle) = spawn_test_server(PacingConfig::default()).await;
    let client = reqwest::Client::new();

    let (status, body) = post(&client, format!("{base}/hint"), None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "started");
}

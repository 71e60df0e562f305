//! Router-level tests: requests go through the full Axum stack with an
//! SQLite-backed state in a temporary data directory.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use netscribe_capture::SystemClock;
use netscribe_core::NetscribeConfig;
use netscribe_server::{routes, AppState};
use netscribe_store::SqliteStore;
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_state() -> (Arc<AppState>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = NetscribeConfig::from_env(dir.path().join("data")).unwrap();
    let store = SqliteStore::open(&config.data_paths.storage).unwrap();
    let state = AppState::new(config, Arc::new(store), Arc::new(SystemClock)).unwrap();
    (Arc::new(state), dir)
}

async fn call(state: &Arc<AppState>, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = routes::build_router(state.clone())
        .oneshot(request)
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn activate(state: &Arc<AppState>, api: &str, console: &str) {
    let (status, body) = call(
        state,
        "PUT",
        "/api/settings",
        Some(json!({
            "apiTargetUrl": api,
            "consoleTargetUrl": console,
            "isLoggingActive": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
}

#[tokio::test]
async fn test_control_messages_round_trip() {
    let (state, _dir) = test_state();

    let (status, body) = call(
        &state,
        "POST",
        "/api/control",
        Some(json!({"action": "setConsoleTargetUrl", "url": "app.local"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));

    let (_, body) = call(
        &state,
        "POST",
        "/api/control",
        Some(json!({"action": "getConsoleTargetUrl"})),
    )
    .await;
    assert_eq!(body, json!({"url": "app.local"}));

    let (_, body) = call(
        &state,
        "POST",
        "/api/control",
        Some(json!({"action": "getLoggingActive"})),
    )
    .await;
    assert_eq!(body, json!({"active": false}));
}

#[tokio::test]
async fn test_unknown_action_is_rejected() {
    let (state, _dir) = test_state();
    let (status, body) = call(
        &state,
        "POST",
        "/api/control",
        Some(json!({"action": "formatDisk"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("formatDisk"));

    let (status, body) = call(&state, "POST", "/api/control", Some(json!({"url": "x"}))).await;
    assert!(status.is_client_error());
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_settings_require_a_url() {
    let (state, _dir) = test_state();
    let (status, body) = call(
        &state,
        "PUT",
        "/api/settings",
        Some(json!({"apiTargetUrl": " ", "consoleTargetUrl": "", "isLoggingActive": true})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["text"], "Enter at least one URL!");
    assert_eq!(body["isError"], true);
}

#[tokio::test]
async fn test_web_request_lifecycle() {
    let (state, _dir) = test_state();
    activate(&state, "api.example.com", "").await;

    let (_, body) = call(
        &state,
        "POST",
        "/api/web-request/before-send",
        Some(json!({
            "requestId": "42",
            "method": "POST",
            "url": "https://api.example.com/orders",
            "requestBody": {"raw": [{"bytes": [123, 125]}]},
            "requestHeaders": [{"name": "Content-Type", "value": "application/json"}]
        })),
    )
    .await;
    assert_eq!(body["outcome"], "recorded");

    let (_, body) = call(
        &state,
        "POST",
        "/api/web-request/completed",
        Some(json!({"requestId": "42", "statusCode": 201})),
    )
    .await;
    assert_eq!(body["outcome"], "completed");

    let (_, body) = call(
        &state,
        "POST",
        "/api/web-request/failed",
        Some(json!({"requestId": "42", "error": "late"})),
    )
    .await;
    assert_eq!(body["outcome"], "alreadyTerminal");

    let (_, body) = call(
        &state,
        "POST",
        "/api/control",
        Some(json!({"action": "getNetworkLogs"})),
    )
    .await;
    let logs = body["logs"].as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["status"], 201);
    assert_eq!(logs[0]["requestBody"], "{}");
    assert_eq!(logs[0]["requestHeaders"]["Content-Type"], "application/json");
}

#[tokio::test]
async fn test_page_messages_are_relayed_and_exported() {
    let (state, _dir) = test_state();
    activate(&state, "api.example.com", "app.local").await;

    let (status, body) = call(
        &state,
        "POST",
        "/api/pages",
        Some(json!({"url": "https://app.local/checkout"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["injected"], true);
    let page_id = body["pageId"].as_str().unwrap().to_string();

    let (_, body) = call(
        &state,
        "POST",
        &format!("/api/pages/{}/messages", page_id),
        Some(json!({
            "source": "logger-extension",
            "type": "ERROR",
            "payload": "payment failed {\"code\":7}",
            "timestamp": "2024-01-01T00:00:00.000Z",
            "url": "https://app.local/checkout"
        })),
    )
    .await;
    assert_eq!(body["outcome"], "persisted");
    assert_eq!(body["total"], 1);

    let (_, body) = call(
        &state,
        "POST",
        &format!("/api/pages/{}/messages", page_id),
        Some(json!({"source": "someone-else", "payload": "x"})),
    )
    .await;
    assert_eq!(body["outcome"], "rejected");
    assert_eq!(body["error"]["reason"], "unknownSource");

    let (_, counts) = call(&state, "GET", "/api/counts", None).await;
    assert_eq!(counts["console"], 1);
    assert_eq!(counts["openPages"], 1);

    let (_, body) = call(&state, "POST", "/api/export", None).await;
    assert_eq!(body["status"]["text"], "Logs downloaded!");
    let saved = body["saved"].as_array().unwrap();
    assert_eq!(saved.len(), 1);
    let text = std::fs::read_to_string(saved[0].as_str().unwrap()).unwrap();
    assert!(text.contains("[ERROR] payment failed {\"code\":7}\nURL: https://app.local/checkout\n"));

    let (status, _) = call(&state, "DELETE", &format!("/api/pages/{}", page_id), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(
        &state,
        "POST",
        &format!("/api/pages/{}/messages", page_id),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_clear_then_export_reports_nothing() {
    let (state, _dir) = test_state();
    activate(&state, "api.example.com", "").await;
    call(
        &state,
        "POST",
        "/api/web-request/before-send",
        Some(json!({"requestId": "1", "method": "GET", "url": "https://api.example.com/a"})),
    )
    .await;

    let (_, body) = call(&state, "POST", "/api/clear", None).await;
    assert_eq!(body["text"], "Logs cleared!");

    let (_, body) = call(&state, "POST", "/api/export", None).await;
    assert_eq!(body["status"]["text"], "No logs yet!");
    assert_eq!(body["status"]["isError"], true);
}

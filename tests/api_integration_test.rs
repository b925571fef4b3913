//! Integration tests for the HTTP API.
//! Covers task submission validation, message polling, instruction
//! generation error paths, and API key auth.

use axum::http::StatusCode;
use tower::ServiceExt;
use voxpilot::api::{app, ApiState};
use voxpilot::config::AppConfig;
use voxpilot::state::AppState;

fn make_state() -> ApiState {
    let mut config = AppConfig::default();
    // Point the controller at a closed port so background jobs fail fast.
    config.agent.controller_url = "http://127.0.0.1:9".to_string();
    AppState::new(config)
}

fn make_app_no_auth() -> (axum::Router, ApiState) {
    let state = make_state();
    (app(state.clone(), None), state)
}

fn make_app_with_auth(api_key: &str) -> axum::Router {
    app(make_state(), Some(api_key.to_string()))
}

fn json_request(uri: &str, val: &serde_json::Value) -> axum::http::Request<axum::body::Body> {
    axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(axum::body::Body::from(serde_json::to_vec(val).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> axum::http::Request<axum::body::Body> {
    axum::http::Request::builder()
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_api_health() {
    let (app, _) = make_app_no_auth();
    let response = app.oneshot(get_request("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_parallel_requests_all_served() {
    let (app, _) = make_app_no_auth();
    let mut handles = Vec::new();
    for _ in 0..8 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            app.oneshot(get_request("/api/health")).await.unwrap().status()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_auth_rejects_missing_key() {
    let app = make_app_with_auth("secret");
    let response = app.oneshot(get_request("/api/messages")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_accepts_valid_key() {
    let app = make_app_with_auth("secret");
    let request = axum::http::Request::builder()
        .uri("/api/messages")
        .header("X-API-Key", "secret")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_exempt_from_auth() {
    let app = make_app_with_auth("secret");
    let response = app.oneshot(get_request("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Task submission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_task_requires_text_or_audio() {
    let (app, _) = make_app_no_auth();
    let response = app
        .oneshot(json_request("/api/task", &serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_blank_task_rejected() {
    let (app, _) = make_app_no_auth();
    let response = app
        .oneshot(json_request("/api/task", &serde_json::json!({"task": "   "})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_task_accepted_and_failure_surfaces_in_queue() {
    let (app, state) = make_app_no_auth();
    let response = app
        .oneshot(json_request(
            "/api/task",
            &serde_json::json!({"task": "check the weather"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "accepted");

    // No generator is configured, so the background pipeline reports an
    // error through the queue.
    let mut drained = Vec::new();
    for _ in 0..20 {
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        drained = state.outbox.drain();
        if !drained.is_empty() {
            break;
        }
    }
    assert!(!drained.is_empty(), "expected an error message in the queue");
    let text = serde_json::to_string(&drained).unwrap();
    assert!(text.contains("Error"));
}

#[tokio::test]
async fn test_exit_when_idle() {
    let (app, state) = make_app_no_auth();
    let response = app
        .oneshot(json_request("/api/task", &serde_json::json!({"task": "exit"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "idle");

    let drained = state.outbox.drain();
    assert_eq!(drained.len(), 1);
    assert!(serde_json::to_string(&drained).unwrap().contains("No task is running"));
}

#[tokio::test]
async fn test_invalid_audio_payload_surfaces_in_queue() {
    let (app, state) = make_app_no_auth();
    let response = app
        .oneshot(json_request(
            "/api/task",
            &serde_json::json!({"audioData": "!!! not base64 !!!"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut drained = Vec::new();
    for _ in 0..20 {
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        drained = state.outbox.drain();
        if !drained.is_empty() {
            break;
        }
    }
    let text = serde_json::to_string(&drained).unwrap();
    assert!(text.contains("Error transcribing audio"));
}

// ---------------------------------------------------------------------------
// Message polling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_messages_drain_in_order() {
    let (app, state) = make_app_no_auth();
    state.outbox.push_text("first");
    state.outbox.push_text("second");

    let response = app
        .clone()
        .oneshot(get_request("/api/messages"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["body"], "first");
    assert_eq!(messages[1]["body"], "second");

    // Second poll returns nothing.
    let response = app.oneshot(get_request("/api/messages")).await.unwrap();
    let body = body_json(response).await;
    assert!(body["messages"].as_array().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Instruction generation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_generate_requires_prompt() {
    let (app, _) = make_app_no_auth();
    let response = app
        .oneshot(json_request("/api/generate", &serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_generate_without_provider_errors() {
    let (app, _) = make_app_no_auth();
    let response = app
        .oneshot(json_request(
            "/api/generate",
            &serde_json::json!({"prompt": "book a table"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

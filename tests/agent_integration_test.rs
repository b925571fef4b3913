//! Integration tests for the agent engine and the login cycle plumbing.

use std::sync::Arc;
use voxpilot::agent::{AgentEngine, AgentEvent, SessionPhase, TaskOptions};
use voxpilot::config::AgentConfig;
use voxpilot::outbox::Outbox;

fn make_engine() -> (AgentEngine, Arc<Outbox>) {
    let outbox = Arc::new(Outbox::new());
    let config = AgentConfig {
        // Closed port: controller calls fail immediately.
        controller_url: "http://127.0.0.1:9".to_string(),
        poll_interval_ms: 10,
        ..AgentConfig::default()
    };
    (AgentEngine::new(config, Arc::clone(&outbox)), outbox)
}

#[tokio::test]
async fn test_engine_idle_by_default() {
    let (engine, _) = make_engine();
    assert!(!engine.is_busy().await);
    assert!(!engine.login_pending().await);
    assert!(engine.active_phase().await.is_none());
}

#[tokio::test]
async fn test_submit_with_unreachable_controller_releases_slot() {
    let (engine, _) = make_engine();
    let result = engine
        .submit("open example.com".to_string(), TaskOptions::default())
        .await;
    assert!(result.is_err());
    // The run never started, so the engine must not stay busy.
    assert!(!engine.is_busy().await);
}

#[tokio::test]
async fn test_login_reply_without_session_errors() {
    let (engine, _) = make_engine();
    assert!(engine.handle_login_reply("continue").await.is_err());
}

#[tokio::test]
async fn test_stop_without_session_errors() {
    let (engine, _) = make_engine();
    assert!(engine.stop_active().await.is_err());
}

// ---------------------------------------------------------------------------
// Login phase machine (full cycle, as the engine drives it)
// ---------------------------------------------------------------------------

#[test]
fn test_full_login_cycle() {
    let phase = SessionPhase::Idle.start().unwrap();
    let phase = phase.intercept_login("bank.example").unwrap();
    assert!(phase.login_pending());
    assert_eq!(phase.domain(), Some("bank.example"));

    let phase = phase.request_credentials().unwrap();
    assert!(phase.login_pending());

    let phase = phase.resume().unwrap();
    assert_eq!(phase, SessionPhase::Running);
}

#[test]
fn test_only_one_login_sequence_pending() {
    let paused = SessionPhase::Running.intercept_login("a.example").unwrap();
    // A second interception is rejected until the first resolves.
    assert!(paused.intercept_login("b.example").is_err());
    let awaiting = paused.request_credentials().unwrap();
    assert!(awaiting.intercept_login("b.example").is_err());
}

// ---------------------------------------------------------------------------
// Controller event wire format
// ---------------------------------------------------------------------------

#[test]
fn test_event_stream_decoding() {
    let events: Vec<AgentEvent> = serde_json::from_str(
        r#"[
            {"kind": "step", "seq": 1, "message": "Opened https://example.com"},
            {"kind": "step", "seq": 2, "message": "Clicked 'Sign in'"},
            {"kind": "login_required", "seq": 3, "domain": "example.com"},
            {"kind": "finished", "seq": 4, "success": false}
        ]"#,
    )
    .unwrap();

    assert_eq!(events.len(), 4);
    let seqs: Vec<u64> = events.iter().map(|e| e.seq()).collect();
    assert_eq!(seqs, vec![1, 2, 3, 4]);
    match &events[3] {
        AgentEvent::Finished { success, summary, .. } => {
            assert!(!success);
            assert!(summary.is_none());
        }
        other => panic!("expected finished event, got {:?}", other),
    }
}

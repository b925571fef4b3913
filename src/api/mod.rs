//! HTTP API for the chat front-end: task submission, message polling,
//! instruction refinement, and the static page itself.

use crate::error::VoxpilotError;
use crate::media::decode_audio_payload;
use crate::outbox::OutboundMessage;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::path::PathBuf;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

pub type ApiState = AppState;

/// Requests served at once; the rest queue at the socket.
const MAX_IN_FLIGHT: usize = 32;

/// API key authentication middleware.
/// Skips authentication for GET /api/health so monitors can probe the server.
async fn api_key_auth(
    State(expected_key): State<String>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if request.uri().path() == "/api/health" {
        return Ok(next.run(request).await);
    }
    let provided = request
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok());
    match provided {
        Some(k) if k == expected_key => Ok(next.run(request).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

/// API routes plus the static front-end, with optional key auth.
pub fn app(state: ApiState, api_key: Option<String>) -> Router {
    let static_dir = state.config.read().server.static_dir.clone();

    let mut api = Router::new()
        .route("/api/task", post(run_task))
        .route("/api/messages", get(poll_messages))
        .route("/api/generate", post(generate_instruction))
        .route("/api/health", get(health))
        .with_state(state);

    if let Some(key) = api_key {
        api = api.layer(middleware::from_fn_with_state(key, api_key_auth));
    }

    api.fallback_service(serve_front_end(static_dir))
        .layer(CorsLayer::permissive())
        .layer(ConcurrencyLimitLayer::new(MAX_IN_FLIGHT))
}

fn serve_front_end(static_dir: PathBuf) -> ServeDir {
    ServeDir::new(static_dir).append_index_html_on_directories(true)
}

/// Bind and serve until shutdown.
pub async fn run_server(state: ApiState) -> crate::error::Result<()> {
    let (host, port, api_key) = {
        let config = state.config.read();
        (
            config.server.host.clone(),
            config.server.port,
            config.server.api_key.clone(),
        )
    };

    let router = app(state, api_key);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);
    axum::serve(listener, router).await?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

// ---------------------------------------------------------------------------
// Task submission
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct TaskRequest {
    /// Task description, login follow-up, or exit command
    #[serde(default)]
    pub task: Option<String>,
    /// Base64 audio payload (optionally a data URI)
    #[serde(default, alias = "audioData")]
    pub audio_data: Option<String>,
    /// Run the browser headless
    #[serde(default)]
    pub headless: bool,
    /// Let the agent use the vision model
    #[serde(default)]
    pub vision: bool,
}

impl TaskRequest {
    fn text(&self) -> Option<&str> {
        self.task.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    fn options(&self) -> crate::agent::TaskOptions {
        crate::agent::TaskOptions {
            headless: self.headless,
            vision: self.vision,
            ..Default::default()
        }
    }
}

fn is_exit_command(text: &str) -> bool {
    text.eq_ignore_ascii_case("exit") || text.eq_ignore_ascii_case("quit")
}

/// Accept a task (text or audio). The heavy lifting — transcription,
/// instruction refinement, agent supervision — runs in the background so the
/// request returns immediately; progress arrives via the polling endpoint.
async fn run_task(
    State(state): State<ApiState>,
    Json(request): Json<TaskRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    if request.text().is_none() && request.audio_data.is_none() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Task text or audio payload is required".to_string(),
        ));
    }

    if let Some(text) = request.text() {
        if is_exit_command(text) {
            return match state.engine.stop_active().await {
                Ok(()) => Ok(Json(serde_json::json!({ "status": "stopping" }))),
                Err(_) => {
                    state.outbox.push_text("No task is running.");
                    Ok(Json(serde_json::json!({ "status": "idle" })))
                }
            };
        }

        if state.engine.login_pending().await {
            return match state.engine.handle_login_reply(text).await {
                Ok(()) => Ok(Json(serde_json::json!({ "status": "accepted" }))),
                Err(e) => Err((StatusCode::CONFLICT, e.to_string())),
            };
        }
    }

    if state.engine.is_busy().await {
        state
            .outbox
            .push_text("Please wait, a task is already running.");
        return Err((
            StatusCode::CONFLICT,
            "A task is already running".to_string(),
        ));
    }

    tokio::spawn(process_task(state, request));
    Ok(Json(serde_json::json!({ "status": "accepted" })))
}

/// Background pipeline: audio → transcript → instruction → agent run.
/// Every failure is surfaced to the user through the message queue.
async fn process_task(state: ApiState, request: TaskRequest) {
    let prompt = if let Some(payload) = &request.audio_data {
        let audio = match decode_audio_payload(payload) {
            Ok(audio) => audio,
            Err(e) => {
                state
                    .outbox
                    .push_text(format!("Error transcribing audio: {}", e));
                return;
            }
        };
        match state.speech.transcribe(audio).await {
            Ok(transcript) => {
                state
                    .outbox
                    .push_text(format!("Transcription: {}", transcript));
                transcript
            }
            Err(VoxpilotError::NoSpeechDetected) => {
                state.outbox.push_text("No speech detected.");
                return;
            }
            Err(e) => {
                state
                    .outbox
                    .push_text(format!("Error transcribing audio: {}", e));
                return;
            }
        }
    } else {
        match request.text() {
            Some(text) => text.to_string(),
            None => return,
        }
    };

    let instruction = match state.generator.refine_instruction(&prompt).await {
        Ok(instruction) => instruction,
        Err(e) => {
            state.outbox.push_text(format!("Error: {}", e));
            return;
        }
    };

    if let Err(e) = state.engine.submit(instruction, request.options()).await {
        state.outbox.push_text(format!("Error: {}", e));
    }
}

// ---------------------------------------------------------------------------
// Message polling
// ---------------------------------------------------------------------------

#[derive(serde::Serialize)]
struct MessagesResponse {
    messages: Vec<OutboundMessage>,
}

async fn poll_messages(State(state): State<ApiState>) -> Json<MessagesResponse> {
    Json(MessagesResponse {
        messages: state.outbox.drain(),
    })
}

// ---------------------------------------------------------------------------
// Instruction refinement
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

async fn generate_instruction(
    State(state): State<ApiState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let prompt = request
        .prompt
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| (StatusCode::BAD_REQUEST, "Prompt is required".to_string()))?;

    match state.generator.refine_instruction(prompt).await {
        Ok(instruction) => Ok(Json(serde_json::json!({ "instruction": instruction }))),
        Err(e) => {
            tracing::error!("Instruction generation failed: {}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

//! HTTP server for the study assistant.
//!
//! Exposes the chat, Socratic, quiz and course assistants as a JSON API for
//! the bundled web client. Every request gets its own conversation; the
//! document index is shared.
//!
//! # Endpoints
//!
//! | Method | Path | Body | Response |
//! |--------|------|------|----------|
//! | `GET`  | `/health` | | `{status, version}` |
//! | `POST` | `/chat` | `{message}` | `{response}` |
//! | `POST` | `/stochastic_chat` | `{message}` | `{response}` |
//! | `POST` | `/quiz` | `{message}` | HTML form fragment |
//! | `POST` | `/generate_course` | `{topic, level?, audience?, duration?, depth?}` | `{mark}` |
//! | `GET`  | `/ask/{prompt}` | | `{response}` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "no message provided" } }
//! ```
//!
//! Missing input, and a body that is absent or not JSON, is `bad_request`
//! (400). On the chat routes a completion
//! failure is logged and answered with `{"response": "ERROR"}` so the client
//! can show it inline. The quiz and course routes return `provider_error`
//! (502), or `malformed_quiz` (422) when the model's quiz cannot be parsed.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::assistant::Assistant;
use crate::config::Config;
use crate::error::PipelineError;
use crate::prompt::CourseParams;
use crate::session::FAILURE_SENTINEL;

#[derive(Clone)]
struct AppState {
    assistant: Arc<Assistant>,
}

/// Starts the HTTP server on `[server].bind` and runs until the process is
/// terminated.
pub async fn run_server(config: &Config, assistant: Arc<Assistant>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(assistant);

    println!("Study server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// All routes with CORS and request tracing applied.
pub fn router(assistant: Arc<Assistant>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/chat", post(handle_chat))
        .route("/stochastic_chat", post(handle_stochastic_chat))
        .route("/quiz", post(handle_quiz))
        .route("/generate_course", post(handle_generate_course))
        .route("/ask/{prompt}", get(handle_ask))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { assistant })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        let (status, code) = match &err {
            PipelineError::InputMissing(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            PipelineError::MalformedQuizOutput { raw, .. } => {
                tracing::debug!("unparseable quiz output: {}", raw);
                (StatusCode::UNPROCESSABLE_ENTITY, "malformed_quiz")
            }
            PipelineError::Provider(_) => (StatusCode::BAD_GATEWAY, "provider_error"),
            PipelineError::IndexUnavailable | PipelineError::DocumentLoad { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message: rejection.body_text(),
        }
    }
}

/// Map a chat-route result: input errors are returned, completion failures
/// become the failure sentinel.
fn chat_reply(result: Result<String, PipelineError>) -> Result<Json<ChatResponse>, AppError> {
    match result {
        Ok(response) => Ok(Json(ChatResponse { response })),
        Err(e @ PipelineError::InputMissing(_)) => Err(e.into()),
        Err(e) => {
            tracing::error!("chat request failed: {}", e);
            Ok(Json(ChatResponse {
                response: FAILURE_SENTINEL.to_string(),
            }))
        }
    }
}

/// Unwrap a JSON body, answering malformed or missing bodies with the
/// standard error shape.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload.map(|Json(body)| body).map_err(AppError::from)
}

fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(PipelineError::InputMissing(format!("no {} provided", field)).into()),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Chat routes ============

#[derive(Deserialize)]
struct MessageRequest {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
}

async fn handle_chat(
    State(state): State<AppState>,
    payload: Result<Json<MessageRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let message = required(json_body(payload)?.message, "message")?;
    chat_reply(state.assistant.chat(&message).await)
}

async fn handle_stochastic_chat(
    State(state): State<AppState>,
    payload: Result<Json<MessageRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let message = required(json_body(payload)?.message, "message")?;
    chat_reply(state.assistant.socratic(&message).await)
}

async fn handle_ask(
    State(state): State<AppState>,
    Path(prompt): Path<String>,
) -> Result<Json<ChatResponse>, AppError> {
    let prompt = required(Some(prompt), "prompt")?;
    chat_reply(state.assistant.ask(&prompt).await)
}

// ============ POST /quiz ============

async fn handle_quiz(
    State(state): State<AppState>,
    payload: Result<Json<MessageRequest>, JsonRejection>,
) -> Result<Html<String>, AppError> {
    let topic = required(json_body(payload)?.message, "message")?;
    let form = state.assistant.quiz(&topic).await?;
    Ok(Html(form))
}

// ============ POST /generate_course ============

#[derive(Deserialize)]
struct CourseRequest {
    #[serde(default)]
    topic: Option<String>,
    level: Option<String>,
    audience: Option<String>,
    duration: Option<String>,
    depth: Option<String>,
}

#[derive(Serialize)]
struct CourseResponse {
    mark: String,
}

async fn handle_generate_course(
    State(state): State<AppState>,
    payload: Result<Json<CourseRequest>, JsonRejection>,
) -> Result<Json<CourseResponse>, AppError> {
    let req = json_body(payload)?;
    let topic = required(req.topic, "topic")?;
    let defaults = CourseParams::default();
    let params = CourseParams {
        level: req.level.unwrap_or(defaults.level),
        audience: req.audience.unwrap_or(defaults.audience),
        duration: req.duration.unwrap_or(defaults.duration),
        depth: req.depth.unwrap_or(defaults.depth),
    };
    let mark = state.assistant.course(&topic, params).await?;
    Ok(Json(CourseResponse { mark }))
}

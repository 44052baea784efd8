//! HTTP question-answering boundary.
//!
//! Exposes the knowledge base to the surrounding application as a small
//! JSON API. The orchestrator is initialized by the caller before the
//! server starts; queries against an unready base return a typed 503.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/chat` | Answer a question (`{message, type}`) |
//! | `GET`  | `/api/status` | Knowledge base status |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Error responses carry a machine-readable code and a human-readable
//! message:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "message must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_ready` (503), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser-based chat
//! clients can call the API cross-origin.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::KbError;
use crate::kb::{KbStatus, KnowledgeBase};
use crate::models::{QuestionKind, SourceRef};

/// Shared state: the one knowledge base instance, owned by the composition
/// root and cloned by `Arc` into every handler.
#[derive(Clone)]
struct AppState {
    kb: Arc<KnowledgeBase>,
}

/// Start the HTTP server on the configured bind address. Runs until the
/// process is terminated.
pub async fn run_server(config: &Config, kb: Arc<KnowledgeBase>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState { kb };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/chat", post(handle_chat))
        .route("/api/status", get(handle_status))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    tracing::info!(%bind_addr, "question-answering API listening");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
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
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// Map pipeline errors onto the HTTP contract: an unready base is the
/// caller's 503, everything else is internal.
fn classify_error(err: KbError) -> AppError {
    match err {
        KbError::NotInitialized => AppError {
            status: StatusCode::SERVICE_UNAVAILABLE,
            code: "not_ready".to_string(),
            message: err.to_string(),
        },
        other => AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal".to_string(),
            message: other.to_string(),
        },
    }
}

// ============ POST /api/chat ============

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(rename = "type", default)]
    kind: QuestionKind,
}

#[derive(Serialize)]
struct ChatResponse {
    success: bool,
    answer: String,
    sources: Vec<SourceRef>,
    #[serde(rename = "type")]
    kind: QuestionKind,
}

/// Handler for `POST /api/chat`: routes the question by its type and
/// returns the answer with its sources.
async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if request.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }

    let response = state
        .kb
        .ask_typed(request.kind, &request.message)
        .await
        .map_err(classify_error)?;

    Ok(Json(ChatResponse {
        success: true,
        answer: response.answer,
        sources: response.sources,
        kind: request.kind,
    }))
}

// ============ GET /api/status ============

#[derive(Serialize)]
struct StatusResponse {
    success: bool,
    #[serde(flatten)]
    status: KbStatus,
    message: String,
}

/// Handler for `GET /api/status`: read-only introspection of the
/// knowledge base.
async fn handle_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = state.kb.status().await;
    let message = if status.is_ready {
        "knowledge base is ready".to_string()
    } else {
        "knowledge base is not initialized".to_string()
    };

    Json(StatusResponse {
        success: true,
        status,
        message,
    })
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

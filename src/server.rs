//! HTTP chat API.
//!
//! Serves the query pipeline over JSON. The pipeline is built before the
//! listener binds, so a server that accepts connections can always answer.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Service name, version and endpoint list |
//! | `GET`  | `/health` | Health check (returns version and document count) |
//! | `POST` | `/chat` | Ask a question within a session |
//!
//! # Error Contract
//!
//! All error responses share one envelope:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "message must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `timeout` (408), `internal` (500).
//!
//! # CORS
//!
//! `[server].cors_origins` lists the allowed origins. When empty, all
//! origins are permitted.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use portfolio_rag_core::models::Attribution;
use portfolio_rag_core::pipeline::Pipeline;

use crate::app::build_pipeline;
use crate::config::Config;
use crate::session::SessionStore;

/// Longest accepted `message`, in characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pipeline: Arc<Pipeline>,
    sessions: Arc<SessionStore>,
}

/// Build the pipeline from `config`, then serve it.
///
/// This is the entry point used by the `prag serve` command. Returns an
/// error if the pipeline cannot be built or the address cannot be bound.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pipeline = Arc::new(build_pipeline(config).await?);
    run_server_with_pipeline(config, pipeline).await
}

/// Serve an already built pipeline on `[server].bind`.
///
/// Runs until the process is terminated.
pub async fn run_server_with_pipeline(
    config: &Config,
    pipeline: Arc<Pipeline>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(config, pipeline)?;

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Chat API listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// The route table with state and CORS applied.
pub fn router(config: &Config, pipeline: Arc<Pipeline>) -> anyhow::Result<Router> {
    let state = AppState {
        config: Arc::new(config.clone()),
        pipeline,
        sessions: Arc::new(SessionStore::new(config.session.max_history)),
    };

    Ok(Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/chat", post(handle_chat))
        .layer(cors_layer(&config.server.cors_origins)?)
        .with_state(state))
}

fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return Ok(layer.allow_origin(Any));
    }

    let origins = origins
        .iter()
        .map(|o| {
            HeaderValue::from_str(o)
                .map_err(|_| anyhow::anyhow!("Invalid CORS origin in server.cors_origins: {}", o))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(layer.allow_origin(AllowOrigin::list(origins)))
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"timeout"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
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

/// Constructs a 400 Bad Request error.
fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// Constructs a 408 Request Timeout error.
fn timeout_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::REQUEST_TIMEOUT,
        code: "timeout".to_string(),
        message: message.into(),
    }
}

/// Constructs a 500 Internal Server Error.
fn internal_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ GET / ============

#[derive(Serialize)]
struct RootResponse {
    name: &'static str,
    version: &'static str,
    endpoints: Vec<&'static str>,
}

async fn handle_root() -> Json<RootResponse> {
    Json(RootResponse {
        name: "portfolio-rag",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: vec!["GET /", "GET /health", "POST /chat"],
    })
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    /// The crate version from `Cargo.toml`.
    version: String,
    /// Documents in the vector index.
    documents: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        documents: state.pipeline.index().len(),
    })
}

// ============ POST /chat ============

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    session_id: Option<String>,
    message: String,
    #[serde(default)]
    top_k: Option<i64>,
}

#[derive(Serialize)]
struct ChatResponse {
    session_id: String,
    answer: String,
    sources: Vec<Attribution>,
}

/// Handler for `POST /chat`.
///
/// Validates the request, answers it with the session's prior turns as
/// history and records the exchange. Returns `400` for invalid input and
/// `408` when the pipeline exceeds `[server].request_timeout_secs`; the
/// query task is aborted and the question is dropped from the session.
async fn handle_chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(req) = body.map_err(|e| bad_request(e.body_text()))?;

    let chars = req.message.chars().count();
    if req.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }
    if chars > MAX_MESSAGE_CHARS {
        return Err(bad_request(format!(
            "message must be at most {} characters",
            MAX_MESSAGE_CHARS
        )));
    }

    let retrieval = &state.config.retrieval;
    let top_k = req.top_k.unwrap_or(retrieval.default_top_k);
    if !(1..=retrieval.max_top_k).contains(&top_k) {
        return Err(bad_request(format!(
            "top_k must be between 1 and {}",
            retrieval.max_top_k
        )));
    }

    let session_id = SessionStore::resolve_id(req.session_id.as_deref());
    let history = state.sessions.history(&session_id);
    state.sessions.append_user(&session_id, &req.message);

    let pipeline = Arc::clone(&state.pipeline);
    let message = req.message.clone();
    let mut task = tokio::spawn(async move { pipeline.query(&message, top_k, &history).await });

    let limit = Duration::from_secs(state.config.server.request_timeout_secs);
    let answer = match tokio::time::timeout(limit, &mut task).await {
        Ok(Ok(answer)) => answer,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "query task failed");
            state.sessions.discard_unanswered(&session_id, &req.message);
            return Err(internal_error("query failed"));
        }
        Err(_) => {
            task.abort();
            state.sessions.discard_unanswered(&session_id, &req.message);
            tracing::warn!(session = %session_id, "query timed out");
            return Err(timeout_error(format!(
                "query did not complete within {} seconds",
                limit.as_secs()
            )));
        }
    };

    tracing::debug!(session = %session_id, route = ?answer.route, sources = answer.sources.len(), "chat answered");
    state.sessions.append_assistant(&session_id, &answer.answer);

    Ok(Json(ChatResponse {
        session_id,
        answer: answer.answer,
        sources: answer.sources,
    }))
}

//! HTTP server.
//!
//! Exposes analysis runs and the record history as a JSON API, plus a
//! Server-Sent Events stream for live progress.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/repo/analyze/stream?url=` | Run an analysis, streaming its events as SSE |
//! | `POST`   | `/repo/analyze` | Run an analysis, respond with the saved record |
//! | `GET`    | `/repo/history` | All records, most recent first |
//! | `GET`    | `/repo/{id}` | One record |
//! | `DELETE` | `/repo/{id}` | Delete a record (`204`) |
//! | `GET`    | `/health` | Health check (returns version) |
//!
//! # Streaming
//!
//! Each SSE message carries one event as JSON in its `data` field:
//!
//! ```text
//! data: {"type":"status","message":"cloning"}
//! data: {"type":"result","payload":{"id":"…","source_url":"…","generated_text":"…","created_at":"…"}}
//! ```
//!
//! The stream closes after the single `result` or `error` event. Closing the
//! connection early cancels the run; its working tree is still removed.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "empty_corpus", "message": "empty or no valid files" } }
//! ```
//!
//! Error codes: `bad_request` (400), `acquisition_failed` (400),
//! `not_found` (404), `empty_corpus` (422), `generation_failed` (502),
//! `storage_error` (500), `internal` (500).

use axum::{
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::Config;
use crate::events::ChannelSink;
use crate::models::AnalysisRecord;
use crate::pipeline::{AnalysisError, Pipeline};
use crate::store::{MemoryStore, RecordStore, SqliteStore};

/// Queued events per stream before status updates start being coalesced.
const STREAM_BUFFER: usize = 16;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    store: Arc<dyn RecordStore>,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        let store = pipeline.store().clone();
        Self { pipeline, store }
    }
}

/// Starts the HTTP server.
///
/// Binds to `[server].bind` and serves until the process is terminated.
/// With `memory`, records are kept in process memory instead of `[db].path`.
pub async fn run_server(config: &Config, memory: bool) -> anyhow::Result<()> {
    let store: Arc<dyn RecordStore> = if memory {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(SqliteStore::open(config).await?)
    };
    let pipeline = Arc::new(Pipeline::from_config(config, store)?);
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "server listening");
    serve(listener, config, pipeline).await
}

/// Serve on an already bound listener. Used by [`run_server`] and by tests
/// that need an ephemeral port.
pub async fn serve(
    listener: tokio::net::TcpListener,
    config: &Config,
    pipeline: Arc<Pipeline>,
) -> anyhow::Result<()> {
    let app = router(AppState::new(pipeline), cors_layer(config)?);
    axum::serve(listener, app).await?;
    Ok(())
}

fn cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let origin = match &config.server.cors_origin {
        Some(o) => AllowOrigin::exact(HeaderValue::from_str(o)?),
        None => AllowOrigin::from(Any),
    };
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

pub fn router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/repo/analyze/stream", get(handle_analyze_stream))
        .route("/repo/analyze", post(handle_analyze))
        .route("/repo/history", get(handle_history))
        .route("/repo/{id}", get(handle_get).delete(handle_delete))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
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

/// Internal error type that converts into an Axum HTTP response.
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

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn storage_error(err: anyhow::Error) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "storage_error",
        message: format!("{:#}", err),
    }
}

impl From<AnalysisError> for AppError {
    fn from(err: AnalysisError) -> Self {
        let (status, code) = match &err {
            AnalysisError::Acquisition(_) => (StatusCode::BAD_REQUEST, "acquisition_failed"),
            AnalysisError::EmptyCorpus => (StatusCode::UNPROCESSABLE_ENTITY, "empty_corpus"),
            AnalysisError::Generation(_) => (StatusCode::BAD_GATEWAY, "generation_failed"),
            AnalysisError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            AnalysisError::Cancelled | AnalysisError::Internal(_) => {
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

fn required_url(url: Option<String>) -> Result<String, AppError> {
    match url {
        Some(u) if !u.trim().is_empty() => Ok(u.trim().to_string()),
        _ => Err(bad_request("repository URL is required")),
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

// ============ GET /repo/analyze/stream ============

#[derive(Deserialize)]
struct StreamQuery {
    url: Option<String>,
}

/// Runs the pipeline on its own task and forwards every event to the client.
///
/// Dropping the response stream drops the receiver, which the running
/// pipeline observes as cancellation.
async fn handle_analyze_stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let url = required_url(query.url)?;
    let (sink, mut rx) = ChannelSink::channel(STREAM_BUFFER);

    let pipeline = state.pipeline.clone();
    tokio::spawn(async move {
        // The outcome has already been delivered as the terminal event.
        let _ = pipeline.run(&url, &sink).await;
    });

    let event_stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => yield Ok(Event::default().data(json)),
                Err(e) => tracing::warn!(error = %e, "failed to encode event"),
            }
            if event.is_terminal() {
                break;
            }
        }
    };

    Ok(Sse::new(event_stream).keep_alive(KeepAlive::default()))
}

// ============ POST /repo/analyze ============

#[derive(Deserialize)]
struct AnalyzeRequest {
    repo_url: Option<String>,
}

async fn handle_analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisRecord>, AppError> {
    let url = required_url(req.repo_url)?;
    let record = state.pipeline.analyze(&url).await?;
    Ok(Json(record))
}

// ============ History ============

async fn handle_history(
    State(state): State<AppState>,
) -> Result<Json<Vec<AnalysisRecord>>, AppError> {
    let records = state.store.list().await.map_err(storage_error)?;
    Ok(Json(records))
}

async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AnalysisRecord>, AppError> {
    state
        .store
        .get(&id)
        .await
        .map_err(storage_error)?
        .map(Json)
        .ok_or_else(|| not_found(format!("no analysis with id: {}", id)))
}

async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.store.delete_by_id(&id).await.map_err(storage_error)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(format!("no analysis with id: {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_errors_map_to_status_codes() {
        let cases = [
            (AnalysisError::Acquisition("x".into()), StatusCode::BAD_REQUEST, "acquisition_failed"),
            (AnalysisError::EmptyCorpus, StatusCode::UNPROCESSABLE_ENTITY, "empty_corpus"),
            (AnalysisError::Generation("x".into()), StatusCode::BAD_GATEWAY, "generation_failed"),
            (AnalysisError::Storage("x".into()), StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
        ];
        for (err, status, code) in cases {
            let app: AppError = err.into();
            assert_eq!(app.status, status);
            assert_eq!(app.code, code);
        }
    }

    #[test]
    fn store_failures_use_storage_code() {
        let app = storage_error(anyhow::anyhow!("database is locked"));
        assert_eq!(app.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(app.code, "storage_error");

        let app: AppError = AnalysisError::Internal("reader task failed".into()).into();
        assert_eq!(app.code, "internal");
    }

    #[test]
    fn blank_url_rejected() {
        assert!(required_url(None).is_err());
        assert!(required_url(Some("  ".into())).is_err());
        assert_eq!(
            required_url(Some(" https://github.com/o/r ".into())).ok(),
            Some("https://github.com/o/r".to_string())
        );
    }
}

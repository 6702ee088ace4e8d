//! HTTP sessions API.
//!
//! Each client creates a session, uploads its documents to build the index,
//! and then asks questions against it. Sessions live in memory; collections
//! live in the shared SQLite store, so re-uploading the same files from a new
//! session reuses the existing vectors.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (returns version) |
//! | `POST`   | `/sessions` | Create a session |
//! | `DELETE` | `/sessions/{id}` | End a session and delete its knowledge base |
//! | `POST`   | `/sessions/{id}/index` | Upload documents and build the index |
//! | `POST`   | `/sessions/{id}/ask` | Ask a question |
//! | `GET`    | `/sessions/{id}/messages` | Conversation so far |
//! | `DELETE` | `/sessions/{id}/index` | Delete the knowledge base and history |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "index_not_ready", "message": "The knowledge base is not ready. ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `index_not_ready` (409),
//! `embedding_unavailable` (503), `generation_unavailable` (503), `internal` (500).
//! Messages are the user-facing sentences from [`RagError::user_message`];
//! details go to the log. Errors worth retrying carry a `Retry-After` header.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser UI can be
//! served from anywhere.

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use uuid::Uuid;

use pdfchat_core::models::{Document, Message};
use pdfchat_core::{IndexSummary, RagError, RagSession, SessionState};

use crate::config::Config;
use crate::pipeline::Pipeline;

/// Upper bound on request bodies; uploads carry whole PDFs as base64.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// `Retry-After` seconds sent with transient failures.
const RETRY_AFTER_SECS: &str = "5";

type SessionMap = HashMap<Uuid, Arc<Mutex<RagSession>>>;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    sessions: Arc<RwLock<SessionMap>>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn session(&self, id: Uuid) -> Result<Arc<Mutex<RagSession>>, AppError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(format!("no session with id: {}", id)))
    }
}

/// Build the router with every route and the CORS layer.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/sessions", post(handle_create_session))
        .route("/sessions/{id}", delete(handle_delete_session))
        .route(
            "/sessions/{id}/index",
            post(handle_build_index).delete(handle_clear),
        )
        .route("/sessions/{id}/ask", post(handle_ask))
        .route("/sessions/{id}/messages", get(handle_messages))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind`.
///
/// Opens the database and providers once; every session shares them. Runs
/// until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let pipeline = Pipeline::open(config).await?;
    let app = router(AppState::new(pipeline));

    println!("pdfchat server listening on http://{}", bind_addr);

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
    /// Machine-readable error code (e.g., `"bad_request"`, `"index_not_ready"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
    retryable: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        if self.retryable {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                header::HeaderValue::from_static(RETRY_AFTER_SECS),
            );
        }
        response
    }
}

fn app_error(status: StatusCode, code: &str, message: impl Into<String>) -> AppError {
    AppError {
        status,
        code: code.to_string(),
        message: message.into(),
        retryable: false,
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    app_error(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn not_found(message: impl Into<String>) -> AppError {
    app_error(StatusCode::NOT_FOUND, "not_found", message)
}

fn internal(message: impl Into<String>) -> AppError {
    app_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let message = err.user_message();
        let mut app = match &err {
            RagError::NoDocuments
            | RagError::NoExtractableContent { .. }
            | RagError::EmptyQuestion => bad_request(message),
            RagError::IndexNotReady => {
                app_error(StatusCode::CONFLICT, "index_not_ready", message)
            }
            RagError::CollectionNotFound(_) => not_found(message),
            RagError::EmbeddingUnavailable(_) => {
                app_error(StatusCode::SERVICE_UNAVAILABLE, "embedding_unavailable", message)
            }
            RagError::GenerationUnavailable(_) => {
                app_error(StatusCode::SERVICE_UNAVAILABLE, "generation_unavailable", message)
            }
            RagError::Store(_) | RagError::Template(_) | RagError::Config(_) => {
                error!(error = %err, "request failed");
                internal(message)
            }
        };
        app.retryable = err.is_retryable();
        app
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

// ============ POST /sessions ============

#[derive(Serialize)]
struct SessionResponse {
    id: Uuid,
    state: SessionState,
}

async fn handle_create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let session = state
        .pipeline
        .new_session()
        .map_err(|e| internal(format!("failed to create session: {:#}", e)))?;
    let id = Uuid::new_v4();
    let session_state = session.state();
    state
        .sessions
        .write()
        .await
        .insert(id, Arc::new(Mutex::new(session)));
    info!(session = %id, "session created");

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            id,
            state: session_state,
        }),
    ))
}

// ============ DELETE /sessions/{id} ============

/// Remove the session, then delete its collection if it had one.
async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let session = state
        .sessions
        .write()
        .await
        .remove(&id)
        .ok_or_else(|| not_found(format!("no session with id: {}", id)))?;

    let mut session = session.lock().await;
    if session.is_ready() {
        session.clear().await?;
    }
    info!(session = %id, "session deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ============ POST /sessions/{id}/index ============

#[derive(Deserialize)]
struct IndexRequest {
    documents: Vec<UploadedDocument>,
}

#[derive(Deserialize)]
struct UploadedDocument {
    name: String,
    /// File contents, standard base64.
    data_base64: String,
}

/// Decode uploads into documents; a bad payload fails the whole request.
fn decode_documents(uploads: Vec<UploadedDocument>) -> Result<Vec<Document>, AppError> {
    let b64 = base64::engine::general_purpose::STANDARD;
    uploads
        .into_iter()
        .map(|upload| {
            if upload.name.trim().is_empty() {
                return Err(bad_request("document name must not be empty"));
            }
            let bytes = b64
                .decode(upload.data_base64.as_bytes())
                .map_err(|e| bad_request(format!("{}: invalid base64: {}", upload.name, e)))?;
            Ok(Document::new(upload.name, bytes))
        })
        .collect()
}

async fn handle_build_index(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<IndexRequest>,
) -> Result<Json<IndexSummary>, AppError> {
    let documents = decode_documents(req.documents)?;
    let session = state.session(id).await?;
    let mut session = session.lock().await;
    let summary = session.build_index(&documents).await?;
    Ok(Json(summary))
}

// ============ POST /sessions/{id}/ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let session = state.session(id).await?;
    let mut session = session.lock().await;
    let answer = session.ask(&req.question).await?;
    Ok(Json(AskResponse { answer }))
}

// ============ GET /sessions/{id}/messages ============

#[derive(Serialize)]
struct MessagesResponse {
    state: SessionState,
    messages: Vec<Message>,
}

async fn handle_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessagesResponse>, AppError> {
    let session = state.session(id).await?;
    let session = session.lock().await;
    Ok(Json(MessagesResponse {
        state: session.state(),
        messages: session.messages().to_vec(),
    }))
}

// ============ DELETE /sessions/{id}/index ============

async fn handle_clear(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.session(id).await?;
    let mut session = session.lock().await;
    session.clear().await?;
    info!(session = %id, "knowledge base cleared");
    Ok(Json(SessionResponse {
        id,
        state: session.state(),
    }))
}

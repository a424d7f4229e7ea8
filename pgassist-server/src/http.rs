//! pgassist HTTP surface
//!
//! Axum server with the chat page and a small JSON API over the session store.
//!
//! Each endpoint has a thin axum handler that delegates to an inner function
//! returning `(StatusCode, serde_json::Value)`, so the logic is testable
//! without going through the router.
//!
//! Endpoints:
//! - GET  /                            chat page
//! - GET  /health                      liveness and session count
//! - GET  /version                     server version info
//! - POST /api/sessions                create a session
//! - GET  /api/sessions/:id            transcript and connected flag
//! - POST /api/sessions/:id/connect    connect action
//! - POST /api/sessions/:id/ask        query action

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use minijinja::{context, Environment};
use pgassist_core::{ConnectForm, PgAssistConfig, QueryResponder, SslMode};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::sessions::{SessionEntry, SessionStore};

const PAGE_TITLE: &str = "PostgreSQL Query Assistant";
const INDEX_TEMPLATE: &str = "index.html";

/// Shared state for all HTTP handlers
pub struct HttpState {
    pub config: PgAssistConfig,
    pub sessions: Arc<SessionStore>,
    pub responder: QueryResponder,
    pages: Environment<'static>,
}

impl HttpState {
    pub fn new(config: PgAssistConfig, sessions: Arc<SessionStore>) -> Result<Self, minijinja::Error> {
        let mut pages = Environment::new();
        pages.add_template(INDEX_TEMPLATE, include_str!("../templates/index.html"))?;
        Ok(Self {
            responder: QueryResponder::from_config(&config),
            config,
            sessions,
            pages,
        })
    }
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/api/sessions", post(create_session_handler))
        .route("/api/sessions/:id", get(get_session_handler))
        .route("/api/sessions/:id/connect", post(connect_handler))
        .route("/api/sessions/:id/ask", post(ask_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<HttpState>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("pgassist listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: Option<String>,
}

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: "error".to_string(),
        }
    }

    fn into_value(self) -> serde_json::Value {
        serde_json::json!({ "error": self.error, "status": self.status })
    }
}

fn error_reply(status: StatusCode, msg: impl Into<String>) -> (StatusCode, serde_json::Value) {
    (status, ErrorResponse::new(msg).into_value())
}

fn session_not_found(id: Uuid) -> (StatusCode, serde_json::Value) {
    error_reply(StatusCode::NOT_FOUND, format!("session {} not found", id))
}

async fn session_snapshot(entry: &SessionEntry) -> serde_json::Value {
    let ctx = entry.context.lock().await;
    serde_json::json!({
        "session_id": entry.id,
        "transcript": ctx.transcript(),
        "connected": ctx.is_connected(),
    })
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Render the chat page with the "Local" form defaults filled in.
pub fn index_inner(state: &HttpState) -> Result<String, minijinja::Error> {
    let db = &state.config.database;
    let ssl_modes: Vec<&str> = SslMode::ALL.iter().map(SslMode::as_str).collect();
    state.pages.get_template(INDEX_TEMPLATE)?.render(context! {
        title => PAGE_TITLE,
        defaults => context! {
            host => &db.default_host,
            port => &db.default_port,
            user => &db.default_user,
            database => &db.default_name,
        },
        ssl_modes => ssl_modes,
    })
}

/// Inner health check. The server holds no database of its own.
pub async fn health_inner(sessions: &SessionStore) -> (StatusCode, serde_json::Value) {
    let count = sessions.len().await;
    (
        StatusCode::OK,
        serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "sessions": count,
        }),
    )
}

/// Inner version. Pure, no IO.
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "service": "pgassist",
    })
}

pub async fn create_session_inner(sessions: &SessionStore) -> (StatusCode, serde_json::Value) {
    let entry = sessions.create().await;
    (StatusCode::CREATED, session_snapshot(&entry).await)
}

pub async fn get_session_inner(sessions: &SessionStore, id: Uuid) -> (StatusCode, serde_json::Value) {
    match sessions.get(id).await {
        Some(entry) => (StatusCode::OK, session_snapshot(&entry).await),
        None => session_not_found(id),
    }
}

/// Inner connect. A failure leaves the session as it was.
pub async fn connect_inner(
    state: &HttpState,
    id: Uuid,
    form: ConnectForm,
) -> (StatusCode, serde_json::Value) {
    let Some(entry) = state.sessions.get(id).await else {
        return session_not_found(id);
    };

    let mut ctx = entry.context.lock().await;
    tracing::info!(session_id = %id, host = %form.host, database = %form.database, "Connect requested");

    match ctx.connect(&form, &state.config).await {
        Ok(message) => {
            tracing::info!(session_id = %id, "Session connected");
            (
                StatusCode::OK,
                serde_json::json!({ "connected": true, "message": message }),
            )
        }
        Err(e) => {
            tracing::warn!(session_id = %id, error = %e, "Connect failed");
            (
                StatusCode::BAD_REQUEST,
                serde_json::json!({
                    "error": e.to_string(),
                    "status": "error",
                    "connected": ctx.is_connected(),
                }),
            )
        }
    }
}

/// Inner ask: one query cycle against the session's live handles.
pub async fn ask_inner(state: &HttpState, id: Uuid, req: AskRequest) -> (StatusCode, serde_json::Value) {
    let Some(entry) = state.sessions.get(id).await else {
        return session_not_found(id);
    };

    let question = match req.question {
        Some(q) if !q.trim().is_empty() => q,
        _ => return error_reply(StatusCode::BAD_REQUEST, "question field is required"),
    };

    let mut ctx = entry.context.lock().await;
    match ctx.ask(&question, &state.responder).await {
        Ok(answer) => (
            StatusCode::OK,
            serde_json::json!({
                "answer": answer.text,
                "error": answer.error,
                "transcript": ctx.transcript(),
            }),
        ),
        // Chain failures come back inside the answer; `ask` only errs while disconnected.
        Err(_) => error_reply(
            StatusCode::CONFLICT,
            "Please connect to a database to start querying.",
        ),
    }
}

// ============================================================================
// Axum handler wrappers (thin, delegate to inner functions)
// ============================================================================

pub async fn index_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    match index_inner(&state) {
        Ok(page) => (StatusCode::OK, Html(page)),
        Err(e) => {
            tracing::error!("Failed to render page: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!("Internal Server Error: {}", e)),
            )
        }
    }
}

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.sessions).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn create_session_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = create_session_inner(&state.sessions).await;
    (status, Json(body))
}

pub async fn get_session_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) = get_session_inner(&state.sessions, id).await;
    (status, Json(body))
}

pub async fn connect_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
    Json(form): Json<ConnectForm>,
) -> impl IntoResponse {
    let (status, body) = connect_inner(&state, id, form).await;
    (status, Json(body))
}

pub async fn ask_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<AskRequest>,
) -> impl IntoResponse {
    let (status, body) = ask_inner(&state, id, req).await;
    (status, Json(body))
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================

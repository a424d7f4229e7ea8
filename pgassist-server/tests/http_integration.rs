//! HTTP integration tests for the pgassist API
//!
//! Drive the full router with `oneshot`. Sessions that need to be connected get
//! in-process model and database fakes attached, so no live PostgreSQL or
//! OpenAI account is needed.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use pgassist_core::{
    ChatModel, Completion, ModelError, PgAssistConfig, SqlDatabase, TokenUsage, APOLOGY,
};
use pgassist_server::http::{build_router, HttpState};
use pgassist_server::sessions::SessionStore;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

struct FakeModel {
    fail: bool,
}

#[async_trait]
impl ChatModel for FakeModel {
    async fn complete(&self, prompt: &str, _stop: &[&str]) -> Result<Completion, ModelError> {
        if self.fail {
            return Err(ModelError::Api {
                code: 429,
                message: "Rate limit reached".into(),
            });
        }
        let text = if prompt.ends_with("Answer:") {
            "There are 42 rows in the orders table."
        } else {
            "SELECT COUNT(*) FROM \"orders\""
        };
        Ok(Completion {
            text: text.into(),
            usage: TokenUsage {
                prompt_tokens: 100,
                completion_tokens: 10,
                total_tokens: 110,
            },
        })
    }

    fn model_name(&self) -> &str {
        "fake"
    }
}

struct FakeDatabase;

#[async_trait]
impl SqlDatabase for FakeDatabase {
    fn dialect(&self) -> &str {
        "postgresql"
    }

    async fn table_info(&self) -> Result<String, sqlx::Error> {
        Ok("CREATE TABLE \"orders\" (\n\t\"id\" INTEGER NOT NULL\n)".into())
    }

    async fn run(&self, _sql: &str) -> Result<String, sqlx::Error> {
        Ok(r#"[{"count":42}]"#.into())
    }
}

fn make_state() -> Arc<HttpState> {
    let mut config = PgAssistConfig::default();
    config.model.export_api_key_env = false;
    Arc::new(HttpState::new(config, Arc::new(SessionStore::new())).unwrap())
}

/// Create a session through the store and attach fakes to it.
async fn connected_session(state: &HttpState, fail: bool) -> Uuid {
    let entry = state.sessions.create().await;
    entry
        .context
        .lock()
        .await
        .attach(Box::new(FakeDatabase), Box::new(FakeModel { fail }));
    entry.id
}

async fn send(state: Arc<HttpState>, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = build_router(state).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

// ===========================================================================
// TEST 1: GET /version and /health
// ===========================================================================
#[tokio::test]
async fn test_version_and_health_endpoints() {
    let state = make_state();

    let (status, body) = send(state.clone(), "GET", "/version", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["version"].is_string());
    assert_eq!(body["service"], "pgassist");

    let (status, body) = send(state, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["sessions"], 0);
}

// ===========================================================================
// TEST 2: GET / renders the chat page
// ===========================================================================
#[tokio::test]
async fn test_index_page_renders() {
    let req = Request::builder().uri("/").body(Body::empty()).unwrap();
    let resp = build_router(make_state()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let page = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(page.contains("🔌 Connect to Database"));
    assert!(page.contains("Database Connection"));
}

// ===========================================================================
// TEST 3: POST /api/sessions then GET it back
// ===========================================================================
#[tokio::test]
async fn test_session_lifecycle_over_http() {
    let state = make_state();

    let (status, created) = send(state.clone(), "POST", "/api/sessions", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["connected"], false);
    let id = created["session_id"].as_str().unwrap().to_string();

    let (status, fetched) = send(state, "GET", &format!("/api/sessions/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["session_id"], id.as_str());
    assert_eq!(fetched["transcript"].as_array().unwrap().len(), 1);
}

// ===========================================================================
// TEST 4: unknown session → 404
// ===========================================================================
#[tokio::test]
async fn test_unknown_session_returns_404() {
    let uri = format!("/api/sessions/{}/ask", Uuid::new_v4());
    let (status, body) = send(make_state(), "POST", &uri, Some(json!({ "question": "hi" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
}

// ===========================================================================
// TEST 5: ask before connect → 409, transcript unchanged
// ===========================================================================
#[tokio::test]
async fn test_ask_without_connection_returns_409() {
    let state = make_state();
    let id = state.sessions.create().await.id;

    let (status, _) = send(
        state.clone(),
        "POST",
        &format!("/api/sessions/{}/ask", id),
        Some(json!({ "question": "How many rows are in the orders table?" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, snapshot) = send(state, "GET", &format!("/api/sessions/{}", id), None).await;
    assert_eq!(snapshot["transcript"].as_array().unwrap().len(), 1);
}

// ===========================================================================
// TEST 6: connect with a malformed port → 400, stays disconnected
// ===========================================================================
#[tokio::test]
async fn test_connect_with_bad_port_returns_400() {
    let state = make_state();
    let id = state.sessions.create().await.id;

    let (status, body) = send(
        state,
        "POST",
        &format!("/api/sessions/{}/connect", id),
        Some(json!({
            "api_key": "sk-test",
            "database_type": "local",
            "host": "localhost",
            "port": "54x2",
            "user": "postgres",
            "password": "pw",
            "database": "testing_3"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["connected"], false);
    assert_eq!(body["status"], "error");
}

// ===========================================================================
// TEST 7: connected ask → answer appended as Human then Assistant
// ===========================================================================
#[tokio::test]
async fn test_connected_ask_appends_exchange() {
    let state = make_state();
    let id = connected_session(&state, false).await;

    let (status, body) = send(
        state,
        "POST",
        &format!("/api/sessions/{}/ask", id),
        Some(json!({ "question": "How many rows are in the orders table?" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "There are 42 rows in the orders table.");
    assert!(body["error"].is_null());

    let transcript = body["transcript"].as_array().unwrap();
    assert_eq!(transcript.len(), 3);
    assert_eq!(transcript[1]["role"], "human");
    assert_eq!(transcript[1]["content"], "How many rows are in the orders table?");
    assert_eq!(transcript[2]["role"], "assistant");
}

// ===========================================================================
// TEST 8: model failure → apology plus inline error, still connected
// ===========================================================================
#[tokio::test]
async fn test_failed_cycle_returns_apology() {
    let state = make_state();
    let id = connected_session(&state, true).await;

    let (status, body) = send(
        state.clone(),
        "POST",
        &format!("/api/sessions/{}/ask", id),
        Some(json!({ "question": "How many orders?" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], APOLOGY);
    assert!(body["error"].as_str().unwrap().starts_with("An error occurred: "));

    let (_, snapshot) = send(state, "GET", &format!("/api/sessions/{}", id), None).await;
    assert_eq!(snapshot["connected"], true);
    assert_eq!(snapshot["transcript"][2]["content"], APOLOGY);
}

// ===========================================================================
// TEST 9: blank question → 400
// ===========================================================================
#[tokio::test]
async fn test_blank_question_returns_400() {
    let state = make_state();
    let id = connected_session(&state, false).await;

    let (status, body) = send(
        state,
        "POST",
        &format!("/api/sessions/{}/ask", id),
        Some(json!({ "question": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "question field is required");
}

// ===========================================================================
// TEST 10: failed reconnect → 400 with the real error, old handles kept
// ===========================================================================
#[tokio::test]
async fn test_failed_reconnect_keeps_previous_connection() {
    let state = make_state();
    let id = connected_session(&state, false).await;

    let (status, body) = send(
        state.clone(),
        "POST",
        &format!("/api/sessions/{}/connect", id),
        Some(json!({
            "api_key": "sk-test",
            "database_type": "local",
            "host": "127.0.0.1",
            "port": "1",
            "user": "postgres",
            "password": "pw",
            "database": "testing_3"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["connected"], true);
    assert!(body.get("message").is_none());
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Unable to connect to the database: "));

    let (status, body) = send(
        state,
        "POST",
        &format!("/api/sessions/{}/ask", id),
        Some(json!({ "question": "How many rows are in the orders table?" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "There are 42 rows in the orders table.");
}

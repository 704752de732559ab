//! Fake log-analysis backend for integration tests.
//!
//! Spins up a minimal `axum` HTTP server on a random TCP port bound to
//! 127.0.0.1. Serves:
//! - `GET /api/db_logs` — the configured log batch, recording each query
//! - `GET /api/anomalies` — the configured anomaly payload
//! - `DELETE /logs/{id}` — records the id
//! - `GET /api/ai/patterns`, `GET /api/ai/trends`
//! - `POST /api/source` — records the JSON body
//!
//! Every route answers with the status set through [`FakeBackend::fail`]
//! when one is configured, and after the delay set through
//! [`FakeBackend::delay`].
//!
//! # Example
//!
//! ```rust,no_run
//! let api = FakeBackend::start().await.unwrap();
//! api.set_logs(numbered_records(3)).await;
//! let client = BackendClient::new(&api.base_url(), Duration::from_secs(1)).unwrap();
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// State shared between the router and test code.
#[derive(Default)]
struct ApiState {
    logs: Value,
    anomalies: Value,
    patterns: Value,
    trends: Value,
    /// Raw body for `/api/db_logs`, overriding `logs`.
    raw_logs_body: Option<String>,
    status: Option<StatusCode>,
    delay: Duration,
    queries: Vec<String>,
    cookies: Vec<String>,
    deleted: Vec<String>,
    sources: Vec<Value>,
}

type Shared = Arc<Mutex<ApiState>>;

/// Handle to the running fake backend.
pub struct FakeBackend {
    addr: SocketAddr,
    state: Shared,
}

impl FakeBackend {
    /// Start the server on a random port. Returns once it is listening.
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(Mutex::new(ApiState {
            logs: json!([]),
            anomalies: json!({ "anomalies": [], "counts": {} }),
            patterns: json!({ "patterns": [] }),
            trends: json!({ "trends": [] }),
            ..ApiState::default()
        }));

        let app = Router::new()
            .route("/api/db_logs", get(db_logs))
            .route("/api/anomalies", get(anomalies))
            .route("/logs/{id}", delete(delete_log))
            .route("/api/ai/patterns", get(patterns))
            .route("/api/ai/trends", get(trends))
            .route("/api/source", post(switch_source))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the task a moment to register.
        tokio::time::sleep(Duration::from_millis(5)).await;

        Ok(Self { addr, state })
    }

    /// Base URL for the API (e.g. `http://127.0.0.1:PORT`).
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn set_logs(&self, logs: Vec<Value>) {
        let mut state = self.state.lock().await;
        state.logs = Value::Array(logs);
        state.raw_logs_body = None;
    }

    /// Serve `body` verbatim from `/api/db_logs`.
    pub async fn set_raw_logs_body(&self, body: &str) {
        self.state.lock().await.raw_logs_body = Some(body.to_string());
    }

    pub async fn set_anomalies(&self, payload: Value) {
        self.state.lock().await.anomalies = payload;
    }

    pub async fn set_patterns(&self, patterns: Value) {
        self.state.lock().await.patterns = json!({ "patterns": patterns });
    }

    pub async fn set_trends(&self, trends: Value) {
        self.state.lock().await.trends = json!({ "trends": trends });
    }

    /// Answer every route with `status` until [`FakeBackend::recover`].
    pub async fn fail(&self, status: StatusCode) {
        self.state.lock().await.status = Some(status);
    }

    pub async fn recover(&self) {
        self.state.lock().await.status = None;
    }

    pub async fn delay(&self, delay: Duration) {
        self.state.lock().await.delay = delay;
    }

    /// Query strings received by `/api/db_logs`, in order.
    pub async fn queries(&self) -> Vec<String> {
        self.state.lock().await.queries.clone()
    }

    /// `Cookie` headers received on any route.
    pub async fn cookies(&self) -> Vec<String> {
        self.state.lock().await.cookies.clone()
    }

    pub async fn deleted(&self) -> Vec<String> {
        self.state.lock().await.deleted.clone()
    }

    pub async fn sources(&self) -> Vec<Value> {
        self.state.lock().await.sources.clone()
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// Shared prologue: record the cookie, wait, and short-circuit on a
/// configured failure status.
async fn prologue(state: &Shared, headers: &HeaderMap) -> Option<Response> {
    let (delay, status) = {
        let mut s = state.lock().await;
        if let Some(cookie) = headers.get(header::COOKIE).and_then(|v| v.to_str().ok()) {
            s.cookies.push(cookie.to_string());
        }
        (s.delay, s.status)
    };
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    status.map(|code| (code, Json(json!({ "detail": "fake failure" }))).into_response())
}

async fn db_logs(
    State(state): State<Shared>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    state.lock().await.queries.push(query.unwrap_or_default());
    if let Some(resp) = prologue(&state, &headers).await {
        return resp;
    }
    let s = state.lock().await;
    match &s.raw_logs_body {
        Some(body) => (StatusCode::OK, body.clone()).into_response(),
        None => Json(s.logs.clone()).into_response(),
    }
}

async fn anomalies(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Some(resp) = prologue(&state, &headers).await {
        return resp;
    }
    Json(state.lock().await.anomalies.clone()).into_response()
}

async fn delete_log(
    Path(id): Path<String>,
    State(state): State<Shared>,
    headers: HeaderMap,
) -> Response {
    if let Some(resp) = prologue(&state, &headers).await {
        return resp;
    }
    state.lock().await.deleted.push(id);
    StatusCode::NO_CONTENT.into_response()
}

async fn patterns(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Some(resp) = prologue(&state, &headers).await {
        return resp;
    }
    Json(state.lock().await.patterns.clone()).into_response()
}

async fn trends(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Some(resp) = prologue(&state, &headers).await {
        return resp;
    }
    Json(state.lock().await.trends.clone()).into_response()
}

async fn switch_source(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Some(resp) = prologue(&state, &headers).await {
        return resp;
    }
    state.lock().await.sources.push(body.clone());
    Json(json!({ "status": "ok", "source": body })).into_response()
}

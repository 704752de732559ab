//! loglens-client — hyper implementation of [`LogBackend`].
//!
//! Every request carries the `session_id` cookie when one is configured and
//! is bounded by the configured timeout. Failures are classified from the
//! transport error or the HTTP status code, never from message text.

use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{self, HeaderValue};
use hyper::{Method, Request};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use loglens_core::config::BackendConfig;
use loglens_core::query::QueryParams;
use loglens_core::{AnomalyReport, FetchError, LogBackend, RecordId, SourceSpec};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid backend URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("unsupported URL scheme `{0}` (only http is supported)")]
    UnsupportedScheme(String),
    #[error("session id is not a valid cookie value")]
    InvalidSession,
}

/// HTTP client for the log-analysis backend.
#[derive(Clone)]
pub struct BackendClient {
    base: Url,
    http: Client<HttpConnector, Full<Bytes>>,
    timeout: Duration,
    cookie: Option<HeaderValue>,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base", &self.base.as_str())
            .field("timeout", &self.timeout)
            .field("has_session", &self.cookie.is_some())
            .finish()
    }
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base = Url::parse(base_url)?;
        if base.scheme() != "http" {
            return Err(ClientError::UnsupportedScheme(base.scheme().to_string()));
        }
        let http = Client::builder(TokioExecutor::new()).build_http();
        Ok(Self {
            base,
            http,
            timeout,
            cookie: None,
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, ClientError> {
        Self::new(&config.base_url, config.request_timeout())?.with_session(config.session_id.as_deref())
    }

    /// Attach (or clear) the session cookie sent with every request.
    pub fn with_session(mut self, session: Option<&str>) -> Result<Self, ClientError> {
        self.cookie = match session.filter(|s| !s.is_empty()) {
            Some(id) => Some(
                HeaderValue::from_str(&format!("session_id={id}"))
                    .map_err(|_| ClientError::InvalidSession)?,
            ),
            None => None,
        };
        Ok(self)
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// `base` joined with `segments`, each percent-encoded as one segment.
    fn endpoint(&self, segments: &[&str], query: Option<&str>) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url.set_query(query.filter(|q| !q.is_empty()));
        url
    }

    /// Send one request and return the body of a 2xx response.
    async fn send(&self, method: Method, url: Url, body: Option<Bytes>) -> Result<Bytes, FetchError> {
        let mut builder = Request::builder()
            .method(method.clone())
            .uri(url.as_str())
            .header(header::ACCEPT, "application/json");
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie.clone());
        }
        if body.is_some() {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
        }
        let request = builder
            .body(Full::new(body.unwrap_or_default()))
            .map_err(|e| FetchError::unreachable(format!("invalid request: {e}")))?;

        tracing::debug!(%method, url = %url, "backend request");
        let exchange = async {
            let response = self
                .http
                .request(request)
                .await
                .map_err(FetchError::unreachable)?;
            let status = response.status();
            let bytes = response
                .into_body()
                .collect()
                .await
                .map_err(FetchError::unreachable)?
                .to_bytes();
            Ok::<_, FetchError>((status, bytes))
        };

        let (status, bytes) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| FetchError::timeout(self.timeout))??;

        if let Some(err) = FetchError::from_status(status.as_u16()) {
            tracing::debug!(%method, url = %url, status = status.as_u16(), "backend rejected request");
            return Err(err);
        }
        Ok(bytes)
    }

    async fn get_json(&self, segments: &[&str], query: Option<&str>) -> Result<Value, FetchError> {
        let url = self.endpoint(segments, query);
        let bytes = self.send(Method::GET, url, None).await?;
        decode_json(&bytes)
    }
}

/// Parse a response body. Blank bodies are `null`; anything else must be
/// valid JSON.
fn decode_json(bytes: &[u8]) -> Result<Value, FetchError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes).map_err(FetchError::malformed)
}

/// The array under `key`, or empty.
fn array_field(value: &Value, key: &str) -> Vec<Value> {
    value
        .get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

impl LogBackend for BackendClient {
    async fn fetch_logs(&self, params: &QueryParams) -> Result<Vec<Value>, FetchError> {
        let query = params.to_query_string();
        match self.get_json(&["api", "db_logs"], Some(&query)).await? {
            Value::Array(items) => Ok(items),
            other => {
                tracing::debug!(kind = json_kind(&other), "log response is not an array, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    async fn fetch_anomalies(&self) -> Result<AnomalyReport, FetchError> {
        let value = self.get_json(&["api", "anomalies"], None).await?;
        Ok(AnomalyReport::from_json(&value))
    }

    async fn delete_log(&self, id: &RecordId) -> Result<(), FetchError> {
        let url = self.endpoint(&["logs", id.as_str()], None);
        self.send(Method::DELETE, url, None).await.map(drop)
    }

    async fn fetch_patterns(&self) -> Result<Vec<Value>, FetchError> {
        let value = self.get_json(&["api", "ai", "patterns"], None).await?;
        Ok(array_field(&value, "patterns"))
    }

    async fn fetch_trends(&self) -> Result<Vec<Value>, FetchError> {
        let value = self.get_json(&["api", "ai", "trends"], None).await?;
        Ok(array_field(&value, "trends"))
    }

    async fn switch_source(&self, source: &SourceSpec) -> Result<(), FetchError> {
        let body = serde_json::to_vec(source).map_err(FetchError::malformed)?;
        let url = self.endpoint(&["api", "source"], None);
        self.send(Method::POST, url, Some(Bytes::from(body))).await?;
        tracing::info!(source = %source.key(), "backend source switched");
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

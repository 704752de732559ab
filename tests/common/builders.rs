//! Test builders — ergonomic constructors for backend records and filters.
//!
//! These builders are designed for readability in test assertions, not for
//! production use.

use loglens_core::FilterSpec;
use serde_json::{json, Map, Value};

// ---------------------------------------------------------------------------
// RecordBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for one element of the `/api/db_logs` array.
///
/// # Example
///
/// ```rust
/// let record = RecordBuilder::new("timeout connecting to db")
///     .id(7)
///     .level("error")
///     .service("svc-billing")
///     .build();
/// ```
pub struct RecordBuilder {
    fields: Map<String, Value>,
}

impl RecordBuilder {
    pub fn new(message: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("message".into(), Value::String(message.into()));
        Self { fields }
    }

    /// A record whose `message` is a structured JSON payload.
    pub fn structured(payload: Value) -> Self {
        Self::new(payload.to_string())
    }

    pub fn id(self, id: impl Into<Value>) -> Self {
        self.field("id", id)
    }

    pub fn level(self, level: &str) -> Self {
        self.field("level", level)
    }

    pub fn user(self, user: &str) -> Self {
        self.field("user_id", user)
    }

    pub fn service(self, service: &str) -> Self {
        self.field("service_id", service)
    }

    pub fn system(self, hostname: &str) -> Self {
        self.field("log_type", "system").field("hostname", hostname)
    }

    pub fn timestamp(self, secs: f64) -> Self {
        self.field("timestamp", secs)
    }

    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn build(self) -> Value {
        Value::Object(self.fields)
    }
}

/// `n` plain application records with ids `1..=n`.
pub fn numbered_records(n: usize) -> Vec<Value> {
    (1..=n)
        .map(|i| {
            RecordBuilder::new(format!("request {i} handled"))
                .id(i as u64)
                .level("info")
                .user(&format!("user{i}"))
                .service("svc-api")
                .build()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// FilterBuilder
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FilterBuilder {
    spec: FilterSpec,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: &str) -> Self {
        self.spec.level = level.to_string();
        self
    }

    pub fn user(mut self, user: &str) -> Self {
        self.spec.user = user.to_string();
        self
    }

    pub fn service(mut self, service: &str) -> Self {
        self.spec.service = service.to_string();
        self
    }

    pub fn keyword(mut self, keyword: &str) -> Self {
        self.spec.keyword = keyword.to_string();
        self
    }

    pub fn since(mut self, at: &str) -> Self {
        self.spec.start_time = Some(at.to_string());
        self
    }

    pub fn until(mut self, at: &str) -> Self {
        self.spec.end_time = Some(at.to_string());
        self
    }

    pub fn build(self) -> FilterSpec {
        self.spec
    }
}

/// The anomaly payload shape served by `/api/anomalies`.
pub fn anomaly_payload(anomalies: &[&str], counts: &[(&str, u64)]) -> Value {
    let counts: Map<String, Value> = counts
        .iter()
        .map(|(level, n)| (level.to_string(), json!(n)))
        .collect();
    json!({ "anomalies": anomalies, "counts": counts })
}

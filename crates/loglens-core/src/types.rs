//! Core types for loglens-core.
//!
//! This module defines the data shared across all layers: the backend's
//! [`RawLogRecord`], the display-ready [`NormalizedLogEntry`], the
//! [`FilterSpec`] edited by the query form, the [`AnomalyReport`] behind the
//! anomaly and chart widgets, and the [`SourceSpec`] used to switch the
//! backend's collector.
//!
//! Backend payloads are not under our control, so every `from_json`
//! constructor here is total: wrong types and missing keys degrade to
//! defaults instead of failing the whole batch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque identifier of a backend record, used only for delete-by-id.
///
/// The backend may send ids as JSON numbers or strings; both render to the
/// same textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One record as returned by `GET /api/db_logs`.
///
/// Only `message` is guaranteed; it may itself hold a JSON-encoded object.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawLogRecord {
    pub id: Option<RecordId>,
    pub message: String,
    pub level: Option<String>,
    pub user_id: Option<String>,
    pub service_id: Option<String>,
    pub request_id: Option<String>,
    pub source: Option<String>,
    pub log_type: Option<String>,
    pub hostname: Option<String>,
    /// Fractional Unix epoch seconds.
    pub timestamp: Option<f64>,
}

impl RawLogRecord {
    /// Build a record from one element of the backend's JSON array.
    ///
    /// Non-object values become a record whose `message` is the value's text.
    pub fn from_json(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self {
                message: scalar_text(value).unwrap_or_default(),
                ..Self::default()
            };
        };

        let text = |key: &str| obj.get(key).and_then(scalar_text);

        Self {
            id: obj.get("id").and_then(RecordId::from_json),
            message: text("message").unwrap_or_default(),
            level: text("level"),
            user_id: text("user_id"),
            service_id: text("service_id"),
            request_id: text("request_id"),
            source: text("source"),
            log_type: text("log_type"),
            hostname: text("hostname"),
            timestamp: obj.get("timestamp").and_then(Value::as_f64),
        }
    }
}

/// Text form of a scalar JSON value. Strings are returned verbatim, numbers
/// and booleans as their JSON text; `null`, arrays and objects yield `None`.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Canonical, backend-agnostic display record produced by the normalizer.
///
/// Created fresh every poll cycle and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedLogEntry {
    pub text: String,
    /// Uppercased level, or `"UNKNOWN"`.
    pub level: String,
    /// `"N/A"` when unknown; empty for system logs.
    pub user: String,
    /// `"N/A"` when unknown.
    pub service: String,
    pub is_system_log: bool,
    pub hostname: Option<String>,
    pub source_record_id: Option<RecordId>,
    pub request_id: Option<String>,
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

impl NormalizedLogEntry {
    /// One-line presentation used by the log list.
    pub fn display_line(&self) -> String {
        if self.is_system_log {
            let host = self.hostname.as_deref().unwrap_or(crate::normalizer::UNKNOWN_HOST);
            format!("[{}] {} @{}", self.level, self.text, host)
        } else {
            format!("[{}] {} ({}, {})", self.level, self.text, self.user, self.service)
        }
    }
}

/// Filter form contents. An empty string in any field means "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(default)]
    pub keyword: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub service: String,
    /// Local date-time, e.g. `2025-08-26T14:30`.
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

impl FilterSpec {
    /// True when no field constrains the query.
    pub fn is_empty(&self) -> bool {
        self.keyword.is_empty()
            && self.level.is_empty()
            && self.user.is_empty()
            && self.service.is_empty()
            && self.start_time.as_deref().unwrap_or("").is_empty()
            && self.end_time.as_deref().unwrap_or("").is_empty()
    }
}

/// Payload of `GET /api/anomalies`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnomalyReport {
    pub anomalies: Vec<String>,
    /// Per-level counts, ordered by level name.
    pub counts: BTreeMap<String, u64>,
}

impl AnomalyReport {
    pub fn from_json(value: &Value) -> Self {
        let anomalies = value
            .get("anomalies")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| scalar_text(v).or_else(|| (!v.is_null()).then(|| v.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        let counts = value
            .get("counts")
            .and_then(Value::as_object)
            .map(|obj| {
                obj.iter()
                    .filter_map(|(level, n)| n.as_u64().map(|n| (level.clone(), n)))
                    .collect()
            })
            .unwrap_or_default();

        Self { anomalies, counts }
    }
}

/// Backend collector selection, sent to `POST /api/source`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl SourceSpec {
    pub fn local() -> Self {
        Self {
            kind: "local".to_string(),
            group: None,
            stream: None,
            region: None,
            api_url: None,
        }
    }

    /// Parse `local`, `cloudwatch GROUP [STREAM] [REGION]` or `api URL`.
    pub fn parse(input: &str) -> Result<Self, String> {
        let mut words = input.split_whitespace();
        let kind = words.next().ok_or("usage: source <local|cloudwatch|api> [args]")?;
        match kind {
            "local" => Ok(Self::local()),
            "cloudwatch" => {
                let group = words.next().ok_or("usage: source cloudwatch GROUP [STREAM] [REGION]")?;
                Ok(Self {
                    kind: kind.to_string(),
                    group: Some(group.to_string()),
                    stream: words.next().map(str::to_string),
                    region: Some(words.next().unwrap_or("us-east-1").to_string()),
                    api_url: None,
                })
            }
            "api" => {
                let url = words.next().ok_or("usage: source api URL")?;
                Ok(Self {
                    kind: kind.to_string(),
                    group: None,
                    stream: None,
                    region: None,
                    api_url: Some(url.to_string()),
                })
            }
            other => Err(format!("unknown source: {other}")),
        }
    }

    /// Key identifying this source in feed identities.
    ///
    /// Every field takes part, so two sources differ in key exactly when
    /// they differ in any field: `cloudwatch:app-logs stream=web
    /// region=eu-west-1`, `api:http://collector`, `local`.
    pub fn key(&self) -> String {
        let mut key = self.kind.clone();
        if let Some(target) = self.api_url.as_ref().or(self.group.as_ref()) {
            key.push(':');
            key.push_str(target);
        }
        let labelled = [
            ("group", self.api_url.as_ref().and(self.group.as_ref())),
            ("stream", self.stream.as_ref()),
            ("region", self.region.as_ref()),
        ];
        for (label, value) in labelled {
            if let Some(value) = value {
                key.push_str(&format!(" {label}={value}"));
            }
        }
        key
    }
}

/// Caller role. Only admins may delete records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role(String);

impl Role {
    pub fn new(role: impl Into<String>) -> Self {
        Self(role.into())
    }

    pub fn is_admin(&self) -> bool {
        self.0 == "admin"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Role {
    fn default() -> Self {
        Self("viewer".to_string())
    }
}

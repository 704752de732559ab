//! Normalizer: turns one [`RawLogRecord`] into a [`NormalizedLogEntry`].
//!
//! Records are decoded as one of three payload shapes, tried in order:
//!
//! 1. [`RecordPayload::Structured`]: `message` holds a JSON object with both
//!    `message` and `level` keys; that object is authoritative.
//! 2. [`RecordPayload::System`]: the record came from the system-log
//!    collector (`log_type == "system"` or `source` mentions "system").
//! 3. [`RecordPayload::PlainText`]: an application line; user and service
//!    are recovered from `[userNNN]` / `[svc-*]` tokens when not given.
//!
//! Normalization is total. Malformed embedded JSON falls through to the next
//! shape and missing fields become display defaults.

use std::sync::LazyLock;

use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use serde_json::{Map, Value};

use crate::types::{scalar_text, NormalizedLogEntry, RawLogRecord, RecordId};

/// Level shown when the record carries none.
pub const UNKNOWN_LEVEL: &str = "UNKNOWN";
/// Marker for an absent user or service.
pub const NOT_AVAILABLE: &str = "N/A";
/// Hostname shown for system logs that do not name one.
pub const UNKNOWN_HOST: &str = "Unknown";

static USER_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(user\d+)\]").expect("user token regex"));
static SERVICE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(svc-[^\]]+)\]").expect("service token regex"));

/// Fields lifted from a JSON object embedded in `message`.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredPayload {
    pub message: String,
    pub level: String,
    pub user_id: Option<String>,
    pub service_id: Option<String>,
    pub request_id: Option<String>,
    pub hostname: Option<String>,
    pub timestamp: Option<f64>,
}

impl StructuredPayload {
    /// Decode `text` as a structured payload. `None` unless it is a JSON
    /// object with non-empty `message` and `level`.
    fn decode(text: &str) -> Option<Self> {
        let trimmed = text.trim_start();
        if !trimmed.starts_with('{') {
            return None;
        }
        let obj: Map<String, Value> = serde_json::from_str(trimmed).ok()?;
        let field = |key: &str| obj.get(key).and_then(scalar_text).filter(|s| !s.is_empty());

        Some(Self {
            message: field("message")?,
            level: field("level")?,
            user_id: field("user_id"),
            service_id: field("service_id"),
            request_id: field("request_id"),
            hostname: field("hostname"),
            timestamp: obj.get("timestamp").and_then(Value::as_f64),
        })
    }
}

/// A record shape, decoded before field extraction.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordPayload<'a> {
    Structured(StructuredPayload),
    System(&'a RawLogRecord),
    PlainText(&'a RawLogRecord),
}

impl<'a> RecordPayload<'a> {
    pub fn decode(raw: &'a RawLogRecord) -> Self {
        if let Some(payload) = StructuredPayload::decode(&raw.message) {
            return RecordPayload::Structured(payload);
        }
        if is_system_record(raw) {
            RecordPayload::System(raw)
        } else {
            RecordPayload::PlainText(raw)
        }
    }
}

fn is_system_record(raw: &RawLogRecord) -> bool {
    let by_type = raw
        .log_type
        .as_deref()
        .is_some_and(|t| t.eq_ignore_ascii_case("system"));
    let by_source = raw
        .source
        .as_deref()
        .is_some_and(|s| s.to_ascii_lowercase().contains("system"));
    by_type || by_source
}

/// Normalize one record. Never fails.
pub fn normalize(raw: &RawLogRecord) -> NormalizedLogEntry {
    let source_record_id = raw.id.clone();

    match RecordPayload::decode(raw) {
        RecordPayload::Structured(p) => NormalizedLogEntry {
            text: p.message,
            level: display_level(Some(&p.level)),
            user: or_not_available(p.user_id.as_deref()),
            service: or_not_available(p.service_id.as_deref()),
            is_system_log: false,
            hostname: p.hostname.or_else(|| present(raw.hostname.as_deref())),
            source_record_id,
            request_id: p.request_id.or_else(|| present(raw.request_id.as_deref())),
            timestamp: p.timestamp.or(raw.timestamp).and_then(epoch_to_utc),
        },
        RecordPayload::System(raw) => NormalizedLogEntry {
            text: raw.message.clone(),
            level: display_level(raw.level.as_deref()),
            user: String::new(),
            service: or_not_available(
                present(raw.service_id.as_deref())
                    .or_else(|| present(raw.source.as_deref()))
                    .as_deref(),
            ),
            is_system_log: true,
            hostname: Some(
                present(raw.hostname.as_deref()).unwrap_or_else(|| UNKNOWN_HOST.to_string()),
            ),
            source_record_id,
            request_id: present(raw.request_id.as_deref()),
            timestamp: raw.timestamp.and_then(epoch_to_utc),
        },
        RecordPayload::PlainText(raw) => {
            let user = present(raw.user_id.as_deref())
                .or_else(|| bracket_token(&USER_TOKEN, &raw.message));
            let service = present(raw.service_id.as_deref())
                .or_else(|| bracket_token(&SERVICE_TOKEN, &raw.message));
            NormalizedLogEntry {
                text: raw.message.clone(),
                level: display_level(raw.level.as_deref()),
                user: or_not_available(user.as_deref()),
                service: or_not_available(service.as_deref()),
                is_system_log: false,
                hostname: present(raw.hostname.as_deref()),
                source_record_id,
                request_id: present(raw.request_id.as_deref()),
                timestamp: raw.timestamp.and_then(epoch_to_utc),
            }
        }
    }
}

/// Normalize a whole backend batch, in order.
pub fn normalize_batch(batch: &[Value]) -> Vec<NormalizedLogEntry> {
    batch
        .iter()
        .map(|value| normalize(&RawLogRecord::from_json(value)))
        .collect()
}

/// Convenience for callers holding a record id only.
pub fn matches_id(entry: &NormalizedLogEntry, id: &RecordId) -> bool {
    entry.source_record_id.as_ref() == Some(id)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn present(value: Option<&str>) -> Option<String> {
    value.filter(|s| !s.is_empty()).map(str::to_string)
}

fn or_not_available(value: Option<&str>) -> String {
    present(value).unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn display_level(level: Option<&str>) -> String {
    match level.map(str::trim).filter(|l| !l.is_empty()) {
        Some(l) => l.to_uppercase(),
        None => UNKNOWN_LEVEL.to_string(),
    }
}

fn bracket_token(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn epoch_to_utc(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    Utc.timestamp_opt(whole as i64, nanos).single()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

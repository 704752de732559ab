//! Static backend payloads used across harnesses.
//!
//! Each corpus is a set of `/api/db_logs` elements in the shapes the backend
//! actually emits: plain application lines, structured JSON payloads carried
//! in `message`, system-collector records and junk.

use serde_json::{json, Value};

/// Plain application lines, with and without bracketed user/service tokens.
pub fn corpus_plain() -> Vec<Value> {
    vec![
        json!({"id": 1, "message": "[user42] [svc-auth] login ok", "level": "info", "timestamp": 1756218600.25}),
        json!({"id": 2, "message": "payment declined", "level": "error", "user_id": "user7", "service_id": "svc-billing"}),
        json!({"id": "a-3", "message": "cache warmup finished"}),
    ]
}

/// Records whose `message` is a JSON object with `message` and `level`.
pub fn corpus_structured() -> Vec<Value> {
    vec![
        json!({
            "id": 10,
            "message": r#"{"message":"db timeout","level":"critical","user_id":"user9","service_id":"svc-orders","request_id":"req-1"}"#,
            "level": "info",
            "log_type": "system"
        }),
        json!({
            "id": 11,
            "message": r#"{"message":"partial","user_id":"user1"}"#,
            "level": "warning"
        }),
    ]
}

/// Records from the system-log collector.
pub fn corpus_system() -> Vec<Value> {
    vec![
        json!({"id": 20, "message": "kernel: eth0 link up", "level": "info", "log_type": "system", "hostname": "web-1"}),
        json!({"id": 21, "message": "cron started", "source": "system-journal"}),
    ]
}

/// Values that are not well-formed records at all.
pub fn corpus_junk() -> Vec<Value> {
    vec![
        json!(null),
        json!(42),
        json!("bare string"),
        json!({"message": "{not json", "level": ""}),
        json!({"message": 17, "level": 3}),
    ]
}

/// Every corpus above, concatenated.
pub fn corpus_mixed() -> Vec<Value> {
    let mut all = corpus_plain();
    all.extend(corpus_structured());
    all.extend(corpus_system());
    all.extend(corpus_junk());
    all
}

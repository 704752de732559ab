//! Export Serializer: turns a fetched record batch into a file.
//!
//! The export path reuses the query builder with a wider limit, fetches the
//! raw batch, serializes it completely in memory and only then writes it
//! through a temporary file in the target directory. A failure at any step
//! leaves no file behind.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::backend::LogBackend;
use crate::error::FetchError;
use crate::query::build_params;
use crate::types::{AnomalyReport, FilterSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Some(ExportFormat::Csv),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

/// Extra sections for the JSON envelope. Ignored for CSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExportOptions {
    pub include_patterns: bool,
    pub include_trends: bool,
    pub include_raw_data: bool,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("export write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("export serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not move export into place: {0}")]
    Persist(#[from] tempfile::PersistError),
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// CSV rendering of a raw batch.
///
/// The header is the key set of the first record; every field is quoted
/// and embedded quotes are doubled. An empty batch renders as `""`.
pub fn to_csv(records: &[Value]) -> String {
    let Some(first) = records.first() else {
        return String::new();
    };
    let headers: Vec<&str> = first
        .as_object()
        .map(|obj| obj.keys().map(String::as_str).collect())
        .unwrap_or_default();

    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(
        headers
            .iter()
            .map(|h| quote(h))
            .collect::<Vec<_>>()
            .join(","),
    );
    for record in records {
        let row = headers
            .iter()
            .map(|key| quote(&field_text(record.get(*key))))
            .collect::<Vec<_>>()
            .join(",");
        lines.push(row);
    }
    lines.join("\n")
}

fn field_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// Everything a JSON export may contain.
#[derive(Debug, Clone, Default)]
pub struct ExportBundle {
    pub logs: Vec<Value>,
    pub patterns: Option<Vec<Value>>,
    pub trends: Option<Vec<Value>>,
    pub raw_insights: Option<AnomalyReport>,
}

#[derive(Serialize)]
struct Envelope<'a> {
    export_metadata: Metadata,
    logs: &'a [Value],
    #[serde(skip_serializing_if = "Option::is_none")]
    patterns: Option<&'a [Value]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trends: Option<&'a [Value]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_insights: Option<&'a AnomalyReport>,
}

#[derive(Serialize)]
struct Metadata {
    generated_at: String,
    format: &'static str,
    total_records: usize,
}

/// Pretty-printed JSON. A bundle with only logs renders as the bare array.
pub fn to_json(bundle: &ExportBundle, generated_at: DateTime<Utc>) -> Result<String, serde_json::Error> {
    let bare = bundle.patterns.is_none() && bundle.trends.is_none() && bundle.raw_insights.is_none();
    if bare {
        return serde_json::to_string_pretty(&bundle.logs);
    }
    let envelope = Envelope {
        export_metadata: Metadata {
            generated_at: generated_at.to_rfc3339(),
            format: "json",
            total_records: bundle.logs.len(),
        },
        logs: &bundle.logs,
        patterns: bundle.patterns.as_deref(),
        trends: bundle.trends.as_deref(),
        raw_insights: bundle.raw_insights.as_ref(),
    };
    serde_json::to_string_pretty(&envelope)
}

/// File name for an export produced at `at`.
pub fn file_name(format: ExportFormat, at: DateTime<Utc>) -> String {
    match format {
        ExportFormat::Csv => "logs.csv".to_string(),
        ExportFormat::Json => format!("logs-{}.json", at.format("%Y-%m-%d")),
    }
}

// ---------------------------------------------------------------------------
// Exporter
// ---------------------------------------------------------------------------

/// A rendered export, not yet written anywhere.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub body: String,
}

pub struct Exporter<B> {
    backend: Arc<B>,
    limit: usize,
}

impl<B> Clone for Exporter<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            limit: self.limit,
        }
    }
}

impl<B: LogBackend> Exporter<B> {
    /// `limit` is the row limit sent with the export query, normally
    /// [`BackendConfig::export_limit`](crate::config::BackendConfig::export_limit).
    pub fn new(backend: Arc<B>, limit: usize) -> Self {
        Self { backend, limit }
    }

    /// Fetch and serialize. Nothing touches the filesystem.
    pub async fn render(
        &self,
        filter: &FilterSpec,
        format: ExportFormat,
        options: ExportOptions,
    ) -> Result<ExportArtifact, ExportError> {
        let params = build_params(filter, self.limit);
        let logs = self.backend.fetch_logs(&params).await?;
        let now = Utc::now();
        tracing::info!(records = logs.len(), format = format.as_str(), "export fetched");

        let body = match format {
            ExportFormat::Csv => to_csv(&logs),
            ExportFormat::Json => {
                let mut bundle = ExportBundle {
                    logs,
                    ..ExportBundle::default()
                };
                if options.include_patterns {
                    bundle.patterns = Some(self.backend.fetch_patterns().await?);
                }
                if options.include_trends {
                    bundle.trends = Some(self.backend.fetch_trends().await?);
                }
                if options.include_raw_data {
                    bundle.raw_insights = Some(self.backend.fetch_anomalies().await?);
                }
                to_json(&bundle, now)?
            }
        };

        Ok(ExportArtifact {
            file_name: file_name(format, now),
            body,
        })
    }

    /// Render and atomically write into `dir`. Returns the final path.
    pub async fn export(
        &self,
        filter: &FilterSpec,
        format: ExportFormat,
        options: ExportOptions,
        dir: &Path,
    ) -> Result<PathBuf, ExportError> {
        let artifact = self.render(filter, format, options).await?;
        let path = write_artifact(&artifact, dir)?;
        tracing::info!(path = %path.display(), "export written");
        Ok(path)
    }
}

fn write_artifact(artifact: &ExportArtifact, dir: &Path) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(artifact.body.as_bytes())?;
    tmp.as_file().sync_all()?;
    let path = dir.join(&artifact.file_name);
    tmp.persist(&path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::error::ErrorKind;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn csv_empty_is_empty() {
        assert_eq!(to_csv(&[]), "");
    }

    #[test]
    fn csv_quotes_everything() {
        let out = to_csv(&[json!({"a": 1, "b": "x,y"})]);
        assert_eq!(out, "\"a\",\"b\"\n\"1\",\"x,y\"");
    }

    #[test]
    fn csv_doubles_quotes_and_blanks_nulls() {
        let out = to_csv(&[json!({"m": "say \"hi\"", "n": null}), json!({"m": "x"})]);
        assert_eq!(out, "\"m\",\"n\"\n\"say \"\"hi\"\"\",\"\"\n\"x\",\"\"");
    }

    #[test]
    fn csv_nested_values_are_compact_json() {
        let out = to_csv(&[json!({"tags": ["a", "b"], "ok": false})]);
        assert_eq!(out, "\"tags\",\"ok\"\n\"[\"\"a\"\",\"\"b\"\"]\",\"false\"");
    }

    #[test]
    fn json_without_options_is_bare_array() {
        let bundle = ExportBundle {
            logs: vec![json!({"id": 1})],
            ..ExportBundle::default()
        };
        let at = Utc.with_ymd_and_hms(2025, 8, 26, 0, 0, 0).unwrap();
        let v: Value = serde_json::from_str(&to_json(&bundle, at).unwrap()).unwrap();
        assert_eq!(v, json!([{"id": 1}]));
    }

    #[test]
    fn json_envelope_includes_requested_sections() {
        let bundle = ExportBundle {
            logs: vec![json!({"id": 1}), json!({"id": 2})],
            patterns: Some(vec![json!("p")]),
            trends: None,
            raw_insights: Some(AnomalyReport::default()),
        };
        let at = Utc.with_ymd_and_hms(2025, 8, 26, 0, 0, 0).unwrap();
        let v: Value = serde_json::from_str(&to_json(&bundle, at).unwrap()).unwrap();
        assert_eq!(
            v["export_metadata"],
            json!({"generated_at": "2025-08-26T00:00:00+00:00", "format": "json", "total_records": 2})
        );
        assert_eq!(v["patterns"], json!(["p"]));
        assert!(v.get("trends").is_none());
        assert_eq!(v["raw_insights"], json!({"anomalies": [], "counts": {}}));
    }

    #[test]
    fn file_names() {
        let at = Utc.with_ymd_and_hms(2025, 8, 26, 23, 0, 0).unwrap();
        assert_eq!(file_name(ExportFormat::Csv, at), "logs.csv");
        assert_eq!(file_name(ExportFormat::Json, at), "logs-2025-08-26.json");
    }

    #[tokio::test]
    async fn render_uses_export_limit() {
        let backend = Arc::new(MockBackend::with_logs(vec![json!({"a": 1})]));
        let exporter = Exporter::new(Arc::clone(&backend), 500);
        let artifact = exporter
            .render(&FilterSpec::default(), ExportFormat::Csv, ExportOptions::default())
            .await
            .unwrap();
        assert_eq!(artifact.body, "\"a\"\n\"1\"");
        let queries = backend.log_queries.lock().unwrap();
        assert_eq!(queries[0].get("limit"), Some("500"));
    }

    #[tokio::test]
    async fn failed_fetch_writes_nothing() {
        let backend = Arc::new(MockBackend::default());
        *backend.logs.lock().unwrap() = Err(FetchError::new(ErrorKind::ServerError, "HTTP 500"));
        let exporter = Exporter::new(backend, 500);
        let dir = tempfile::tempdir().unwrap();
        let err = exporter
            .export(&FilterSpec::default(), ExportFormat::Csv, ExportOptions::default(), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Fetch(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}

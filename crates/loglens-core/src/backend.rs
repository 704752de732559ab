//! The HTTP collaborator, as seen by the core.
//!
//! [`LogBackend`] is implemented by `loglens-client` over hyper and by
//! in-memory doubles in tests. All methods are cancel-safe: dropping the
//! returned future abandons the request.

use std::future::Future;

use serde_json::Value;

use crate::error::FetchError;
use crate::query::QueryParams;
use crate::types::{AnomalyReport, RecordId, SourceSpec};

pub trait LogBackend: Send + Sync + 'static {
    /// `GET /api/db_logs?<params>`. A non-array body yields an empty batch.
    fn fetch_logs(
        &self,
        params: &QueryParams,
    ) -> impl Future<Output = Result<Vec<Value>, FetchError>> + Send;

    /// `GET /api/anomalies`.
    fn fetch_anomalies(&self) -> impl Future<Output = Result<AnomalyReport, FetchError>> + Send;

    /// `DELETE /logs/{id}`. Any 2xx is success.
    fn delete_log(&self, id: &RecordId) -> impl Future<Output = Result<(), FetchError>> + Send;

    /// `GET /api/ai/patterns`, the `patterns` array of the response.
    fn fetch_patterns(&self) -> impl Future<Output = Result<Vec<Value>, FetchError>> + Send;

    /// `GET /api/ai/trends`, the `trends` array of the response.
    fn fetch_trends(&self) -> impl Future<Output = Result<Vec<Value>, FetchError>> + Send;

    /// `POST /api/source`.
    fn switch_source(&self, source: &SourceSpec)
        -> impl Future<Output = Result<(), FetchError>> + Send;
}

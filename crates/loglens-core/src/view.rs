//! View Controllers: one per widget, composing a [`Poller`] with the
//! normalizer and the query builder.
//!
//! Controllers own the feed identity. Changing the source or the filter is
//! an identity change, which the poller turns into clear, mark loading,
//! fetch now and resume. Readers take the latest [`FeedState`] through
//! [`watch::Ref`] borrows or a subscription.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;

use crate::backend::LogBackend;
use crate::config::Config;
use crate::error::{ErrorKind, ErrorPresentation, FetchError};
use crate::export::Exporter;
use crate::normalizer::{matches_id, normalize_batch};
use crate::poller::{BackoffPolicy, FeedState, Poller};
use crate::query::build_params;
use crate::types::{AnomalyReport, FilterSpec, NormalizedLogEntry, RecordId, Role};

/// Presentation status of one feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    /// A request for the current identity has not completed yet.
    Waiting,
    Empty,
    Ready,
}

impl FeedStatus {
    fn of(loading: bool, empty: bool) -> Self {
        match (loading, empty) {
            (true, _) => FeedStatus::Waiting,
            (false, true) => FeedStatus::Empty,
            (false, false) => FeedStatus::Ready,
        }
    }
}

// ---------------------------------------------------------------------------
// Log list
// ---------------------------------------------------------------------------

/// What the log list is currently fetching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFeedIdentity {
    pub source_key: String,
    pub filter: FilterSpec,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeleteError {
    #[error("only admins may delete log records")]
    NotPermitted,
    #[error("entry has no record id")]
    MissingId,
}

/// Result of a delete request. The entry is removed locally either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub id: RecordId,
    pub result: Result<(), FetchError>,
}

pub struct LogListController<B> {
    backend: Arc<B>,
    poller: Poller<LogFeedIdentity, Vec<NormalizedLogEntry>>,
    source_key: String,
    filter: FilterSpec,
    limit: usize,
    role: Role,
}

impl<B: LogBackend> LogListController<B> {
    pub fn new(
        backend: Arc<B>,
        source_key: impl Into<String>,
        limit: usize,
        role: Role,
        interval: Duration,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            backend,
            poller: Poller::new("logs", interval, backoff),
            source_key: source_key.into(),
            filter: FilterSpec::default(),
            limit,
            role,
        }
    }

    pub fn identity(&self) -> LogFeedIdentity {
        LogFeedIdentity {
            source_key: self.source_key.clone(),
            filter: self.filter.clone(),
            limit: self.limit,
        }
    }

    pub fn filter(&self) -> &FilterSpec {
        &self.filter
    }

    pub fn source_key(&self) -> &str {
        &self.source_key
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Begin polling the current identity. No-op if it is already polled.
    pub fn start(&mut self) -> bool {
        let backend = Arc::clone(&self.backend);
        self.poller
            .start(self.identity(), move |id| fetch_log_page(Arc::clone(&backend), id))
    }

    /// Force a fresh cycle for the current identity.
    pub fn restart(&mut self) {
        let backend = Arc::clone(&self.backend);
        self.poller
            .restart(self.identity(), move |id| fetch_log_page(Arc::clone(&backend), id));
    }

    pub fn stop(&mut self) {
        self.poller.stop();
    }

    pub fn set_source(&mut self, source_key: impl Into<String>) -> bool {
        self.source_key = source_key.into();
        self.start()
    }

    pub fn set_filter(&mut self, filter: FilterSpec) -> bool {
        self.filter = filter;
        self.start()
    }

    pub fn state(&self) -> watch::Ref<'_, FeedState<Vec<NormalizedLogEntry>>> {
        self.poller.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedState<Vec<NormalizedLogEntry>>> {
        self.poller.subscribe()
    }

    pub fn status(&self) -> FeedStatus {
        let s = self.poller.state();
        FeedStatus::of(s.loading, s.records.is_empty())
    }

    pub fn error(&self) -> Option<ErrorKind> {
        self.poller.state().error
    }

    pub fn error_presentation(&self) -> Option<ErrorPresentation> {
        self.error().map(ErrorKind::presentation)
    }

    /// Prepare a delete of `entry`.
    ///
    /// Fails without sending anything unless the role is admin and the entry
    /// carries a record id. The returned future issues `DELETE /logs/{id}`
    /// and then removes the entry from the current records whatever the
    /// response; the next poll restores it if the server kept it.
    pub fn delete(
        &self,
        entry: &NormalizedLogEntry,
    ) -> Result<impl Future<Output = DeleteOutcome> + Send + 'static, DeleteError> {
        if !self.role.is_admin() {
            return Err(DeleteError::NotPermitted);
        }
        let id = entry.source_record_id.clone().ok_or(DeleteError::MissingId)?;
        let backend = Arc::clone(&self.backend);
        let updater = self.poller.updater();

        Ok(async move {
            let result = backend.delete_log(&id).await;
            match &result {
                Ok(()) => tracing::info!(id = %id, "log record deleted"),
                Err(err) => tracing::warn!(id = %id, error = %err, "delete failed, removing locally anyway"),
            }
            updater.update(|records| records.retain(|e| !matches_id(e, &id)));
            DeleteOutcome { id, result }
        })
    }
}

async fn fetch_log_page<B: LogBackend>(
    backend: Arc<B>,
    id: LogFeedIdentity,
) -> Result<Vec<NormalizedLogEntry>, FetchError> {
    let params = build_params(&id.filter, id.limit);
    let raw = backend.fetch_logs(&params).await?;
    Ok(normalize_batch(&raw))
}

// ---------------------------------------------------------------------------
// Anomaly list and chart
// ---------------------------------------------------------------------------

/// A widget fed from `GET /api/anomalies`, keyed by source only.
pub struct ReportController<B, T> {
    backend: Arc<B>,
    poller: Poller<String, T>,
    source_key: String,
    project: fn(AnomalyReport) -> T,
}

pub type AnomalyListController<B> = ReportController<B, Vec<String>>;
pub type ChartController<B> = ReportController<B, BTreeMap<String, u64>>;

impl<B: LogBackend> ReportController<B, Vec<String>> {
    pub fn anomalies(
        backend: Arc<B>,
        source_key: impl Into<String>,
        interval: Duration,
        backoff: BackoffPolicy,
    ) -> Self {
        Self::with_projection(backend, "anomalies", source_key, interval, backoff, |r| r.anomalies)
    }
}

impl<B: LogBackend> ReportController<B, BTreeMap<String, u64>> {
    pub fn chart(
        backend: Arc<B>,
        source_key: impl Into<String>,
        interval: Duration,
        backoff: BackoffPolicy,
    ) -> Self {
        Self::with_projection(backend, "chart", source_key, interval, backoff, |r| r.counts)
    }
}

impl<B, T> ReportController<B, T>
where
    B: LogBackend,
    T: ReportRecords,
{
    fn with_projection(
        backend: Arc<B>,
        feed: &'static str,
        source_key: impl Into<String>,
        interval: Duration,
        backoff: BackoffPolicy,
        project: fn(AnomalyReport) -> T,
    ) -> Self {
        Self {
            backend,
            poller: Poller::new(feed, interval, backoff),
            source_key: source_key.into(),
            project,
        }
    }

    pub fn start(&mut self) -> bool {
        let backend = Arc::clone(&self.backend);
        let project = self.project;
        self.poller.start(self.source_key.clone(), move |_| {
            fetch_report(Arc::clone(&backend), project)
        })
    }

    pub fn restart(&mut self) {
        let backend = Arc::clone(&self.backend);
        let project = self.project;
        self.poller.restart(self.source_key.clone(), move |_| {
            fetch_report(Arc::clone(&backend), project)
        });
    }

    pub fn stop(&mut self) {
        self.poller.stop();
    }

    pub fn set_source(&mut self, source_key: impl Into<String>) -> bool {
        self.source_key = source_key.into();
        self.start()
    }

    pub fn state(&self) -> watch::Ref<'_, FeedState<T>> {
        self.poller.state()
    }

    pub fn status(&self) -> FeedStatus {
        let s = self.poller.state();
        FeedStatus::of(s.loading, s.records.is_empty_records())
    }

    pub fn error(&self) -> Option<ErrorKind> {
        self.poller.state().error
    }
}

/// Record collections a [`ReportController`] can publish.
pub trait ReportRecords: Default + Send + Sync + 'static {
    fn is_empty_records(&self) -> bool;
}

impl ReportRecords for Vec<String> {
    fn is_empty_records(&self) -> bool {
        self.is_empty()
    }
}

impl ReportRecords for BTreeMap<String, u64> {
    fn is_empty_records(&self) -> bool {
        self.is_empty()
    }
}

async fn fetch_report<B: LogBackend, T>(
    backend: Arc<B>,
    project: fn(AnomalyReport) -> T,
) -> Result<T, FetchError> {
    backend.fetch_anomalies().await.map(project)
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

/// The three widgets plus export, sharing one backend.
pub struct Dashboard<B> {
    backend: Arc<B>,
    pub logs: LogListController<B>,
    pub anomalies: AnomalyListController<B>,
    pub chart: ChartController<B>,
    exporter: Exporter<B>,
}

impl<B: LogBackend> Dashboard<B> {
    pub fn new(backend: Arc<B>, config: &Config, source_key: &str, role: Role) -> Self {
        let backoff = config.poll.backoff();
        let ms = Duration::from_millis;
        Self {
            logs: LogListController::new(
                Arc::clone(&backend),
                source_key,
                config.backend.page_size,
                role,
                ms(config.poll.logs_interval_ms),
                backoff,
            ),
            anomalies: ReportController::anomalies(
                Arc::clone(&backend),
                source_key,
                ms(config.poll.anomalies_interval_ms),
                backoff,
            ),
            chart: ReportController::chart(
                Arc::clone(&backend),
                source_key,
                ms(config.poll.chart_interval_ms),
                backoff,
            ),
            exporter: Exporter::new(Arc::clone(&backend), config.backend.export_limit()),
            backend,
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn exporter(&self) -> &Exporter<B> {
        &self.exporter
    }

    pub fn start(&mut self) {
        self.logs.start();
        self.anomalies.start();
        self.chart.start();
    }

    /// Identity change for all three feeds.
    pub fn set_source(&mut self, source_key: &str) {
        tracing::info!(source = source_key, "switching source");
        self.logs.set_source(source_key);
        self.anomalies.set_source(source_key);
        self.chart.set_source(source_key);
    }

    pub fn set_filter(&mut self, filter: FilterSpec) {
        self.logs.set_filter(filter);
    }

    /// Restart every feed, e.g. after re-authentication.
    pub fn restart_all(&mut self) {
        self.logs.restart();
        self.anomalies.restart();
        self.chart.restart();
    }

    pub fn stop_all(&mut self) {
        self.logs.stop();
        self.anomalies.stop();
        self.chart.stop();
    }

    /// True when any feed reports an authentication failure. The session is
    /// shared, so one such failure means all feeds need re-authentication.
    pub fn auth_required(&self) -> bool {
        [self.logs.error(), self.anomalies.error(), self.chart.error()]
            .contains(&Some(ErrorKind::AuthRequired))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Poller: one refresh loop per data feed.
//!
//! A [`Poller`] owns the published [`FeedState`] of one feed (log list,
//! anomaly list or chart) and at most one running poll task. The task
//! fetches, applies the outcome, sleeps for the nominal interval or the
//! backoff delay, and repeats.
//!
//! # Feed identity
//!
//! Every (re)start bumps `FeedState::generation`. A poll task only applies
//! outcomes while the generation it was spawned with is still current, and
//! the check runs under the watch channel's lock, so a response for a
//! superseded identity can never reach the state. Starting with a new
//! identity cancels the old task first, which drops its timer and its
//! in-flight request.

use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{ErrorKind, FetchError};

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// Exponential backoff: `min(base * growth^retry_count, max)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub growth: f64,
    pub max: Duration,
}

impl BackoffPolicy {
    /// Delay before the next attempt, given how many consecutive failures
    /// preceded the one just observed.
    pub fn delay(&self, retry_count: u32) -> Duration {
        let exponent = i32::try_from(retry_count).unwrap_or(i32::MAX);
        let ms = self.base.as_millis() as f64 * self.growth.powi(exponent);
        let max_ms = self.max.as_millis() as f64;
        if !ms.is_finite() || ms >= max_ms {
            self.max
        } else {
            Duration::from_millis(ms.round() as u64)
        }
    }
}

// ---------------------------------------------------------------------------
// Feed state
// ---------------------------------------------------------------------------

/// Published state of one feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedState<T> {
    pub records: T,
    /// True from an identity change until the first response for it lands.
    pub loading: bool,
    pub error: Option<ErrorKind>,
    pub retry_count: u32,
    /// Identity token; bumped on every restart and on stop.
    pub generation: u64,
    /// Delay scheduled after the last applied outcome, `None` when halted.
    pub next_poll_in: Option<Duration>,
}

impl<T: Default> Default for FeedState<T> {
    fn default() -> Self {
        Self {
            records: T::default(),
            loading: false,
            error: None,
            retry_count: 0,
            generation: 0,
            next_poll_in: None,
        }
    }
}

/// What the poll task does after an outcome has been offered to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Sleep(Duration),
    /// Fatal for this feed until restarted.
    Halt,
    /// The identity moved on; the task must exit without touching anything.
    Stale,
}

/// Apply one fetch outcome to the state if `generation` is still current.
pub(crate) fn apply_outcome<T>(
    state: &watch::Sender<FeedState<T>>,
    feed: &'static str,
    generation: u64,
    outcome: Result<T, FetchError>,
    interval: Duration,
    backoff: &BackoffPolicy,
) -> Step {
    let mut step = Step::Stale;
    state.send_if_modified(|s| {
        if s.generation != generation {
            return false;
        }
        s.loading = false;
        match outcome {
            Ok(records) => {
                s.records = records;
                s.error = None;
                s.retry_count = 0;
                step = Step::Sleep(interval);
            }
            Err(err) if !err.kind().is_retryable() => {
                tracing::warn!(feed, generation, error = %err, "feed halted, re-authentication required");
                s.error = Some(err.kind());
                step = Step::Halt;
            }
            Err(err) => {
                let delay = backoff.delay(s.retry_count);
                s.retry_count = s.retry_count.saturating_add(1);
                s.error = Some(err.kind());
                tracing::warn!(
                    feed,
                    generation,
                    retry = s.retry_count,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "poll failed, backing off"
                );
                step = Step::Sleep(delay);
            }
        }
        s.next_poll_in = match step {
            Step::Sleep(d) => Some(d),
            _ => None,
        };
        true
    });
    step
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Cancellable handle to a running poll task. Dropping it cancels the task.
#[derive(Debug)]
pub struct PollHandle {
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Abort the task: its pending timer and in-flight request are dropped.
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Mutates the records of a feed outside the poll cycle (optimistic updates).
///
/// Bound to the generation current when it was created; once the feed
/// identity moves on, updates are ignored.
pub struct FeedUpdater<T> {
    state: Arc<watch::Sender<FeedState<T>>>,
    generation: u64,
}

impl<T> Clone for FeedUpdater<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            generation: self.generation,
        }
    }
}

impl<T> FeedUpdater<T> {
    /// Apply `f` to the records. Returns `false` if the identity changed.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool {
        self.state.send_if_modified(|s| {
            if s.generation != self.generation {
                return false;
            }
            f(&mut s.records);
            true
        })
    }
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

pub struct Poller<I, T> {
    feed: &'static str,
    interval: Duration,
    backoff: BackoffPolicy,
    state: Arc<watch::Sender<FeedState<T>>>,
    identity: Option<I>,
    handle: Option<PollHandle>,
}

impl<I, T> Poller<I, T>
where
    I: Clone + PartialEq + Debug + Send + Sync + 'static,
    T: Default + Send + Sync + 'static,
{
    pub fn new(feed: &'static str, interval: Duration, backoff: BackoffPolicy) -> Self {
        let (state, _) = watch::channel(FeedState::default());
        Self {
            feed,
            interval,
            backoff,
            state: Arc::new(state),
            identity: None,
            handle: None,
        }
    }

    pub fn identity(&self) -> Option<&I> {
        self.identity.as_ref()
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedState<T>> {
        self.state.subscribe()
    }

    /// Borrow the current state. Do not hold across an `.await`.
    pub fn state(&self) -> watch::Ref<'_, FeedState<T>> {
        self.state.borrow()
    }

    pub fn updater(&self) -> FeedUpdater<T> {
        FeedUpdater {
            state: Arc::clone(&self.state),
            generation: self.state.borrow().generation,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Poll `identity` with `fetch`. A no-op returning `false` when already
    /// polling a structurally equal identity; otherwise restarts.
    pub fn start<F, Fut>(&mut self, identity: I, fetch: F) -> bool
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        if self.identity.as_ref() == Some(&identity) && self.is_running() {
            return false;
        }
        self.restart(identity, fetch);
        true
    }

    /// Unconditionally cancel and restart: clear records, mark loading, fetch
    /// immediately, then resume periodic polling.
    pub fn restart<F, Fut>(&mut self, identity: I, fetch: F)
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        if let Some(handle) = self.handle.take() {
            handle.cancel();
        }

        let mut generation = 0;
        self.state.send_modify(|s| {
            s.generation += 1;
            s.records = T::default();
            s.loading = true;
            s.error = None;
            s.retry_count = 0;
            s.next_poll_in = None;
            generation = s.generation;
        });
        tracing::debug!(feed = self.feed, generation, identity = ?identity, "feed identity changed");

        let task = tokio::spawn(run_feed(
            Arc::clone(&self.state),
            self.feed,
            generation,
            identity.clone(),
            fetch,
            self.interval,
            self.backoff,
        ));
        self.identity = Some(identity);
        self.handle = Some(PollHandle { task });
    }

    /// Cancel polling. Records are kept; no further outcome will be applied.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.cancel();
            self.state.send_modify(|s| {
                s.generation += 1;
                s.loading = false;
                s.next_poll_in = None;
            });
            tracing::debug!(feed = self.feed, "feed stopped");
        }
    }
}

impl<I, T> Drop for Poller<I, T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.cancel();
        }
    }
}

async fn run_feed<I, T, F, Fut>(
    state: Arc<watch::Sender<FeedState<T>>>,
    feed: &'static str,
    generation: u64,
    identity: I,
    fetch: F,
    interval: Duration,
    backoff: BackoffPolicy,
) where
    I: Clone,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    loop {
        let outcome = fetch(identity.clone()).await;
        match apply_outcome(&state, feed, generation, outcome, interval, &backoff) {
            Step::Sleep(delay) => tokio::time::sleep(delay).await,
            Step::Halt => return,
            Step::Stale => {
                tracing::debug!(feed, generation, "discarding response for superseded identity");
                return;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    fn policy() -> BackoffPolicy {
        BackoffPolicy {
            base: Duration::from_millis(5000),
            growth: 1.5,
            max: Duration::from_millis(30000),
        }
    }

    #[test]
    fn backoff_grows_then_caps() {
        let p = policy();
        let delays: Vec<u64> = (0..7).map(|n| p.delay(n).as_millis() as u64).collect();
        assert_eq!(&delays[..3], &[5000, 7500, 11250]);
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*delays.last().unwrap(), 30000);
        assert_eq!(p.delay(u32::MAX), Duration::from_millis(30000));
    }

    #[test]
    fn stale_generation_is_discarded() {
        let (tx, _rx) = watch::channel(FeedState::<Vec<u32>> {
            generation: 2,
            records: vec![1],
            ..FeedState::default()
        });
        let step = apply_outcome(&tx, "test", 1, Ok(vec![9]), Duration::from_secs(2), &policy());
        assert_eq!(step, Step::Stale);
        assert_eq!(tx.borrow().records, vec![1]);
    }

    #[test]
    fn failure_keeps_last_good_records() {
        let (tx, _rx) = watch::channel(FeedState::<Vec<u32>> {
            generation: 1,
            records: vec![1, 2],
            ..FeedState::default()
        });
        let err = FetchError::unreachable("refused");
        let step = apply_outcome(&tx, "test", 1, Err(err), Duration::from_secs(2), &policy());
        assert_eq!(step, Step::Sleep(Duration::from_millis(5000)));
        let s = tx.borrow();
        assert_eq!(s.records, vec![1, 2]);
        assert_eq!(s.retry_count, 1);
        assert_eq!(s.error, Some(ErrorKind::NetworkUnreachable));
    }

    #[test]
    fn auth_failure_halts_without_escalating() {
        let (tx, _rx) = watch::channel(FeedState::<Vec<u32>> {
            generation: 1,
            ..FeedState::default()
        });
        let err = FetchError::from_status(401).unwrap();
        let step = apply_outcome(&tx, "test", 1, Err(err), Duration::from_secs(2), &policy());
        assert_eq!(step, Step::Halt);
        assert_eq!(tx.borrow().retry_count, 0);
        assert_eq!(tx.borrow().next_poll_in, None);
    }

    #[tokio::test(start_paused = true)]
    async fn start_clears_and_fetches_immediately() {
        let mut poller: Poller<u32, Vec<u32>> =
            Poller::new("test", Duration::from_secs(2), policy());
        poller.start(1, |id| async move { Ok(vec![id]) });
        assert!(poller.state().loading);
        sleep(Duration::from_millis(1)).await;
        let s = poller.state().clone();
        assert_eq!(s.records, vec![1]);
        assert!(!s.loading);
        assert_eq!(s.next_poll_in, Some(Duration::from_secs(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn same_identity_does_not_restart() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut poller: Poller<u32, Vec<u32>> =
            Poller::new("test", Duration::from_secs(2), policy());
        let c = Arc::clone(&calls);
        let fetch = move |id| {
            c.fetch_add(1, Ordering::SeqCst);
            async move { Ok(vec![id]) }
        };
        assert!(poller.start(1, fetch.clone()));
        assert!(!poller.start(1, fetch));
        sleep(Duration::from_millis(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(poller.state().generation, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_prevents_further_fetches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut poller: Poller<u32, Vec<u32>> =
            Poller::new("test", Duration::from_secs(2), policy());
        let c = Arc::clone(&calls);
        poller.start(1, move |id| {
            c.fetch_add(1, Ordering::SeqCst);
            async move { Ok(vec![id]) }
        });
        sleep(Duration::from_millis(1)).await;
        poller.stop();
        sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!poller.is_running());
        assert_eq!(poller.state().records, vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn updater_mutates_records() {
        let mut poller: Poller<u32, Vec<u32>> =
            Poller::new("test", Duration::from_secs(2), policy());
        poller.start(1, |_| async { Ok(vec![1, 2, 3]) });
        sleep(Duration::from_millis(1)).await;
        assert!(poller.updater().update(|r| r.retain(|n| *n != 2)));
        assert_eq!(poller.state().records, vec![1, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn updater_ignored_after_identity_change() {
        let mut poller: Poller<u32, Vec<u32>> =
            Poller::new("test", Duration::from_secs(2), policy());
        poller.start(1, |_| async { Ok(vec![1, 2, 3]) });
        sleep(Duration::from_millis(1)).await;
        let updater = poller.updater();
        poller.start(2, |_| async { Ok(vec![1, 2, 3]) });
        sleep(Duration::from_millis(1)).await;
        assert!(!updater.update(|r| r.clear()));
        assert_eq!(poller.state().records, vec![1, 2, 3]);
    }
}

//! Periodic driver for collection cycles.
//!
//! A [`Scheduler`] runs one cycle as soon as it starts and then one per
//! interval tick until [`Scheduler::stop`] is called. Its lifecycle is
//! `Idle → Running → Stopped`; `Stopped` is terminal.
//!
//! Stopping goes through a [`CancellationToken`], so it is safe to call any
//! number of times and from any task, including before `start`. A cycle that
//! is already in flight is allowed to finish; the stop only prevents the next
//! one. The current state is published on a `watch` channel that the HTTP
//! health endpoint reads.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::OnPersistenceError;
use crate::pipeline::{CycleError, Pipeline};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler is already running")]
    AlreadyRunning,

    #[error("collection halted after a storage failure: {0}")]
    Halted(#[source] CycleError),
}

pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    interval: Duration,
    on_persistence_error: OnPersistenceError,
    shutdown: CancellationToken,
    state: watch::Sender<SchedulerState>,
}

/// Publishes `Stopped` when the run loop exits, including by panic or by the
/// `start` future being dropped.
struct StoppedOnExit<'a>(&'a watch::Sender<SchedulerState>);

impl Drop for StoppedOnExit<'_> {
    fn drop(&mut self) {
        self.0.send_replace(SchedulerState::Stopped);
    }
}

impl Scheduler {
    pub fn new(pipeline: Arc<Pipeline>, interval: Duration) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            pipeline,
            interval,
            on_persistence_error: OnPersistenceError::default(),
            shutdown: CancellationToken::new(),
            state,
        }
    }

    pub fn with_failure_policy(mut self, policy: OnPersistenceError) -> Self {
        self.on_persistence_error = policy;
        self
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Run until stopped, or until a cycle fails under the `halt` policy.
    ///
    /// Returns `Ok(())` without running anything if `stop` was already
    /// called, and [`SchedulerError::AlreadyRunning`] if another `start` is
    /// in progress.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        let mut previous = SchedulerState::Idle;
        let claimed = self.state.send_if_modified(|state| {
            previous = *state;
            if *state == SchedulerState::Idle {
                *state = SchedulerState::Running;
                true
            } else {
                false
            }
        });
        if !claimed {
            return match previous {
                SchedulerState::Running => Err(SchedulerError::AlreadyRunning),
                _ => {
                    debug!("Scheduler already stopped; not starting");
                    Ok(())
                }
            };
        }

        let _stopped = StoppedOnExit(&self.state);
        info!(interval_secs = self.interval.as_secs(), "Scheduler started");
        let outcome = self.run().await;
        info!(halted = outcome.is_err(), "Scheduler stopped");
        outcome
    }

    async fn run(&self) -> Result<(), SchedulerError> {
        if self.shutdown.is_cancelled() {
            return Ok(());
        }
        self.tick().await?;

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return Ok(()),
                _ = ticker.tick() => self.tick().await?,
            }
        }
    }

    async fn tick(&self) -> Result<(), SchedulerError> {
        let Err(e) = self.pipeline.run_cycle().await else {
            return Ok(());
        };
        match self.on_persistence_error {
            OnPersistenceError::Halt => {
                error!(error = %e, "Collection cycle failed; halting scheduler");
                Err(SchedulerError::Halted(e))
            }
            OnPersistenceError::SkipCycle => {
                error!(error = %e, "Collection cycle failed; retrying on next tick");
                Ok(())
            }
        }
    }

    /// Request a stop and wait until the run loop has acknowledged it.
    ///
    /// Idempotent. Before `start`, this moves the scheduler straight to
    /// `Stopped`.
    pub async fn stop(&self) {
        self.shutdown.cancel();
        self.state.send_if_modified(|state| {
            if *state == SchedulerState::Idle {
                *state = SchedulerState::Stopped;
                true
            } else {
                false
            }
        });

        let mut state = self.subscribe();
        // The sender lives in `self`, so this only ends once `Stopped` is seen.
        let _ = state.wait_for(|s| *s == SchedulerState::Stopped).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::api::{AppState, router};
    use crate::models::Article;
    use crate::query::QueryService;
    use crate::scrapers::AdapterRegistry;
    use crate::store::NewsStore;
    use crate::testing::{RecordingStore, ScriptedAdapter, article};

    const INTERVAL: Duration = Duration::from_secs(60);

    fn one_article_adapter() -> ScriptedAdapter {
        ScriptedAdapter::new()
            .listing("http://a/news", &[("A1", "http://a/1", "2024-01-01T10:00:00Z")])
            .page("http://a/1", "body")
    }

    fn scheduler(adapter: Arc<ScriptedAdapter>, store: Arc<RecordingStore>) -> Scheduler {
        let registry = AdapterRegistry::new().with_adapter("a", adapter);
        let pipeline = Pipeline::new(
            Arc::new(registry),
            store,
            vec!["http://a/news".to_string()],
        );
        Scheduler::new(Arc::new(pipeline), INTERVAL)
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_start_runs_nothing() {
        let adapter = Arc::new(one_article_adapter());
        let scheduler = scheduler(adapter.clone(), Arc::new(RecordingStore::new()));

        scheduler.stop().await;
        assert_eq!(scheduler.state(), SchedulerState::Stopped);

        scheduler.start().await.unwrap();
        assert_eq!(adapter.fetches(), 0);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_immediately_then_every_tick() {
        let adapter = Arc::new(ScriptedAdapter::new().page("http://a/news", ""));
        let scheduler = Arc::new(scheduler(adapter.clone(), Arc::new(RecordingStore::new())));

        let running = tokio::spawn({
            let scheduler = Arc::clone(&scheduler);
            async move { scheduler.start().await }
        });

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(scheduler.state(), SchedulerState::Running);
        assert_eq!(adapter.fetches(), 1);

        time::sleep(INTERVAL).await;
        assert_eq!(adapter.fetches(), 2);

        time::sleep(INTERVAL).await;
        assert_eq!(adapter.fetches(), 3);

        scheduler.stop().await;
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        running.await.unwrap().unwrap();

        // No cycles after the stop was acknowledged.
        time::sleep(INTERVAL * 3).await;
        assert_eq!(adapter.fetches(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let adapter = Arc::new(one_article_adapter());
        let scheduler = Arc::new(scheduler(adapter, Arc::new(RecordingStore::new())));

        let running = tokio::spawn({
            let scheduler = Arc::clone(&scheduler);
            async move { scheduler.start().await }
        });
        time::sleep(Duration::from_secs(1)).await;

        scheduler.stop().await;
        scheduler.stop().await;
        tokio::join!(scheduler.stop(), scheduler.stop());

        running.await.unwrap().unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_is_rejected() {
        let adapter = Arc::new(one_article_adapter());
        let scheduler = Arc::new(scheduler(adapter, Arc::new(RecordingStore::new())));

        let running = tokio::spawn({
            let scheduler = Arc::clone(&scheduler);
            async move { scheduler.start().await }
        });
        time::sleep(Duration::from_secs(1)).await;

        assert!(matches!(
            scheduler.start().await,
            Err(SchedulerError::AlreadyRunning)
        ));

        scheduler.stop().await;
        running.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_failure_halts_collection() {
        let adapter = Arc::new(one_article_adapter());
        let store = Arc::new(RecordingStore::new());
        store.fail_insert(true);
        let scheduler = scheduler(adapter.clone(), Arc::clone(&store));

        let outcome = scheduler.start().await;

        assert!(matches!(
            outcome,
            Err(SchedulerError::Halted(CycleError::Insert { .. }))
        ));
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert_eq!(store.insert_calls(), 1);

        // Reads keep working after the halt.
        assert!(store.latest(10).await.unwrap().is_empty());

        // Stopping a halted scheduler returns at once.
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_api_keeps_serving_after_halt() {
        let adapter = Arc::new(one_article_adapter());
        let store = Arc::new(RecordingStore::new());
        store.insert(&article("http://a/0", 9)).await.unwrap();
        store.fail_insert(true);
        let scheduler = scheduler(adapter, Arc::clone(&store));

        assert!(matches!(
            scheduler.start().await,
            Err(SchedulerError::Halted(_))
        ));

        let app = router(AppState {
            query: QueryService::new(store),
            collector: scheduler.subscribe(),
        });
        let get = |uri: &'static str| {
            app.clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        };

        let response = get("/news").await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let articles: Vec<Article> = serde_json::from_slice(&body).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].link, "http://a/0");

        let response = get("/health").await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(health["collector"], "stopped");
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_after_halt_runs_nothing() {
        let adapter = Arc::new(one_article_adapter());
        let store = Arc::new(RecordingStore::new());
        store.fail_insert(true);
        let scheduler = scheduler(adapter.clone(), Arc::clone(&store));

        assert!(scheduler.start().await.is_err());
        let fetches = adapter.fetches();

        store.fail_insert(false);
        scheduler.start().await.unwrap();
        time::sleep(INTERVAL * 2).await;

        assert_eq!(adapter.fetches(), fetches);
        assert_eq!(store.insert_calls(), 1);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_cycle_policy_keeps_collecting() {
        let adapter = Arc::new(one_article_adapter());
        let store = Arc::new(RecordingStore::new());
        store.fail_insert(true);
        let scheduler = Arc::new(
            scheduler(adapter, Arc::clone(&store))
                .with_failure_policy(OnPersistenceError::SkipCycle),
        );

        let running = tokio::spawn({
            let scheduler = Arc::clone(&scheduler);
            async move { scheduler.start().await }
        });

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.insert_calls(), 1);

        store.fail_insert(false);
        time::sleep(INTERVAL).await;
        assert_eq!(store.insert_calls(), 2);
        assert_eq!(store.latest(10).await.unwrap().len(), 1);

        scheduler.stop().await;
        running.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_waits_for_in_flight_cycle() {
        let adapter = Arc::new(one_article_adapter().with_delay(Duration::from_secs(10)));
        let store = Arc::new(RecordingStore::new());
        let scheduler = Arc::new(scheduler(adapter, Arc::clone(&store)));

        let running = tokio::spawn({
            let scheduler = Arc::clone(&scheduler);
            async move { scheduler.start().await }
        });
        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.insert_calls(), 0);

        let asked = Instant::now();
        scheduler.stop().await;

        // Listing and article fetch take 10s each; the cycle was not cut short.
        assert!(asked.elapsed() >= Duration::from_secs(19));
        assert_eq!(store.insert_calls(), 1);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        running.await.unwrap().unwrap();
    }
}

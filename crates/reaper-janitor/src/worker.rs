//! Event-driven worker for continuous Janitor operation

use crate::{Cancellation, EventFilter, JanitorConfig, JanitorError, JanitorMetrics, Reconciler};
use reaper_domain::{
    format_duration, Clock, Decision, EventKind, PolicyLookup, RecordKey, RecordStore, WatchEvent,
};
use std::collections::HashMap;
use std::fmt::Display;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};

type Outcome = (RecordKey, Result<Decision, JanitorError>);

/// Background worker that reconciles records as watch events arrive
///
/// Keys are queued from the watch feed, from requeue timers and from store
/// listings. At most one reconcile per key runs at a time; events that
/// arrive meanwhile mark the key dirty and it is reconciled once more when
/// the pass finishes. A newer event for a key cancels its pending requeue
/// timer. When the feed lags and drops events, every record in the store is
/// queued again.
///
/// # Examples
///
/// ```no_run
/// use reaper_domain::SystemClock;
/// use reaper_janitor::{JanitorConfig, JanitorWorker};
/// use reaper_store::{MemoryStore, StaticPolicies};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryStore::new();
///     let events = store.subscribe();
///     let worker = JanitorWorker::new(JanitorConfig::default(), store, StaticPolicies::new(), SystemClock);
///
///     let (shutdown_tx, shutdown) = tokio::sync::watch::channel(false);
///     tokio::spawn(async move {
///         let _ = tokio::signal::ctrl_c().await;
///         let _ = shutdown_tx.send(true);
///     });
///
///     worker.run(events, shutdown).await?;
///     Ok(())
/// }
/// ```
pub struct JanitorWorker<S, P, C> {
    reconciler: Arc<Reconciler<S, P, C>>,
    filter: EventFilter,
    config: JanitorConfig,
}

impl<S, P, C> JanitorWorker<S, P, C>
where
    S: RecordStore + Send + Sync + 'static,
    S::Error: Display,
    P: PolicyLookup + Send + Sync + 'static,
    P::Error: Display,
    C: Clock + Send + Sync + 'static,
{
    /// Create a new worker over the given collaborators
    pub fn new(config: JanitorConfig, store: S, policies: P, clock: C) -> Self {
        Self {
            reconciler: Arc::new(Reconciler::new(&config, store, policies, clock)),
            filter: EventFilter::from_config(&config),
            config,
        }
    }

    /// Snapshot of the metrics collected so far
    pub fn metrics(&self) -> JanitorMetrics {
        self.reconciler.metrics()
    }

    /// Run until `shutdown` turns true, its sender is dropped, or the feed closes
    ///
    /// The store is listed first and every accepted record is queued as if
    /// just added, so `events` must be subscribed before calling. In-flight
    /// reconciles observe shutdown through their [`Cancellation`] and are
    /// awaited before return.
    ///
    /// # Errors
    ///
    /// Reconcile and listing failures are retried with backoff and never end
    /// the run. Returns an error only if the tokio runtime fails a reconcile
    /// task.
    pub async fn run(
        &self,
        mut events: broadcast::Receiver<WatchEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), JanitorError> {
        let (due_tx, mut due_rx) = mpsc::unbounded_channel();
        let (resync_tx, mut resync_rx) = mpsc::unbounded_channel();
        let mut dispatch = Dispatch {
            reconciler: Arc::clone(&self.reconciler),
            config: &self.config,
            filter: &self.filter,
            keys: HashMap::new(),
            tasks: JoinSet::new(),
            due_tx,
            resync_tx,
            resync_failures: 0,
            resync_timer: None,
            cancel: Cancellation::from(shutdown.clone()),
        };

        tracing::info!(
            install_mode = ?self.config.install_mode(),
            dry_run = self.config.dry_run,
            "Janitor worker started"
        );

        dispatch.resync();

        let mut fatal = None;
        loop {
            tokio::select! {
                _ = shutdown.wait_for(|stop| *stop) => {
                    tracing::info!("Shutdown signal received, stopping janitor");
                    break;
                }
                received = events.recv() => match received {
                    Ok(event) => {
                        if self.filter.accepts(&event) {
                            tracing::trace!(key = %event.record.key, kind = ?event.kind, "Event accepted");
                            dispatch.enqueue(event.record.key);
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Watch feed lagged, resyncing from store");
                        dispatch.resync();
                    }
                    Err(RecvError::Closed) => {
                        tracing::info!("Watch feed closed, stopping janitor");
                        break;
                    }
                },
                Some(key) = due_rx.recv() => {
                    dispatch.fire_timer(key);
                }
                Some(()) = resync_rx.recv() => {
                    dispatch.resync();
                }
                Some(joined) = dispatch.tasks.join_next(), if !dispatch.tasks.is_empty() => {
                    match joined {
                        Ok((key, result)) => dispatch.complete(key, result),
                        Err(e) => {
                            tracing::error!(error = %e, "Reconcile task failed");
                            fatal = Some(JanitorError::Worker(e.to_string()));
                            break;
                        }
                    }
                }
            }
        }

        dispatch.drain().await;
        tracing::info!("Janitor stopped. Final metrics:\n{}", self.metrics().summary());

        match fatal {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Queue state of one key
#[derive(Default)]
struct KeyState {
    in_flight: bool,
    dirty: bool,
    failures: u32,
    timer: Option<JoinHandle<()>>,
}

/// Per-run queue bookkeeping
struct Dispatch<'a, S, P, C> {
    reconciler: Arc<Reconciler<S, P, C>>,
    config: &'a JanitorConfig,
    filter: &'a EventFilter,
    keys: HashMap<RecordKey, KeyState>,
    tasks: JoinSet<Outcome>,
    due_tx: mpsc::UnboundedSender<RecordKey>,
    resync_tx: mpsc::UnboundedSender<()>,
    resync_failures: u32,
    resync_timer: Option<JoinHandle<()>>,
    cancel: Cancellation,
}

impl<S, P, C> Dispatch<'_, S, P, C>
where
    S: RecordStore + Send + Sync + 'static,
    S::Error: Display,
    P: PolicyLookup + Send + Sync + 'static,
    P::Error: Display,
    C: Clock + Send + Sync + 'static,
{
    /// List the store and queue every accepted record
    ///
    /// A failed listing is retried on the error backoff schedule.
    fn resync(&mut self) {
        if let Some(timer) = self.resync_timer.take() {
            timer.abort();
        }
        match self.reconciler.store().list() {
            Ok(records) => {
                self.resync_failures = 0;
                let mut queued = 0usize;
                for record in records {
                    let event = WatchEvent::new(EventKind::Added, record);
                    if self.filter.accepts(&event) {
                        self.enqueue(event.record.key);
                        queued += 1;
                    }
                }
                tracing::debug!(queued, "Resynced from store");
            }
            Err(e) => {
                self.resync_failures = self.resync_failures.saturating_add(1);
                let delay = self.config.error_backoff(self.resync_failures);
                tracing::warn!(
                    error = %e,
                    failures = self.resync_failures,
                    retry_in = %format_duration(delay),
                    "Listing records failed"
                );
                let resync_tx = self.resync_tx.clone();
                self.resync_timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = resync_tx.send(());
                }));
            }
        }
    }

    /// Queue a key for reconcile, superseding any pending requeue
    fn enqueue(&mut self, key: RecordKey) {
        let state = self.keys.entry(key.clone()).or_default();
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        if state.in_flight {
            state.dirty = true;
            return;
        }
        state.in_flight = true;
        self.spawn(key);
    }

    fn fire_timer(&mut self, key: RecordKey) {
        if let Some(state) = self.keys.get_mut(&key) {
            state.timer = None;
        }
        self.enqueue(key);
    }

    fn spawn(&mut self, key: RecordKey) {
        let reconciler = Arc::clone(&self.reconciler);
        let cancel = self.cancel.clone();
        self.tasks.spawn_blocking(move || {
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| reconciler.reconcile(&key, &cancel)))
                .unwrap_or_else(|_| Err(JanitorError::Worker("reconcile panicked".to_string())));
            (key, result)
        });
    }

    fn complete(&mut self, key: RecordKey, result: Result<Decision, JanitorError>) {
        let Some(state) = self.keys.get_mut(&key) else {
            return;
        };
        state.in_flight = false;

        let retry_after = match result {
            Ok(decision) => {
                tracing::debug!(key = %key, decision = %decision, "Reconciled");
                state.failures = 0;
                decision.requeue_after()
            }
            Err(JanitorError::Cancelled) => return,
            Err(e) => {
                state.failures = state.failures.saturating_add(1);
                let delay = self.config.error_backoff(state.failures);
                tracing::warn!(
                    key = %key,
                    error = %e,
                    failures = state.failures,
                    retry_in = %format_duration(delay),
                    "Reconcile failed"
                );
                Some(delay)
            }
        };

        if state.dirty {
            state.dirty = false;
            state.in_flight = true;
            self.spawn(key);
            return;
        }
        match retry_after {
            Some(delay) => self.arm_timer(key, delay),
            None => {
                self.keys.remove(&key);
            }
        }
    }

    fn arm_timer(&mut self, key: RecordKey, delay: Duration) {
        let due_tx = self.due_tx.clone();
        let timer_key = key.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The receiver only goes away once the run is over
            let _ = due_tx.send(timer_key);
        });
        if let Some(state) = self.keys.get_mut(&key) {
            if let Some(previous) = state.timer.replace(handle) {
                previous.abort();
            }
        }
    }

    /// Cancel timers and wait for in-flight reconciles to observe shutdown
    async fn drain(&mut self) {
        if let Some(timer) = self.resync_timer.take() {
            timer.abort();
        }
        for state in self.keys.values_mut() {
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
        }
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok((key, Err(JanitorError::Cancelled))) => {
                    tracing::debug!(key = %key, "Reconcile cancelled by shutdown");
                }
                Ok((key, Err(e))) => tracing::warn!(key = %key, error = %e, "Reconcile failed during shutdown"),
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Reconcile task failed during shutdown"),
            }
        }
        self.keys.clear();
    }
}

// Cascade Scheduler
// Runs connected flows concurrently in dependency order

use super::cancel::{CancellationContext, CancellationId};
use super::config::CascadeConfig;
use super::connector::CascadeGraph;
use super::events::{CascadeEvent, EventSender, ProgressSender};
use super::job::{CascadeJob, JobContext};
use super::skip::SkipStrategy;
use super::stats::{CascadeStats, CascadeStatus};
use super::tap::flatten;
use crate::error::{ServiceError, ServiceResult};

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Handle to one scheduled run over a [`CascadeGraph`].
///
/// Clones share the same run. The state moves from pending to running and
/// then to exactly one of successful, failed or stopped.
#[derive(Debug, Clone)]
pub struct Cascade {
    inner: Arc<CascadeInner>,
}

#[derive(Debug)]
struct CascadeInner {
    name: String,
    graph: CascadeGraph,
    config: CascadeConfig,
    skip_strategy: Arc<dyn SkipStrategy>,
    event_tx: Option<ProgressSender>,
    cancellation: Option<CancellationContext>,
    /// In dependency order
    jobs: Vec<Arc<CascadeJob>>,
    width: usize,
    semaphore: Arc<Semaphore>,
    state: Mutex<RunState>,
    stop_tx: watch::Sender<bool>,
    done_tx: watch::Sender<bool>,
}

#[derive(Debug)]
struct RunState {
    status: CascadeStatus,
    stop_requested: bool,
    first_error: Option<ServiceError>,
    started: Option<Instant>,
    duration: Option<Duration>,
}

impl Cascade {
    pub(crate) fn new(
        name: String,
        graph: CascadeGraph,
        config: CascadeConfig,
        skip_strategy: Arc<dyn SkipStrategy>,
        event_tx: Option<ProgressSender>,
        cancellation: Option<CancellationContext>,
    ) -> Self {
        let jobs: Vec<Arc<CascadeJob>> = graph
            .flows_in_order()
            .into_iter()
            .map(|flow| Arc::new(CascadeJob::new(Arc::clone(flow))))
            .collect();

        let local_count = jobs.iter().filter(|job| job.flow().is_local()).count();
        let width = config.concurrency_width(jobs.len(), local_count);
        if local_count > 1 {
            debug!(cascade = %name, local_count, "More than one local flow, running one at a time");
        }

        let (stop_tx, _) = watch::channel(false);
        let (done_tx, _) = watch::channel(false);

        Self {
            inner: Arc::new(CascadeInner {
                name,
                graph,
                config,
                skip_strategy,
                event_tx,
                cancellation,
                jobs,
                width,
                semaphore: Arc::new(Semaphore::new(width)),
                state: Mutex::new(RunState {
                    status: CascadeStatus::Pending,
                    stop_requested: false,
                    first_error: None,
                    started: None,
                    duration: None,
                }),
                stop_tx,
                done_tx,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn graph(&self) -> &CascadeGraph {
        &self.inner.graph
    }

    /// Number of flows allowed to run at once
    pub fn width(&self) -> usize {
        self.inner.width
    }

    pub fn status(&self) -> CascadeStatus {
        self.inner.state().status
    }

    pub fn stats(&self) -> CascadeStats {
        let (status, duration) = {
            let state = self.inner.state();
            let duration = state
                .duration
                .or_else(|| state.started.map(|started| started.elapsed()));
            (state.status, duration)
        };

        CascadeStats {
            name: self.inner.name.clone(),
            status,
            duration,
            flows: self.inner.jobs.iter().map(|job| job.stats()).collect(),
        }
    }

    /// Begin the run on the current tokio runtime; no-op unless pending.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn start(&self) {
        {
            let mut state = self.inner.state();
            if state.status != CascadeStatus::Pending {
                return;
            }
            state.status = CascadeStatus::Running;
            state.started = Some(Instant::now());
        }

        let cascade = self.clone();
        tokio::spawn(async move { cascade.run().await });
    }

    /// Start if needed and wait for a terminal state.
    ///
    /// Returns the first flow failure of the run. A stopped run is not an
    /// error.
    pub async fn complete(&self) -> ServiceResult<()> {
        self.start();

        let mut done = self.inner.done_tx.subscribe();
        let _ = done.wait_for(|done| *done).await;

        match self.inner.state().first_error.clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Stop every flow, most downstream first.
    ///
    /// Safe to call repeatedly and from several tasks. The status becomes
    /// stopped unless the run already failed or finished.
    pub async fn stop(&self) {
        let was_pending = {
            let mut state = self.inner.state();
            if state.stop_requested {
                return;
            }
            match state.status {
                CascadeStatus::Successful | CascadeStatus::Stopped => return,
                CascadeStatus::Failed => {}
                CascadeStatus::Pending | CascadeStatus::Running => {
                    state.status = CascadeStatus::Stopped;
                }
            }
            state.stop_requested = true;
            state.started.is_none()
        };

        info!(cascade = %self.inner.name, "Stopping cascade");
        self.stop_jobs().await;
        self.inner.stop_tx.send_replace(true);

        if was_pending {
            self.finish(None);
        }
    }

    async fn run(&self) {
        let inner = &self.inner;
        let registration = self.register_cancellation();

        info!(
            cascade = %inner.name,
            flows = inner.jobs.len(),
            width = inner.width,
            "Starting cascade"
        );
        inner.event_tx.send_event(CascadeEvent::cascade_started(
            &inner.name,
            inner.jobs.len(),
            inner.width,
        ));

        let ctx = JobContext {
            cascade: inner.name.clone(),
            semaphore: Arc::clone(&inner.semaphore),
            skip_strategy: Arc::clone(&inner.skip_strategy),
            event_tx: inner.event_tx.clone(),
        };

        let mut set = JoinSet::new();
        for job in &inner.jobs {
            let predecessors: Vec<Arc<CascadeJob>> = inner
                .graph
                .predecessors(job.name())
                .into_iter()
                .filter_map(|name| inner.job(name))
                .collect();
            set.spawn(Arc::clone(job).run(predecessors, ctx.clone()));
        }

        let mut stop_rx = inner.stop_tx.subscribe();
        let mut deadline: Option<tokio::time::Instant> = None;

        loop {
            let next = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, set.join_next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!(
                            cascade = %inner.name,
                            remaining = set.len(),
                            "Shutdown grace period elapsed, abandoning running flows"
                        );
                        inner.event_tx.send_event(CascadeEvent::warning(
                            format!("abandoning {} flow(s) still running after the grace period", set.len()),
                            None,
                        ));
                        set.abort_all();
                        while set.join_next().await.is_some() {}
                        break;
                    }
                },
                None => {
                    if *stop_rx.borrow_and_update() {
                        deadline = Some(self.grace_deadline());
                        continue;
                    }
                    tokio::select! {
                        next = set.join_next() => next,
                        _ = stop_rx.changed() => continue,
                    }
                }
            };

            let Some(result) = next else {
                break;
            };

            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) if e.is_cancelled() => Ok(()),
                Err(e) => Err(ServiceError::Internal(format!("flow task panicked: {}", e))),
            };

            if let Err(e) = outcome {
                if self.record_failure(e).await && deadline.is_none() {
                    deadline = Some(self.grace_deadline());
                }
            }
        }

        if let (Some(context), Some(id)) = (&inner.cancellation, registration) {
            context.deregister_cancellation(id);
        }

        self.cleanup_taps().await;
        self.finish(Some(CascadeStatus::Successful));
    }

    /// Clean up every tap the cascade touched, once per identifier
    async fn cleanup_taps(&self) {
        let mut seen = HashSet::new();
        for job in &self.inner.jobs {
            let flow = job.flow();
            let taps = flatten(flow.sources())
                .into_iter()
                .chain(flatten(flow.sinks()))
                .chain(flatten(flow.traps()));

            for tap in taps {
                let identifier = tap.identifier();
                if !seen.insert(identifier.clone()) {
                    continue;
                }
                if let Err(e) = tap.cleanup().await {
                    warn!(cascade = %self.inner.name, tap = %identifier, error = %e, "Tap cleanup failed");
                }
            }
        }
    }

    /// Keep the first failure; returns true if this was it
    async fn record_failure(&self, e: ServiceError) -> bool {
        let stop_others = {
            let mut state = self.inner.state();
            if state.status != CascadeStatus::Running || state.first_error.is_some() {
                None
            } else {
                state.status = CascadeStatus::Failed;
                state.first_error = Some(e.clone());
                Some(!state.stop_requested)
            }
        };

        match stop_others {
            Some(stop_others) => {
                error!(cascade = %self.inner.name, error = %e, "Cascade failed");
                self.inner
                    .event_tx
                    .send_event(CascadeEvent::error(e.to_string(), None));
                if stop_others {
                    info!(cascade = %self.inner.name, "Stopping remaining flows");
                    self.stop_jobs().await;
                }
                true
            }
            None => {
                warn!(cascade = %self.inner.name, error = %e, "Ignoring failure after the first");
                false
            }
        }
    }

    async fn stop_jobs(&self) {
        for job in self.inner.jobs.iter().rev() {
            job.stop().await;
        }
        self.inner.semaphore.close();
    }

    /// Settle the terminal state and wake every waiter.
    ///
    /// `outcome` applies only if the run is still marked running.
    fn finish(&self, outcome: Option<CascadeStatus>) {
        let (status, duration) = {
            let mut state = self.inner.state();
            if let (CascadeStatus::Running, Some(outcome)) = (state.status, outcome) {
                state.status = outcome;
            }
            state.duration = state.started.map(|started| started.elapsed());
            (state.status, state.duration)
        };

        info!(cascade = %self.inner.name, status = %status, "Cascade finished");
        self.inner.event_tx.send_event(CascadeEvent::cascade_completed(
            &self.inner.name,
            status,
            duration.unwrap_or_default(),
        ));
        self.inner.done_tx.send_replace(true);
    }

    fn grace_deadline(&self) -> tokio::time::Instant {
        tokio::time::Instant::now() + self.inner.config.shutdown_grace
    }

    fn register_cancellation(&self) -> Option<CancellationId> {
        let context = self.inner.cancellation.as_ref()?;
        let weak = Arc::downgrade(&self.inner);
        // The hook may fire on a thread outside the runtime.
        let handle = tokio::runtime::Handle::current();

        Some(context.register_cancellation(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            handle.spawn(async move { Cascade { inner }.stop().await });
        }))
    }
}

impl CascadeInner {
    fn state(&self) -> MutexGuard<'_, RunState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn job(&self, name: &str) -> Option<Arc<CascadeJob>> {
        self.jobs.iter().find(|job| job.name() == name).cloned()
    }
}

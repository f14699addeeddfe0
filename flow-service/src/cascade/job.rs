// Cascade Jobs
// One task per flow: wait on predecessors, take a slot, skip or run

use super::events::{CascadeEvent, EventSender, ProgressSender};
use super::flow::SharedFlow;
use super::skip::SkipStrategy;
use super::stats::{FlowStats, FlowStatus};
use crate::error::ServiceResult;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info};

/// What every job of one run shares
#[derive(Debug, Clone)]
pub(crate) struct JobContext {
    pub cascade: String,
    pub semaphore: Arc<Semaphore>,
    pub skip_strategy: Arc<dyn SkipStrategy>,
    pub event_tx: Option<ProgressSender>,
}

/// Scheduling state of one flow.
///
/// The latch is written once by the job and read by every dependent:
/// `Some(true)` when the flow succeeded or was skipped, `Some(false)`
/// otherwise.
#[derive(Debug)]
pub(crate) struct CascadeJob {
    flow: SharedFlow,
    stats: Mutex<FlowStats>,
    stop_requested: AtomicBool,
    latch: watch::Sender<Option<bool>>,
}

impl CascadeJob {
    pub(crate) fn new(flow: SharedFlow) -> Self {
        let (latch, _) = watch::channel(None);
        Self {
            stats: Mutex::new(FlowStats::new(flow.name())),
            flow,
            stop_requested: AtomicBool::new(false),
            latch,
        }
    }

    pub(crate) fn name(&self) -> &str {
        self.flow.name()
    }

    pub(crate) fn flow(&self) -> &SharedFlow {
        &self.flow
    }

    pub(crate) fn stats(&self) -> FlowStats {
        self.lock_stats().clone()
    }

    /// Ask the job not to start, and its flow to stop if it is running
    pub(crate) async fn stop(&self) {
        if self.stop_requested.swap(true, Ordering::SeqCst) {
            return;
        }

        let status = self.lock_stats().status;
        if status == FlowStatus::Running {
            debug!(flow = %self.name(), "Stopping running flow");
            self.flow.stop().await;
        }
    }

    /// Run the job to completion; the latch is released however this ends
    pub(crate) async fn run(
        self: Arc<Self>,
        predecessors: Vec<Arc<CascadeJob>>,
        ctx: JobContext,
    ) -> ServiceResult<()> {
        let latch = LatchGuard { job: &self };

        match self.execute(&predecessors, &ctx).await {
            Ok(successful) => {
                latch.release(successful);
                Ok(())
            }
            Err(e) => {
                latch.release(false);
                Err(e)
            }
        }
    }

    async fn execute(&self, predecessors: &[Arc<CascadeJob>], ctx: &JobContext) -> ServiceResult<bool> {
        let name = self.name();

        for predecessor in predecessors {
            let mut rx = predecessor.latch.subscribe();
            let succeeded = match rx.wait_for(|state| state.is_some()).await {
                Ok(state) => *state == Some(true),
                Err(_) => false,
            };
            if !succeeded {
                debug!(
                    flow = %name,
                    predecessor = %predecessor.name(),
                    "Predecessor did not succeed, not running"
                );
                return Ok(false);
            }
        }

        if self.is_stop_requested() {
            return Ok(false);
        }

        let _permit = match Arc::clone(&ctx.semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                debug!(flow = %name, "Cascade stopped before the flow got a slot");
                return Ok(false);
            }
        };

        if self.is_stop_requested() {
            return Ok(false);
        }

        let skip = match ctx.skip_strategy.skip_flow(self.flow.as_ref()).await {
            Ok(skip) => skip,
            Err(e) => {
                error!(cascade = %ctx.cascade, flow = %name, error = %e, "Skip check failed");
                let message = e.to_string();
                self.finish(ctx, |stats| stats.mark_failed(message));
                return Err(e);
            }
        };

        if skip {
            let reason = format!("skipped by {:?}", ctx.skip_strategy);
            info!(cascade = %ctx.cascade, flow = %name, "Skipping flow, sinks are up to date");
            self.lock_stats().mark_skipped(reason.clone());
            ctx.event_tx.send_event(CascadeEvent::flow_skipped(name, reason));
            return Ok(true);
        }

        self.lock_stats().mark_running();
        info!(cascade = %ctx.cascade, flow = %name, "Starting flow");
        ctx.event_tx.send_event(CascadeEvent::flow_started(name));

        // a stop that raced the status change above must still be seen
        if self.is_stop_requested() {
            self.finish(ctx, |stats| stats.mark_stopped());
            return Ok(false);
        }

        match self.flow.complete().await {
            Ok(()) => {
                self.finish(ctx, |stats| stats.mark_successful());
                Ok(true)
            }
            Err(_) if self.is_stop_requested() => {
                self.finish(ctx, |stats| stats.mark_stopped());
                Ok(false)
            }
            Err(e) => {
                error!(cascade = %ctx.cascade, flow = %name, error = %e, "Flow failed");
                let message = e.to_string();
                self.finish(ctx, |stats| stats.mark_failed(message));
                Err(e)
            }
        }
    }

    fn finish<F>(&self, ctx: &JobContext, mark: F)
    where
        F: FnOnce(&mut FlowStats),
    {
        let (status, duration) = {
            let mut stats = self.lock_stats();
            mark(&mut stats);
            (stats.status, stats.duration.unwrap_or_default())
        };

        info!(cascade = %ctx.cascade, flow = %self.name(), status = %status, "Flow finished");
        ctx.event_tx
            .send_event(CascadeEvent::flow_completed(self.name(), status, duration));
    }

    fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    fn lock_stats(&self) -> MutexGuard<'_, FlowStats> {
        self.stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Marks the latch unsuccessful if the job ends without releasing it
struct LatchGuard<'a> {
    job: &'a CascadeJob,
}

impl LatchGuard<'_> {
    fn release(self, successful: bool) {
        self.job.latch.send_replace(Some(successful));
    }
}

impl Drop for LatchGuard<'_> {
    fn drop(&mut self) {
        self.job.latch.send_if_modified(|state| {
            if state.is_none() {
                *state = Some(false);
                true
            } else {
                false
            }
        });
    }
}

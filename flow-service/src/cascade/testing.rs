// In-memory taps and scripted flows for scheduler tests

use super::flow::Flow;
use super::tap::{SharedTap, Tap};
use crate::error::{ServiceError, ServiceResult};

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub(crate) struct MemoryTap {
    id: String,
    modified: Option<SystemTime>,
    cleanups: Arc<AtomicUsize>,
}

impl MemoryTap {
    /// A tap that does not exist yet
    pub(crate) fn shared(id: &str) -> SharedTap {
        Self::counted(id, Arc::default())
    }

    pub(crate) fn modified(id: &str, time: SystemTime) -> SharedTap {
        Arc::new(Self {
            id: id.to_string(),
            modified: Some(time),
            cleanups: Arc::default(),
        })
    }

    /// A missing tap that bumps `cleanups` each time it is cleaned up
    pub(crate) fn counted(id: &str, cleanups: Arc<AtomicUsize>) -> SharedTap {
        Arc::new(Self {
            id: id.to_string(),
            modified: None,
            cleanups,
        })
    }
}

#[async_trait]
impl Tap for MemoryTap {
    fn identifier(&self) -> String {
        format!("mem://{}", self.id)
    }

    async fn exists(&self) -> ServiceResult<bool> {
        Ok(self.modified.is_some())
    }

    async fn modified_time(&self) -> ServiceResult<Option<SystemTime>> {
        Ok(self.modified)
    }

    async fn cleanup(&self) -> ServiceResult<()> {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Shared record of flow starts and ends across a run
#[derive(Debug, Clone, Default)]
pub(crate) struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
    running: Arc<AtomicUsize>,
    max_running: Arc<AtomicUsize>,
}

impl Journal {
    fn enter(&self, name: &str) {
        self.entries.lock().unwrap().push(format!("start:{}", name));
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self, name: &str) {
        self.running.fetch_sub(1, Ordering::SeqCst);
        self.entries.lock().unwrap().push(format!("end:{}", name));
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub(crate) fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }

    pub(crate) fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
enum Outcome {
    Succeed,
    Fail(String),
    WaitForStop,
}

/// Flow whose run is scripted by the test
#[derive(Debug)]
pub(crate) struct ProbeFlow {
    name: String,
    sources: Vec<SharedTap>,
    sinks: Vec<SharedTap>,
    local: bool,
    outcome: Outcome,
    delay: Duration,
    journal: Journal,
    runs: Arc<AtomicUsize>,
    started: Arc<AtomicBool>,
    stop_tx: watch::Sender<bool>,
}

impl ProbeFlow {
    pub(crate) fn new(name: &str) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            name: name.to_string(),
            sources: Vec::new(),
            sinks: Vec::new(),
            local: false,
            outcome: Outcome::Succeed,
            delay: Duration::from_millis(10),
            journal: Journal::default(),
            runs: Arc::new(AtomicUsize::new(0)),
            started: Arc::new(AtomicBool::new(false)),
            stop_tx,
        }
    }

    pub(crate) fn reads(mut self, tap: SharedTap) -> Self {
        self.sources.push(tap);
        self
    }

    pub(crate) fn writes(mut self, tap: SharedTap) -> Self {
        self.sinks.push(tap);
        self
    }

    pub(crate) fn local(mut self) -> Self {
        self.local = true;
        self
    }

    pub(crate) fn failing(mut self, message: &str) -> Self {
        self.outcome = Outcome::Fail(message.to_string());
        self
    }

    pub(crate) fn until_stopped(mut self) -> Self {
        self.outcome = Outcome::WaitForStop;
        self
    }

    pub(crate) fn taking(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn journal(mut self, journal: &Journal) -> Self {
        self.journal = journal.clone();
        self
    }

    /// Counter of `complete` calls, shared with the flow
    pub(crate) fn runs(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.runs)
    }

    /// Set once `complete` has been entered
    pub(crate) fn started(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.started)
    }
}

#[async_trait]
impl Flow for ProbeFlow {
    fn name(&self) -> &str {
        &self.name
    }

    fn sources(&self) -> &[SharedTap] {
        &self.sources
    }

    fn sinks(&self) -> &[SharedTap] {
        &self.sinks
    }

    fn is_local(&self) -> bool {
        self.local
    }

    async fn complete(&self) -> ServiceResult<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.journal.enter(&self.name);
        self.started.store(true, Ordering::SeqCst);

        let mut stop_rx = self.stop_tx.subscribe();
        let result = match &self.outcome {
            Outcome::Succeed => {
                tokio::select! {
                    _ = tokio::time::sleep(self.delay) => Ok(()),
                    _ = stop_rx.wait_for(|stopped| *stopped) => {
                        Err(ServiceError::FlowStopped(self.name.clone()))
                    }
                }
            }
            Outcome::Fail(message) => {
                tokio::time::sleep(self.delay).await;
                Err(ServiceError::flow_failed(&self.name, message.clone()))
            }
            Outcome::WaitForStop => {
                let _ = stop_rx.wait_for(|stopped| *stopped).await;
                Err(ServiceError::FlowStopped(self.name.clone()))
            }
        };

        self.journal.exit(&self.name);
        result
    }

    async fn stop(&self) {
        self.stop_tx.send_replace(true);
    }
}

// Cascade Statistics
// Per-flow and per-cascade status, timing and failure messages

use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

/// Status of one flow within a cascade run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowStatus {
    Pending,
    Skipped,
    Running,
    Successful,
    Failed,
    Stopped,
}

impl FlowStatus {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            Self::Skipped | Self::Successful | Self::Failed | Self::Stopped
        )
    }

    /// Satisfies dependents
    pub fn is_successful(&self) -> bool {
        matches!(self, Self::Skipped | Self::Successful)
    }
}

impl fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Pending => "pending",
            Self::Skipped => "skipped",
            Self::Running => "running",
            Self::Successful => "successful",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        };
        f.write_str(text)
    }
}

/// Scheduler state; terminal states never change again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CascadeStatus {
    Pending,
    Running,
    Successful,
    Failed,
    Stopped,
}

impl CascadeStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Successful | Self::Failed | Self::Stopped)
    }
}

impl fmt::Display for CascadeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Successful => "successful",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowStats {
    pub name: String,
    pub status: FlowStatus,
    #[serde(skip)]
    started: Option<Instant>,
    pub duration: Option<Duration>,
    pub message: Option<String>,
}

impl FlowStats {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: FlowStatus::Pending,
            started: None,
            duration: None,
            message: None,
        }
    }

    pub(crate) fn mark_running(&mut self) {
        if self.status == FlowStatus::Pending {
            self.status = FlowStatus::Running;
            self.started = Some(Instant::now());
        }
    }

    pub(crate) fn mark_skipped(&mut self, reason: impl Into<String>) {
        self.finish(FlowStatus::Skipped, Some(reason.into()));
    }

    pub(crate) fn mark_successful(&mut self) {
        self.finish(FlowStatus::Successful, None);
    }

    pub(crate) fn mark_failed(&mut self, message: impl Into<String>) {
        self.finish(FlowStatus::Failed, Some(message.into()));
    }

    pub(crate) fn mark_stopped(&mut self) {
        self.finish(FlowStatus::Stopped, None);
    }

    /// Record a terminal status once; later calls are ignored
    fn finish(&mut self, status: FlowStatus, message: Option<String>) {
        if self.status.is_finished() {
            return;
        }
        self.status = status;
        self.message = message;
        self.duration = self.started.map(|started| started.elapsed());
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CascadeStats {
    pub name: String,
    pub status: CascadeStatus,
    pub duration: Option<Duration>,
    pub flows: Vec<FlowStats>,
}

impl CascadeStats {
    pub fn count(&self, status: FlowStatus) -> usize {
        self.flows.iter().filter(|flow| flow.status == status).count()
    }

    pub fn flow(&self, name: &str) -> Option<&FlowStats> {
        self.flows.iter().find(|flow| flow.name == name)
    }
}

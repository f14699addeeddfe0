// Cascade Events
// Progress reporting and event types for cascade runs

use super::stats::{CascadeStatus, FlowStatus};

use std::time::Duration;
use tokio::sync::mpsc;

/// Sender for cascade progress events
pub type ProgressSender = mpsc::UnboundedSender<CascadeEvent>;

/// Receiver for cascade progress events
pub type ProgressReceiver = mpsc::UnboundedReceiver<CascadeEvent>;

/// Create a new progress channel
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Events emitted during a cascade run
#[derive(Debug, Clone)]
pub enum CascadeEvent {
    /// Cascade run started
    CascadeStarted {
        cascade_name: String,
        total_flows: usize,
        width: usize,
    },

    /// Cascade reached a terminal state
    CascadeCompleted {
        cascade_name: String,
        status: CascadeStatus,
        duration: Duration,
    },

    /// Flow started running
    FlowStarted { flow_name: String },

    /// Flow finished running
    FlowCompleted {
        flow_name: String,
        status: FlowStatus,
        duration: Duration,
    },

    /// Flow was not run because its outputs are up to date
    FlowSkipped { flow_name: String, reason: String },

    /// Flow output line (stdout/stderr)
    FlowOutput {
        flow_name: String,
        output: String,
        is_error: bool,
    },

    /// Log message (info, warning, error)
    Log {
        level: LogLevel,
        message: String,
        flow_name: Option<String>,
    },
}

/// Log level for log events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl CascadeEvent {
    pub fn cascade_started(name: impl Into<String>, total_flows: usize, width: usize) -> Self {
        Self::CascadeStarted {
            cascade_name: name.into(),
            total_flows,
            width,
        }
    }

    pub fn cascade_completed(
        name: impl Into<String>,
        status: CascadeStatus,
        duration: Duration,
    ) -> Self {
        Self::CascadeCompleted {
            cascade_name: name.into(),
            status,
            duration,
        }
    }

    pub fn flow_started(name: impl Into<String>) -> Self {
        Self::FlowStarted {
            flow_name: name.into(),
        }
    }

    pub fn flow_completed(name: impl Into<String>, status: FlowStatus, duration: Duration) -> Self {
        Self::FlowCompleted {
            flow_name: name.into(),
            status,
            duration,
        }
    }

    pub fn flow_skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FlowSkipped {
            flow_name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn flow_output(name: impl Into<String>, output: impl Into<String>, is_error: bool) -> Self {
        Self::FlowOutput {
            flow_name: name.into(),
            output: output.into(),
            is_error,
        }
    }

    /// Create a warning log event
    pub fn warning(message: impl Into<String>, flow_name: Option<String>) -> Self {
        Self::Log {
            level: LogLevel::Warning,
            message: message.into(),
            flow_name,
        }
    }

    /// Create an error log event
    pub fn error(message: impl Into<String>, flow_name: Option<String>) -> Self {
        Self::Log {
            level: LogLevel::Error,
            message: message.into(),
            flow_name,
        }
    }
}

/// Helper trait for sending events, ignoring errors (fire-and-forget)
pub trait EventSender {
    fn send_event(&self, event: CascadeEvent);
}

impl EventSender for ProgressSender {
    fn send_event(&self, event: CascadeEvent) {
        let _ = self.send(event);
    }
}

impl EventSender for Option<ProgressSender> {
    fn send_event(&self, event: CascadeEvent) {
        if let Some(sender) = self {
            let _ = sender.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_progress_channel() {
        let (tx, mut rx) = progress_channel();

        tx.send_event(CascadeEvent::cascade_started("nightly", 3, 2));
        tx.send_event(CascadeEvent::flow_started("import"));

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, CascadeEvent::CascadeStarted { width: 2, .. }));

        let second = rx.recv().await.unwrap();
        assert!(matches!(second, CascadeEvent::FlowStarted { .. }));
    }

    #[test]
    fn test_event_construction() {
        let event =
            CascadeEvent::flow_completed("import", FlowStatus::Successful, Duration::from_secs(30));

        if let CascadeEvent::FlowCompleted {
            flow_name,
            status,
            duration,
        } = event
        {
            assert_eq!(flow_name, "import");
            assert_eq!(status, FlowStatus::Successful);
            assert_eq!(duration, Duration::from_secs(30));
        } else {
            panic!("wrong event type");
        }
    }

    #[test]
    fn test_optional_sender() {
        let sender: Option<ProgressSender> = None;
        sender.send_event(CascadeEvent::warning("test", None));
    }
}

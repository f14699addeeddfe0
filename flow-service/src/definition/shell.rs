// Shell Flow
// A flow whose run is one shell command over file taps

use crate::cascade::{CascadeEvent, EventSender, Flow, ProgressSender, SharedTap};
use crate::error::{ServiceError, ServiceResult};

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Runs `sh -c <command>` (`cmd /C` on Windows) as a local flow.
///
/// Output lines are forwarded as [`CascadeEvent::FlowOutput`] events. A
/// non-zero exit fails the flow with the last line written to stderr.
#[derive(Debug)]
pub struct ShellFlow {
    name: String,
    command: String,
    working_dir: Option<PathBuf>,
    env: HashMap<String, String>,
    sources: Vec<SharedTap>,
    sinks: Vec<SharedTap>,
    event_tx: Option<ProgressSender>,
    stop_tx: watch::Sender<bool>,
}

impl ShellFlow {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            name: name.into(),
            command: command.into(),
            working_dir: None,
            env: HashMap::new(),
            sources: Vec::new(),
            sinks: Vec::new(),
            event_tx: None,
            stop_tx,
        }
    }

    pub fn with_sources(mut self, sources: Vec<SharedTap>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_sinks(mut self, sinks: Vec<SharedTap>) -> Self {
        self.sinks = sinks;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn shell() -> (&'static str, &'static [&'static str]) {
        if cfg!(target_os = "windows") {
            ("cmd", &["/C"])
        } else {
            ("sh", &["-c"])
        }
    }

    /// Forward each line of `reader` as output; returns the last line
    fn stream_lines<R>(&self, reader: R, is_error: bool) -> JoinHandle<Option<String>>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let name = self.name.clone();
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            let mut last = None;
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(flow = %name, stderr = is_error, "{}", line);
                event_tx.send_event(CascadeEvent::flow_output(&name, line.as_str(), is_error));
                last = Some(line);
            }
            last
        })
    }

    fn failure(&self, status: ExitStatus, last_error: Option<String>) -> ServiceError {
        let code = status
            .code()
            .map(|code| code.to_string())
            .unwrap_or_else(|| "signal".to_string());

        let message = match last_error {
            Some(line) => format!("command exited with {}: {}", code, line),
            None => format!("command exited with {}", code),
        };
        ServiceError::flow_failed(&self.name, message)
    }
}

#[async_trait]
impl Flow for ShellFlow {
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
        true
    }

    async fn complete(&self) -> ServiceResult<()> {
        let mut stop_rx = self.stop_tx.subscribe();
        if *stop_rx.borrow_and_update() {
            return Err(ServiceError::FlowStopped(self.name.clone()));
        }

        let (shell, args) = Self::shell();
        let mut cmd = Command::new(shell);
        cmd.args(args)
            .arg(&self.command)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            ServiceError::flow_failed(
                &self.name,
                format!("failed to spawn shell process '{}': {}", shell, e),
            )
        })?;

        let stdout = child
            .stdout
            .take()
            .map(|stdout| self.stream_lines(stdout, false));
        let stderr = child
            .stderr
            .take()
            .map(|stderr| self.stream_lines(stderr, true));

        let exited = tokio::select! {
            status = child.wait() => Some(status?),
            _ = stop_rx.wait_for(|stopped| *stopped) => None,
        };

        let Some(status) = exited else {
            if let Err(e) = child.kill().await {
                warn!(flow = %self.name, error = %e, "Failed to kill shell process");
            }
            return Err(ServiceError::FlowStopped(self.name.clone()));
        };

        if let Some(handle) = stdout {
            let _ = handle.await;
        }
        let last_error = match stderr {
            Some(handle) => handle.await.unwrap_or_default(),
            None => None,
        };

        if status.success() {
            Ok(())
        } else {
            Err(self.failure(status, last_error))
        }
    }

    async fn stop(&self) {
        self.stop_tx.send_replace(true);
    }
}

// Cascade definitions
// Turns a parsed definition into shell flows over file taps and a connected cascade

use super::models::{CascadeDefinition, FlowDefinition, SkipMode, TapDefinition};
use super::shell::ShellFlow;
use crate::cascade::{
    CancellationContext, Cascade, CascadeConnector, FileTap, MultiSourceTap, NeverSkip,
    ProgressSender, SharedFlow, SharedTap, SkipIfSinkExists, SkipIfSinkNotStale, SkipStrategy,
};
use crate::error::ServiceResult;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

impl SkipMode {
    pub fn strategy(&self) -> Arc<dyn SkipStrategy> {
        match self {
            SkipMode::SinkNotStale => Arc::new(SkipIfSinkNotStale),
            SkipMode::SinkExists => Arc::new(SkipIfSinkExists),
            SkipMode::Never => Arc::new(NeverSkip),
        }
    }
}

impl CascadeDefinition {
    /// Resolve `path` against the definition's directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Materialize every flow; output lines go to `event_tx`
    pub fn flows(&self, event_tx: Option<ProgressSender>) -> Vec<SharedFlow> {
        self.flows
            .iter()
            .map(|flow| Arc::new(self.shell_flow(flow, event_tx.clone())) as SharedFlow)
            .collect()
    }

    /// A connector carrying this definition's config and skip mode
    pub fn connector(&self) -> CascadeConnector {
        CascadeConnector::new()
            .with_config(self.config.clone())
            .with_skip_strategy(self.skip.strategy())
    }

    /// Build the flows and connect them into a cascade
    pub fn connect(
        &self,
        event_tx: Option<ProgressSender>,
        cancellation: Option<CancellationContext>,
    ) -> ServiceResult<Cascade> {
        let mut connector = self.connector();
        if let Some(tx) = &event_tx {
            connector = connector.with_progress(tx.clone());
        }
        if let Some(context) = cancellation {
            connector = connector.with_cancellation(context);
        }

        connector.connect(self.name.clone(), self.flows(event_tx))
    }

    fn shell_flow(&self, flow: &FlowDefinition, event_tx: Option<ProgressSender>) -> ShellFlow {
        let mut env = self.env.clone();
        env.extend(flow.env.clone());

        let working_dir = match &flow.working_dir {
            Some(dir) => Some(self.resolve(dir)),
            None => self.base_dir.clone(),
        };

        let mut shell = ShellFlow::new(&flow.name, &flow.command)
            .with_sources(self.taps(&flow.sources))
            .with_sinks(self.taps(&flow.sinks))
            .with_env(env);
        if let Some(dir) = working_dir {
            shell = shell.with_working_dir(dir);
        }
        if let Some(tx) = event_tx {
            shell = shell.with_progress(tx);
        }

        debug!(flow = %flow.name, command = %flow.command, "Defined shell flow");
        shell
    }

    fn taps(&self, taps: &[TapDefinition]) -> Vec<SharedTap> {
        taps.iter()
            .map(|tap| match tap {
                TapDefinition::Path(path) => Arc::new(FileTap::new(self.resolve(path))) as SharedTap,
                TapDefinition::Multi { multi } => Arc::new(MultiSourceTap::new(
                    multi
                        .iter()
                        .map(|path| Arc::new(FileTap::new(self.resolve(path))) as SharedTap)
                        .collect(),
                )) as SharedTap,
            })
            .collect()
    }
}

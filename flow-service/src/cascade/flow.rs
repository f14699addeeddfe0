// Flows
// Runnable pipelines as seen by the cascade

use super::tap::{sinks_stale, SharedTap};
use crate::error::ServiceResult;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

pub type SharedFlow = Arc<dyn Flow>;

/// A compiled, runnable pipeline with declared source and sink taps.
///
/// `complete` runs the pipeline to the end. `stop` may be called at any
/// time, from another task, and asks a running `complete` to return early.
#[async_trait]
pub trait Flow: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn sources(&self) -> &[SharedTap];

    fn sinks(&self) -> &[SharedTap];

    fn traps(&self) -> &[SharedTap] {
        &[]
    }

    /// Runs on this machine rather than on a cluster
    fn is_local(&self) -> bool {
        false
    }

    async fn are_sinks_stale(&self) -> ServiceResult<bool> {
        sinks_stale(self.sources(), self.sinks()).await
    }

    async fn complete(&self) -> ServiceResult<()>;

    async fn stop(&self);
}

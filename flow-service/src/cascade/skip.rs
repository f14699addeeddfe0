// Skip Strategies
// Decide whether a flow's outputs are already up to date

use super::flow::Flow;
use super::tap::flatten;
use crate::error::ServiceResult;

use async_trait::async_trait;
use std::fmt;

#[async_trait]
pub trait SkipStrategy: fmt::Debug + Send + Sync {
    /// True when `flow` does not need to run
    async fn skip_flow(&self, flow: &dyn Flow) -> ServiceResult<bool>;
}

/// Skip when the flow's sinks are newer than its sources
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipIfSinkNotStale;

#[async_trait]
impl SkipStrategy for SkipIfSinkNotStale {
    async fn skip_flow(&self, flow: &dyn Flow) -> ServiceResult<bool> {
        Ok(!flow.are_sinks_stale().await?)
    }
}

/// Skip when every sink already exists, whatever its age
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipIfSinkExists;

#[async_trait]
impl SkipStrategy for SkipIfSinkExists {
    async fn skip_flow(&self, flow: &dyn Flow) -> ServiceResult<bool> {
        let sinks = flatten(flow.sinks());
        if sinks.is_empty() {
            return Ok(false);
        }

        for sink in sinks {
            if !sink.exists().await? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Always run
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverSkip;

#[async_trait]
impl SkipStrategy for NeverSkip {
    async fn skip_flow(&self, _flow: &dyn Flow) -> ServiceResult<bool> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::testing::{MemoryTap, ProbeFlow};

    use std::time::{Duration, SystemTime};

    #[tokio::test]
    async fn test_not_stale_strategy() {
        let now = SystemTime::now();
        let fresh = ProbeFlow::new("fresh")
            .reads(MemoryTap::modified("in", now - Duration::from_secs(5)))
            .writes(MemoryTap::modified("out", now));
        let stale = ProbeFlow::new("stale")
            .reads(MemoryTap::modified("in", now))
            .writes(MemoryTap::modified("out", now - Duration::from_secs(5)));

        assert!(SkipIfSinkNotStale.skip_flow(&fresh).await.unwrap());
        assert!(!SkipIfSinkNotStale.skip_flow(&stale).await.unwrap());
    }

    #[tokio::test]
    async fn test_sink_exists_strategy() {
        let now = SystemTime::now();
        let existing = ProbeFlow::new("existing")
            .reads(MemoryTap::modified("in", now))
            .writes(MemoryTap::modified("out", now - Duration::from_secs(5)));
        let missing = ProbeFlow::new("missing")
            .reads(MemoryTap::modified("in", now))
            .writes(MemoryTap::shared("out"));
        let no_sinks = ProbeFlow::new("no-sinks").reads(MemoryTap::shared("in"));

        assert!(SkipIfSinkExists.skip_flow(&existing).await.unwrap());
        assert!(!SkipIfSinkExists.skip_flow(&missing).await.unwrap());
        assert!(!SkipIfSinkExists.skip_flow(&no_sinks).await.unwrap());
    }

    #[tokio::test]
    async fn test_never_skip() {
        let now = SystemTime::now();
        let fresh = ProbeFlow::new("fresh")
            .reads(MemoryTap::modified("in", now - Duration::from_secs(5)))
            .writes(MemoryTap::modified("out", now));

        assert!(!NeverSkip.skip_flow(&fresh).await.unwrap());
    }
}

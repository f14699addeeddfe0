// Cascade Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Grace period for draining running flows after a failure or stop
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5 * 60);

/// Configuration for a cascade run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeConfig {
    /// Maximum flows running at once (None or 0 = one slot per flow)
    pub max_concurrent_flows: Option<usize>,
    #[serde(rename = "shutdown_grace_secs", with = "secs")]
    pub shutdown_grace: Duration,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            max_concurrent_flows: None,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl CascadeConfig {
    pub fn with_max_concurrent_flows(mut self, max: usize) -> Self {
        self.max_concurrent_flows = Some(max);
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Number of flows allowed to run at once.
    ///
    /// More than one local flow forces a width of one.
    pub fn concurrency_width(&self, flow_count: usize, local_count: usize) -> usize {
        if local_count > 1 {
            return 1;
        }

        match self.max_concurrent_flows {
            Some(max) if max > 0 => max,
            _ => flow_count.max(1),
        }
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

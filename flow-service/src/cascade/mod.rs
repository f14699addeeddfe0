// Cascade Module
// Dependency-aware scheduling of whole flows connected through the taps they share

pub mod cancel;
pub mod config;
pub mod connector;
pub mod events;
pub mod flow;
pub mod scheduler;
pub mod skip;
pub mod stats;
pub mod tap;

pub(crate) mod job;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types
pub use cancel::{CancellationContext, CancellationId};
pub use config::{CascadeConfig, DEFAULT_SHUTDOWN_GRACE};
pub use connector::{CascadeConnector, CascadeGraph, ResourceUse};
pub use events::{progress_channel, CascadeEvent, EventSender, LogLevel, ProgressReceiver, ProgressSender};
pub use flow::{Flow, SharedFlow};
pub use scheduler::Cascade;
pub use skip::{NeverSkip, SkipIfSinkExists, SkipIfSinkNotStale, SkipStrategy};
pub use stats::{CascadeStats, CascadeStatus, FlowStats, FlowStatus};
pub use tap::{flatten, identifiers, sinks_stale, FileTap, MultiSourceTap, SharedTap, Tap};

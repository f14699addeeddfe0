use crate::cascade::CascadeConfig;
use crate::element::{Annotations, ElementId, FlowElement};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// A cascade of shell-backed flows over local files.
///
/// ```yaml
/// name: nightly
/// config:
///   max_concurrent_flows: 2
/// flows:
///   - name: clean
///     command: tr a-z A-Z < raw.txt > clean.txt
///     sources: [raw.txt]
///     sinks: [clean.txt]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeDefinition {
    pub name: String,

    #[serde(default)]
    pub config: CascadeConfig,

    /// When a flow may be skipped
    #[serde(default)]
    pub skip: SkipMode,

    /// Environment shared by every flow
    #[serde(default)]
    pub env: HashMap<String, String>,

    #[serde(default)]
    pub flows: Vec<FlowDefinition>,

    /// Directory relative paths are resolved against; set by `from_file`
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipMode {
    /// Skip when every sink is newer than every source
    #[default]
    SinkNotStale,
    /// Skip when every sink exists
    SinkExists,
    Never,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowDefinition {
    pub name: String,

    /// Run with `sh -c`
    pub command: String,

    #[serde(default)]
    pub sources: Vec<TapDefinition>,

    #[serde(default)]
    pub sinks: Vec<TapDefinition>,

    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Flow environment, overriding the cascade's
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// A file path, or several read together as one source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TapDefinition {
    Path(PathBuf),
    Multi { multi: Vec<PathBuf> },
}

/// An assembly already partitioned into steps, and optionally nodes.
///
/// Paths are chains of element ids; `head` and `tail` name the sentinels.
///
/// ```yaml
/// name: wordcount
/// elements:
///   - { id: lines, name: lines, kind: tap }
///   - { id: split, name: "Each(split)" }
///   - { id: tmp, name: tmp, kind: boundary }
///   - { id: count, name: "GroupBy(word)", kind: group }
///   - { id: counts, name: counts, kind: tap }
/// steps:
///   - paths: [[head, lines, split, tmp]]
///   - paths: [[tmp, count, counts, tail]]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanDefinition {
    pub name: String,

    pub elements: Vec<FlowElement>,

    pub steps: Vec<StepDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    pub paths: Vec<Vec<ElementId>>,

    /// Node partition of this step; empty means one node for the whole step
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub paths: Vec<Vec<ElementId>>,

    /// Named element sets carried up to the owning step
    #[serde(default)]
    pub annotations: Annotations,
}

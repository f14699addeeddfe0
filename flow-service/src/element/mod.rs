// Element Graph Module
// Planner-facing contract: flow elements, element graphs and annotated sub-graph views

pub mod graph;
pub mod sub_graph;

pub use graph::{ElementGraph, ElementGraphId, Scope};
pub use sub_graph::ElementSubGraph;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Annotation name to the elements carrying it
pub type Annotations = BTreeMap<String, BTreeSet<ElementId>>;

const HEAD_ID: &str = "__head";
const TAIL_ID: &str = "__tail";

/// Stable identity of a flow element, shared by every sub-graph containing it
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn head() -> Self {
        Self(HEAD_ID.to_string())
    }

    pub fn tail() -> Self {
        Self(TAIL_ID.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_sentinel(&self) -> bool {
        self.0 == HEAD_ID || self.0 == TAIL_ID
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ElementId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// What role an element plays in the assembly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// Universal entry sentinel
    Head,
    /// Universal exit sentinel
    Tail,
    /// Source or sink resource
    Tap,
    /// Error-channel resource
    Trap,
    /// Per-record operator
    #[default]
    Operation,
    /// Grouping operator (group-by, co-group, join)
    Group,
    /// Hand-off point between two processes
    Boundary,
}

/// A vertex of an element graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowElement {
    pub id: ElementId,
    pub name: String,
    #[serde(default)]
    pub kind: ElementKind,
}

impl FlowElement {
    pub fn new(id: impl Into<ElementId>, name: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
        }
    }

    pub fn head() -> Self {
        Self::new(ElementId::head(), "head", ElementKind::Head)
    }

    pub fn tail() -> Self {
        Self::new(ElementId::tail(), "tail", ElementKind::Tail)
    }

    pub fn tap(id: impl Into<ElementId>, name: impl Into<String>) -> Self {
        Self::new(id, name, ElementKind::Tap)
    }

    pub fn operation(id: impl Into<ElementId>, name: impl Into<String>) -> Self {
        Self::new(id, name, ElementKind::Operation)
    }

    pub fn group(id: impl Into<ElementId>, name: impl Into<String>) -> Self {
        Self::new(id, name, ElementKind::Group)
    }

    pub fn boundary(id: impl Into<ElementId>, name: impl Into<String>) -> Self {
        Self::new(id, name, ElementKind::Boundary)
    }

    pub fn trap(id: impl Into<ElementId>, name: impl Into<String>) -> Self {
        Self::new(id, name, ElementKind::Trap)
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self.kind, ElementKind::Head | ElementKind::Tail)
    }
}

/// Union of two annotation maps
pub fn merge_annotations(target: &mut Annotations, other: &Annotations) {
    for (name, elements) in other {
        target
            .entry(name.clone())
            .or_default()
            .extend(elements.iter().cloned());
    }
}

// Process Module
// Units of work decomposed from an element graph: nodes, steps and the graphs joining them

pub mod edge;
pub mod factory;
pub mod graph;
pub mod node;
pub mod step;

mod dot;

pub use edge::ProcessEdge;
pub use factory::{DefaultProcessFactory, ProcessFactory};
pub use graph::ProcessGraph;
pub use node::{FlowNode, NodeGraph};
pub use step::{FlowStep, StepGraph};

use crate::element::{Annotations, ElementId, ElementSubGraph};
use crate::error::{ServiceError, ServiceResult};

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Submit priority given to processes nobody prioritised
pub const DEFAULT_SUBMIT_PRIORITY: i32 = 5;

/// Globally unique process identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(Uuid);

impl ProcessId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProcessId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State shared by every process granularity
#[derive(Debug, Clone)]
pub struct ProcessBase {
    id: ProcessId,
    name: String,
    ordinal: usize,
    submit_priority: i32,
    assigned: bool,
    element_graph: ElementSubGraph,
    source_elements: BTreeSet<ElementId>,
    sink_elements: BTreeSet<ElementId>,
    trap_elements: BTreeSet<ElementId>,
}

impl ProcessBase {
    pub fn new(element_graph: ElementSubGraph) -> Self {
        Self {
            id: ProcessId::new(),
            name: String::new(),
            ordinal: 0,
            submit_priority: DEFAULT_SUBMIT_PRIORITY,
            assigned: false,
            source_elements: element_graph.source_elements(),
            sink_elements: element_graph.sink_elements(),
            trap_elements: element_graph.trap_elements(),
            element_graph,
        }
    }

    pub fn with_submit_priority(mut self, priority: i32) -> Self {
        self.submit_priority = priority;
        self
    }
}

/// A schedulable unit of work owning a sub-graph of elements.
///
/// Ordinal and name are assigned once, by the graph builder, after every
/// process of the level exists.
pub trait Process: fmt::Debug + Send + Sync {
    fn base(&self) -> &ProcessBase;

    fn base_mut(&mut self) -> &mut ProcessBase;

    fn id(&self) -> ProcessId {
        self.base().id
    }

    fn name(&self) -> &str {
        &self.base().name
    }

    fn ordinal(&self) -> usize {
        self.base().ordinal
    }

    fn submit_priority(&self) -> i32 {
        self.base().submit_priority
    }

    fn element_graph(&self) -> &ElementSubGraph {
        &self.base().element_graph
    }

    fn source_elements(&self) -> &BTreeSet<ElementId> {
        &self.base().source_elements
    }

    fn sink_elements(&self) -> &BTreeSet<ElementId> {
        &self.base().sink_elements
    }

    fn trap_elements(&self) -> &BTreeSet<ElementId> {
        &self.base().trap_elements
    }

    fn annotations(&self) -> Option<&Annotations> {
        self.element_graph().annotations()
    }

    /// Set ordinal and name; a second call is an error
    fn assign_identity(&mut self, ordinal: usize, name: String) -> ServiceResult<()> {
        let base = self.base_mut();
        if base.assigned {
            return Err(ServiceError::AlreadyAssigned {
                process: base.id.to_string(),
                what: "ordinal and name",
            });
        }

        base.ordinal = ordinal;
        base.name = name;
        base.assigned = true;
        Ok(())
    }
}

/// Lower submit priority first
pub fn by_submit_priority<P: Process>(lhs: &P, rhs: &P) -> Ordering {
    lhs.submit_priority().cmp(&rhs.submit_priority())
}

/// Ascending ordinal, replays an order already assigned
pub fn by_ordinal<P: Process>(lhs: &P, rhs: &P) -> Ordering {
    lhs.ordinal().cmp(&rhs.ordinal())
}

/// Larger element graph first, then more source elements first
pub fn by_node_size<P: Process>(lhs: &P, rhs: &P) -> Ordering {
    rhs.element_graph()
        .element_count()
        .cmp(&lhs.element_graph().element_count())
        .then_with(|| {
            rhs.source_elements()
                .len()
                .cmp(&lhs.source_elements().len())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ElementGraph, FlowElement};

    fn node(elements: &[&str]) -> FlowNode {
        let mut graph = ElementGraph::new();
        graph
            .add_path(
                elements
                    .iter()
                    .map(|id| FlowElement::operation(*id, *id))
                    .collect(),
            )
            .unwrap();
        FlowNode::new(ElementSubGraph::new(graph))
    }

    #[test]
    fn test_assign_identity_once() {
        let mut process = node(&["a", "b"]);

        process.assign_identity(3, "(4/4)".to_string()).unwrap();
        assert_eq!(process.ordinal(), 3);
        assert_eq!(process.name(), "(4/4)");

        let err = process.assign_identity(0, "again".to_string()).unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyAssigned { .. }));
        assert_eq!(process.ordinal(), 3);
    }

    #[test]
    fn test_base_computes_boundaries() {
        let process = node(&["a", "b", "c"]);

        assert_eq!(
            process.source_elements(),
            &BTreeSet::from([ElementId::new("a")])
        );
        assert_eq!(process.sink_elements(), &BTreeSet::from([ElementId::new("c")]));
        assert!(process.trap_elements().is_empty());
        assert_eq!(process.submit_priority(), DEFAULT_SUBMIT_PRIORITY);
    }

    #[test]
    fn test_node_size_comparator() {
        let small = node(&["a", "b"]);
        let large = node(&["c", "d", "e"]);

        assert_eq!(by_node_size(&large, &small), Ordering::Less);
        assert_eq!(by_node_size(&small, &large), Ordering::Greater);
    }

    #[test]
    fn test_node_size_comparator_breaks_on_sources() {
        let mut wide = ElementGraph::new();
        wide.add_element(FlowElement::tap("x", "x"));
        wide.add_element(FlowElement::tap("y", "y"));
        wide.add_element(FlowElement::group("j", "CoGroup"));
        wide.add_scope(&ElementId::new("x"), &ElementId::new("j"), 0)
            .unwrap();
        wide.add_scope(&ElementId::new("y"), &ElementId::new("j"), 1)
            .unwrap();
        let wide = FlowNode::new(ElementSubGraph::new(wide));
        let narrow = node(&["a", "b", "c"]);

        assert_eq!(by_node_size(&wide, &narrow), Ordering::Less);
    }
}

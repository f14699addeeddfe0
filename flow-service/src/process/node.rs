// Flow Nodes
// Finest-grained processes, one physical worker task each

use super::graph::ensure_within;
use super::{by_node_size, Process, ProcessBase, ProcessFactory, ProcessGraph};
use crate::element::{ElementGraph, ElementSubGraph};
use crate::error::ServiceResult;

use std::ops::Deref;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FlowNode {
    base: ProcessBase,
}

impl FlowNode {
    pub fn new(sub_graph: ElementSubGraph) -> Self {
        Self {
            base: ProcessBase::new(sub_graph),
        }
    }

    pub fn with_submit_priority(mut self, priority: i32) -> Self {
        self.base = self.base.with_submit_priority(priority);
        self
    }
}

impl Process for FlowNode {
    fn base(&self) -> &ProcessBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ProcessBase {
        &mut self.base
    }
}

/// The nodes of one step and the elements passed between them
#[derive(Debug)]
pub struct NodeGraph {
    graph: ProcessGraph<FlowNode>,
}

impl NodeGraph {
    /// Build the graph from disjoint node sub-graphs of `parent`.
    ///
    /// Ties between ready nodes go to the larger node first.
    pub fn build<F>(
        factory: &F,
        parent: &ElementGraph,
        sub_graphs: Vec<ElementSubGraph>,
    ) -> ServiceResult<Self>
    where
        F: ProcessFactory + ?Sized,
    {
        ensure_within(parent, &sub_graphs)?;

        let mut graph = ProcessGraph::new();
        for sub_graph in sub_graphs {
            graph.add_process(factory.create_node(parent, sub_graph)?)?;
        }

        graph.bind_edges()?;
        graph.assign_identities(by_node_size, |node, count, ordinal| {
            factory.node_name(node, count, ordinal)
        })?;

        debug!(
            nodes = graph.len(),
            edges = graph.edge_count(),
            "Built node graph"
        );

        Ok(Self { graph })
    }

    pub fn graph(&self) -> &ProcessGraph<FlowNode> {
        &self.graph
    }
}

impl Deref for NodeGraph {
    type Target = ProcessGraph<FlowNode>;

    fn deref(&self) -> &Self::Target {
        &self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Annotations, ElementId, FlowElement};
    use crate::error::ServiceError;
    use crate::process::DefaultProcessFactory;

    fn parent() -> ElementGraph {
        let mut graph = ElementGraph::new();
        graph
            .add_path(vec![
                FlowElement::head(),
                FlowElement::tap("in", "lines"),
                FlowElement::operation("split", "Split"),
                FlowElement::group("count", "GroupBy(word)"),
                FlowElement::tap("out", "counts"),
                FlowElement::tail(),
            ])
            .unwrap();
        graph
    }

    fn fragment(elements: Vec<FlowElement>) -> ElementSubGraph {
        let mut graph = ElementGraph::new();
        graph.add_path(elements).unwrap();
        ElementSubGraph::new(graph)
    }

    #[test]
    fn test_build_names_and_orders_nodes() {
        let map = fragment(vec![
            FlowElement::head(),
            FlowElement::tap("in", "lines"),
            FlowElement::operation("split", "Split"),
        ]);
        let reduce = fragment(vec![
            FlowElement::operation("split", "Split"),
            FlowElement::group("count", "GroupBy(word)"),
            FlowElement::tap("out", "counts"),
            FlowElement::tail(),
        ]);

        let graph = NodeGraph::build(&DefaultProcessFactory, &parent(), vec![reduce, map]).unwrap();

        let names: Vec<&str> = graph.ordered_processes().iter().map(|n| n.name()).collect();
        assert_eq!(names, vec!["(1/2)", "(2/2)"]);

        let first = graph.ordered_processes()[0];
        assert!(first.source_elements().contains(&ElementId::new("in")));
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.source_taps().len(), 1);
    }

    #[test]
    fn test_independent_nodes_larger_first() {
        let small = fragment(vec![FlowElement::tap("in", "lines")]);
        let large = fragment(vec![
            FlowElement::operation("split", "Split"),
            FlowElement::group("count", "GroupBy(word)"),
        ]);

        let graph = NodeGraph::build(&DefaultProcessFactory, &parent(), vec![small, large]).unwrap();

        let first = graph.ordered_processes()[0];
        assert_eq!(first.element_graph().element_count(), 2);
        assert_eq!(first.ordinal(), 0);
    }

    #[test]
    fn test_tie_break_is_stable() {
        let build = || {
            let a = fragment(vec![FlowElement::tap("in", "lines")]);
            let b = fragment(vec![FlowElement::operation("split", "Split")]);
            let c = fragment(vec![FlowElement::tap("out", "counts")]);
            NodeGraph::build(&DefaultProcessFactory, &parent(), vec![a, b, c]).unwrap()
        };

        let first: Vec<String> = build()
            .ordered_processes()
            .iter()
            .map(|n| n.source_elements().iter().next().unwrap().to_string())
            .collect();
        let second: Vec<String> = build()
            .ordered_processes()
            .iter()
            .map(|n| n.source_elements().iter().next().unwrap().to_string())
            .collect();

        assert_eq!(first, vec!["in", "split", "out"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_annotations_are_collected() {
        let mut annotations = Annotations::new();
        annotations
            .entry("accumulated".to_string())
            .or_default()
            .insert(ElementId::new("count"));

        let mut graph = ElementGraph::new();
        graph.add_element(FlowElement::group("count", "GroupBy(word)"));
        let node = ElementSubGraph::annotated(graph, annotations);

        let graph = NodeGraph::build(&DefaultProcessFactory, &parent(), vec![node]).unwrap();
        assert!(graph.annotations()["accumulated"].contains(&ElementId::new("count")));
    }

    #[test]
    fn test_foreign_element_rejected() {
        let stray = fragment(vec![FlowElement::operation("elsewhere", "Filter")]);
        let err = NodeGraph::build(&DefaultProcessFactory, &parent(), vec![stray]).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidGraph(_)));
    }

    #[test]
    fn test_empty_node_graph() {
        let graph = NodeGraph::build(&DefaultProcessFactory, &parent(), Vec::new()).unwrap();
        assert!(graph.is_empty());
        assert!(graph.source_elements().is_empty());
    }
}

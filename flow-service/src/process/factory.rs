// Process Factory
// Materializes nodes, steps and node graphs, and names them once ordered

use super::{FlowNode, FlowStep, NodeGraph, Process};
use crate::element::{ElementGraph, ElementSubGraph};
use crate::error::ServiceResult;

/// Creates the processes of each decomposition level.
///
/// Builders call the `create_*` methods while populating a level and the
/// naming methods once the level has been ordered.
pub trait ProcessFactory: Send + Sync {
    fn create_node(&self, parent: &ElementGraph, sub_graph: ElementSubGraph)
        -> ServiceResult<FlowNode>;

    fn create_step(
        &self,
        parent: &ElementGraph,
        sub_graph: ElementSubGraph,
        node_graph: NodeGraph,
    ) -> ServiceResult<FlowStep>;

    /// Build the node graph of one step
    fn create_node_graph(
        &self,
        parent: &ElementGraph,
        sub_graphs: Vec<ElementSubGraph>,
    ) -> ServiceResult<NodeGraph> {
        NodeGraph::build(self, parent, sub_graphs)
    }

    fn node_name(&self, node: &FlowNode, count: usize, ordinal: usize) -> String;

    fn step_name(&self, step: &FlowStep, count: usize, ordinal: usize) -> String;
}

/// Factory used when nothing more specific is needed
#[derive(Debug, Clone, Default)]
pub struct DefaultProcessFactory;

impl ProcessFactory for DefaultProcessFactory {
    fn create_node(
        &self,
        _parent: &ElementGraph,
        sub_graph: ElementSubGraph,
    ) -> ServiceResult<FlowNode> {
        Ok(FlowNode::new(sub_graph))
    }

    fn create_step(
        &self,
        _parent: &ElementGraph,
        sub_graph: ElementSubGraph,
        node_graph: NodeGraph,
    ) -> ServiceResult<FlowStep> {
        Ok(FlowStep::new(sub_graph, node_graph))
    }

    fn node_name(&self, _node: &FlowNode, count: usize, ordinal: usize) -> String {
        format!("({}/{})", ordinal + 1, count)
    }

    fn step_name(&self, step: &FlowStep, count: usize, ordinal: usize) -> String {
        let graph = step.element_graph();
        let sinks: Vec<&str> = step
            .sink_elements()
            .iter()
            .filter_map(|id| graph.element(id))
            .map(|element| element.name.as_str())
            .collect();

        if sinks.is_empty() {
            format!("({}/{})", ordinal + 1, count)
        } else {
            format!("({}/{}) {}", ordinal + 1, count, sinks.join(", "))
        }
    }
}

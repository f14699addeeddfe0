// Flow Steps
// Coarse processes, one submitted job each, owning a graph of nodes

use super::graph::ensure_within;
use super::{by_submit_priority, NodeGraph, Process, ProcessBase, ProcessFactory, ProcessGraph};
use crate::element::{ElementGraph, ElementGraphId, ElementSubGraph};
use crate::error::ServiceResult;

use std::collections::HashMap;
use std::ops::Deref;
use tracing::debug;

#[derive(Debug)]
pub struct FlowStep {
    base: ProcessBase,
    node_graph: NodeGraph,
}

impl FlowStep {
    pub fn new(sub_graph: ElementSubGraph, node_graph: NodeGraph) -> Self {
        Self {
            base: ProcessBase::new(sub_graph),
            node_graph,
        }
    }

    pub fn with_submit_priority(mut self, priority: i32) -> Self {
        self.base = self.base.with_submit_priority(priority);
        self
    }

    pub fn node_graph(&self) -> &NodeGraph {
        &self.node_graph
    }

    /// Grouping operators executed by this step
    pub fn group_names(&self) -> Vec<&str> {
        self.element_graph().group_names()
    }
}

impl Process for FlowStep {
    fn base(&self) -> &ProcessBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ProcessBase {
        &mut self.base
    }
}

/// The steps of one flow and the elements passed between them
#[derive(Debug)]
pub struct StepGraph {
    graph: ProcessGraph<FlowStep>,
}

impl StepGraph {
    /// Build the graph from disjoint step sub-graphs of `parent`.
    ///
    /// `node_sub_graphs` maps a step sub-graph to its node decomposition; a
    /// step with no entry runs as a single node covering the whole step.
    /// Annotations found on the nodes decorate the step's sub-graph.
    pub fn build<F>(
        factory: &F,
        parent: &ElementGraph,
        step_sub_graphs: Vec<ElementSubGraph>,
        mut node_sub_graphs: HashMap<ElementGraphId, Vec<ElementSubGraph>>,
    ) -> ServiceResult<Self>
    where
        F: ProcessFactory + ?Sized,
    {
        ensure_within(parent, &step_sub_graphs)?;

        let mut graph = ProcessGraph::new();
        for sub_graph in step_sub_graphs {
            let nodes = node_sub_graphs
                .remove(&sub_graph.id())
                .unwrap_or_else(|| vec![sub_graph.clone()]);

            let node_graph = factory.create_node_graph(sub_graph.graph(), nodes)?;
            let sub_graph = sub_graph.annotate(node_graph.annotations());

            graph.add_process(factory.create_step(parent, sub_graph, node_graph)?)?;
        }

        graph.bind_edges()?;
        graph.assign_identities(by_submit_priority, |step, count, ordinal| {
            factory.step_name(step, count, ordinal)
        })?;

        debug!(
            steps = graph.len(),
            edges = graph.edge_count(),
            "Built step graph"
        );

        Ok(Self { graph })
    }

    pub fn graph(&self) -> &ProcessGraph<FlowStep> {
        &self.graph
    }

    /// Total node count across every step
    pub fn node_count(&self) -> usize {
        self.graph.processes().map(|step| step.node_graph().len()).sum()
    }
}

impl Deref for StepGraph {
    type Target = ProcessGraph<FlowStep>;

    fn deref(&self) -> &Self::Target {
        &self.graph
    }
}

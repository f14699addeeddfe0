// Process Graph
// Processes joined by the elements they share, with graph-level source/sink bookkeeping

use super::{by_ordinal, Process, ProcessEdge, ProcessId};
use crate::element::{
    merge_annotations, Annotations, ElementGraph, ElementId, ElementKind, ElementSubGraph,
};
use crate::error::{ServiceError, ServiceResult};
use crate::graph::DirectedGraph;

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Directed multigraph of processes.
///
/// Built once by a node or step builder: every process is added, then
/// [`ProcessGraph::bind_edges`] discovers the edges and the external
/// sources and sinks, then ordinals and names are assigned. The graph is
/// read-only afterwards.
#[derive(Debug)]
pub struct ProcessGraph<P> {
    graph: DirectedGraph<ProcessId, P, ProcessEdge>,
    source_elements: BTreeSet<ElementId>,
    sink_elements: BTreeSet<ElementId>,
    source_taps: OnceLock<BTreeSet<String>>,
    sink_taps: OnceLock<BTreeSet<String>>,
}

impl<P> Default for ProcessGraph<P> {
    fn default() -> Self {
        Self {
            graph: DirectedGraph::default(),
            source_elements: BTreeSet::new(),
            sink_elements: BTreeSet::new(),
            source_taps: OnceLock::new(),
            sink_taps: OnceLock::new(),
        }
    }
}

impl<P: Process> ProcessGraph<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_process(&mut self, process: P) -> ServiceResult<()> {
        self.graph.add_vertex(process.id(), process)?;
        Ok(())
    }

    /// Discover every process edge and the external sources and sinks.
    ///
    /// Runs over the whole vertex set, so it must only be called once every
    /// process of the level is present.
    pub(crate) fn bind_edges(&mut self) -> ServiceResult<()> {
        let processes: Vec<&P> = self.graph.vertices().map(|(_, p)| p).collect();

        let mut sources: BTreeSet<ElementId> = processes
            .iter()
            .flat_map(|p| p.source_elements().iter().cloned())
            .collect();
        let mut sinks: BTreeSet<ElementId> = processes
            .iter()
            .flat_map(|p| p.sink_elements().iter().cloned())
            .collect();

        for source in &processes {
            for sink in &processes {
                if source.id() == sink.id() {
                    continue;
                }
                for element in sink.sink_elements() {
                    sources.remove(element);
                }
                for element in source.source_elements() {
                    sinks.remove(element);
                }
            }
        }

        let mut edges = Vec::new();
        for source in &processes {
            for sink in &processes {
                if source.id() == sink.id() {
                    continue;
                }
                for element in source.sink_elements() {
                    if sink.source_elements().contains(element) {
                        edges.push(ProcessEdge::new(*source, element, *sink));
                    }
                }
            }
        }

        for edge in edges {
            self.graph
                .add_edge(edge.source_process, edge.sink_process, edge)?;
        }

        self.source_elements = sources;
        self.sink_elements = sinks;
        self.source_taps = OnceLock::new();
        self.sink_taps = OnceLock::new();

        Ok(())
    }

    /// Give every process its ordinal and name from one ordered topological pass
    pub(crate) fn assign_identities<C, N>(&mut self, compare: C, naming: N) -> ServiceResult<()>
    where
        C: FnMut(&P, &P) -> Ordering,
        N: Fn(&P, usize, usize) -> String,
    {
        let order: Vec<ProcessId> = self
            .graph
            .ordered_topological_iter(compare)
            .map(|(id, _)| *id)
            .collect();

        let count = self.graph.vertex_count();
        if order.len() != count {
            return Err(ServiceError::CyclicDependency(format!(
                "process graph ordered {} of {} processes",
                order.len(),
                count
            )));
        }

        let names: Vec<String> = order
            .iter()
            .enumerate()
            .filter_map(|(ordinal, id)| {
                self.graph
                    .vertex(id)
                    .map(|process| naming(process, count, ordinal))
            })
            .collect();

        for (ordinal, (id, name)) in order.iter().zip(names).enumerate() {
            if let Some(process) = self.graph.vertex_mut(id) {
                process.assign_identity(ordinal, name)?;
            }
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.graph.vertex_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn process(&self, id: &ProcessId) -> Option<&P> {
        self.graph.vertex(id)
    }

    pub fn find_process(&self, name: &str) -> Option<&P> {
        self.processes().find(|p| p.name() == name)
    }

    /// Processes in the order they were added
    pub fn processes(&self) -> impl Iterator<Item = &P> + '_ {
        self.graph.vertices().map(|(_, process)| process)
    }

    /// Processes in ordinal order
    pub fn ordered_processes(&self) -> Vec<&P> {
        self.ordered_topological_order(by_ordinal)
    }

    /// Dependency order; `compare` breaks ties between ready processes
    pub fn ordered_topological_order<C>(&self, compare: C) -> Vec<&P>
    where
        C: FnMut(&P, &P) -> Ordering,
    {
        self.graph
            .ordered_topological_iter(compare)
            .map(|(_, process)| process)
            .collect()
    }

    pub fn edges(&self) -> impl Iterator<Item = &ProcessEdge> + '_ {
        self.graph.edges().map(|edge| edge.weight)
    }

    pub fn incoming_edges(&self, id: &ProcessId) -> Vec<&ProcessEdge> {
        self.graph
            .incoming_edges(id)
            .into_iter()
            .map(|edge| edge.weight)
            .collect()
    }

    pub fn outgoing_edges(&self, id: &ProcessId) -> Vec<&ProcessEdge> {
        self.graph
            .outgoing_edges(id)
            .into_iter()
            .map(|edge| edge.weight)
            .collect()
    }

    pub fn edges_between(&self, source: &ProcessId, sink: &ProcessId) -> Vec<&ProcessEdge> {
        self.graph
            .edges_between(source, sink)
            .into_iter()
            .map(|edge| edge.weight)
            .collect()
    }

    pub fn predecessors(&self, id: &ProcessId) -> Vec<&P> {
        self.graph
            .predecessors(id)
            .into_iter()
            .filter_map(|key| self.graph.vertex(key))
            .collect()
    }

    pub fn successors(&self, id: &ProcessId) -> Vec<&P> {
        self.graph
            .successors(id)
            .into_iter()
            .filter_map(|key| self.graph.vertex(key))
            .collect()
    }

    /// External inputs: sources no other process produces
    pub fn source_elements(&self) -> &BTreeSet<ElementId> {
        &self.source_elements
    }

    /// External outputs: sinks no other process consumes
    pub fn sink_elements(&self) -> &BTreeSet<ElementId> {
        &self.sink_elements
    }

    /// Every process's sources, bound or not
    pub fn all_source_elements(&self) -> BTreeSet<ElementId> {
        self.processes()
            .flat_map(|p| p.source_elements().iter().cloned())
            .collect()
    }

    /// Every process's sinks, bound or not
    pub fn all_sink_elements(&self) -> BTreeSet<ElementId> {
        self.processes()
            .flat_map(|p| p.sink_elements().iter().cloned())
            .collect()
    }

    pub fn trap_elements(&self) -> BTreeSet<ElementId> {
        self.processes()
            .flat_map(|p| p.trap_elements().iter().cloned())
            .collect()
    }

    /// Names of the external source taps
    pub fn source_taps(&self) -> &BTreeSet<String> {
        self.source_taps
            .get_or_init(|| self.tap_names(&self.source_elements))
    }

    /// Names of the external sink taps
    pub fn sink_taps(&self) -> &BTreeSet<String> {
        self.sink_taps
            .get_or_init(|| self.tap_names(&self.sink_elements))
    }

    /// A process that only passes its resources through
    pub fn is_identity(&self, process: &P) -> bool {
        let graph = process.element_graph();
        graph.size_without_sentinels()
            == process.source_elements().len() + process.sink_elements().len()
    }

    pub fn identity_processes(&self) -> Vec<&P> {
        self.processes().filter(|p| self.is_identity(p)).collect()
    }

    /// Processes whose element graph contains `element`
    pub fn element_processes(&self, element: &ElementId) -> Vec<&P> {
        self.processes()
            .filter(|p| p.element_graph().contains(element))
            .collect()
    }

    /// Processes producing `element` as a sink
    pub fn element_source_processes(&self, element: &ElementId) -> Vec<&P> {
        self.processes()
            .filter(|p| p.sink_elements().contains(element))
            .collect()
    }

    /// Processes consuming `element` as a source
    pub fn element_sink_processes(&self, element: &ElementId) -> Vec<&P> {
        self.processes()
            .filter(|p| p.source_elements().contains(element))
            .collect()
    }

    /// Elements of `graph` owned by more than one process, other than external sources and sinks
    pub fn duplicated_elements(&self, graph: &ElementGraph) -> BTreeSet<ElementId> {
        graph
            .element_ids()
            .filter(|id| !id.is_sentinel())
            .filter(|id| !self.source_elements.contains(*id) && !self.sink_elements.contains(*id))
            .filter(|id| self.element_processes(id).len() > 1)
            .cloned()
            .collect()
    }

    /// Union of every process's annotations
    pub fn annotations(&self) -> Annotations {
        let mut result = Annotations::new();
        for process in self.processes() {
            if let Some(annotations) = process.annotations() {
                merge_annotations(&mut result, annotations);
            }
        }
        result
    }

    fn tap_names(&self, elements: &BTreeSet<ElementId>) -> BTreeSet<String> {
        elements
            .iter()
            .filter_map(|id| {
                self.processes()
                    .find_map(|p| p.element_graph().element(id))
                    .filter(|element| element.kind == ElementKind::Tap)
                    .map(|element| element.name.clone())
            })
            .collect()
    }
}

/// Every non-sentinel element of every sub-graph must belong to `parent`
pub(crate) fn ensure_within(parent: &ElementGraph, sub_graphs: &[ElementSubGraph]) -> ServiceResult<()> {
    for sub_graph in sub_graphs {
        if let Some(missing) = sub_graph
            .element_ids()
            .find(|id| !id.is_sentinel() && !parent.contains(id))
        {
            return Err(ServiceError::InvalidGraph(format!(
                "element {} of sub-graph {} is not part of the parent graph",
                missing,
                sub_graph.id()
            )));
        }
    }
    Ok(())
}

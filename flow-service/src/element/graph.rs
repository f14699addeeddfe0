// Element Graph
// A fragment of the assembly: flow elements joined by ordinal-tagged scopes

use super::{ElementId, ElementKind, FlowElement};
use crate::graph::{DirectedGraph, GraphError};

use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Identity of one element graph, used to key nested decompositions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementGraphId(Uuid);

impl ElementGraphId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ElementGraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Edge between two elements; `ordinal` is the input position on the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub ordinal: usize,
}

/// Directed graph of flow elements.
///
/// The same element id may appear in several element graphs; that shared
/// membership is what the process graphs use to discover dependencies.
#[derive(Debug, Clone)]
pub struct ElementGraph {
    id: ElementGraphId,
    graph: DirectedGraph<ElementId, FlowElement, Scope>,
}

impl Default for ElementGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementGraph {
    pub fn new() -> Self {
        Self {
            id: ElementGraphId::new(),
            graph: DirectedGraph::new(),
        }
    }

    pub fn id(&self) -> ElementGraphId {
        self.id
    }

    /// Add an element; adding the same id twice is a no-op
    pub fn add_element(&mut self, element: FlowElement) {
        if !self.graph.contains_vertex(&element.id) {
            let id = element.id.clone();
            // key was checked above, insertion cannot collide
            let _ = self.graph.add_vertex(id, element);
        }
    }

    /// Connect two elements already in the graph
    pub fn add_scope(
        &mut self,
        from: &ElementId,
        to: &ElementId,
        ordinal: usize,
    ) -> Result<(), GraphError> {
        self.graph
            .add_edge(from.clone(), to.clone(), Scope { ordinal })?;
        Ok(())
    }

    /// Add a chain of elements, connecting each to the next at ordinal 0
    pub fn add_path(&mut self, elements: Vec<FlowElement>) -> Result<(), GraphError> {
        let ids: Vec<ElementId> = elements.iter().map(|e| e.id.clone()).collect();
        for element in elements {
            self.add_element(element);
        }
        for pair in ids.windows(2) {
            self.add_scope(&pair[0], &pair[1], 0)?;
        }
        Ok(())
    }

    pub fn contains(&self, id: &ElementId) -> bool {
        self.graph.contains_vertex(id)
    }

    pub fn element(&self, id: &ElementId) -> Option<&FlowElement> {
        self.graph.vertex(id)
    }

    /// Elements in insertion order
    pub fn elements(&self) -> impl Iterator<Item = &FlowElement> + '_ {
        self.graph.vertices().map(|(_, element)| element)
    }

    pub fn element_ids(&self) -> impl Iterator<Item = &ElementId> + '_ {
        self.graph.keys()
    }

    pub fn element_count(&self) -> usize {
        self.graph.vertex_count()
    }

    /// Element count excluding the head and tail sentinels
    pub fn size_without_sentinels(&self) -> usize {
        self.elements().filter(|e| !e.is_sentinel()).count()
    }

    pub fn scope_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Scopes entering `id`, paired with the element they come from
    pub fn incoming_scopes(&self, id: &ElementId) -> Vec<(&ElementId, &Scope)> {
        self.graph
            .incoming_edges(id)
            .into_iter()
            .map(|edge| (edge.source, edge.weight))
            .collect()
    }

    /// Scopes leaving `id`, paired with the element they go to
    pub fn outgoing_scopes(&self, id: &ElementId) -> Vec<(&ElementId, &Scope)> {
        self.graph
            .outgoing_edges(id)
            .into_iter()
            .map(|edge| (edge.target, edge.weight))
            .collect()
    }

    /// Elements fed only by the head sentinel (or by nothing)
    pub fn source_elements(&self) -> BTreeSet<ElementId> {
        self.elements()
            .filter(|e| Self::is_boundary_candidate(e))
            .filter(|e| {
                self.graph
                    .predecessors(&e.id)
                    .iter()
                    .all(|pred| **pred == ElementId::head())
            })
            .map(|e| e.id.clone())
            .collect()
    }

    /// Elements feeding only the tail sentinel (or nothing)
    pub fn sink_elements(&self) -> BTreeSet<ElementId> {
        self.elements()
            .filter(|e| Self::is_boundary_candidate(e))
            .filter(|e| {
                self.graph
                    .successors(&e.id)
                    .iter()
                    .all(|succ| **succ == ElementId::tail())
            })
            .map(|e| e.id.clone())
            .collect()
    }

    pub fn trap_elements(&self) -> BTreeSet<ElementId> {
        self.elements()
            .filter(|e| e.kind == ElementKind::Trap)
            .map(|e| e.id.clone())
            .collect()
    }

    /// Names of the grouping operators in this graph
    pub fn group_names(&self) -> Vec<&str> {
        self.elements()
            .filter(|e| e.kind == ElementKind::Group)
            .map(|e| e.name.as_str())
            .collect()
    }

    fn is_boundary_candidate(element: &FlowElement) -> bool {
        !element.is_sentinel() && element.kind != ElementKind::Trap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> BTreeSet<ElementId> {
        names.iter().map(|n| ElementId::new(*n)).collect()
    }

    #[test]
    fn test_sources_and_sinks_with_sentinels() {
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

        assert_eq!(graph.source_elements(), ids(&["in"]));
        assert_eq!(graph.sink_elements(), ids(&["out"]));
        assert_eq!(graph.size_without_sentinels(), 4);
        assert_eq!(graph.group_names(), vec!["GroupBy(word)"]);
    }

    #[test]
    fn test_sources_and_sinks_without_sentinels() {
        let mut graph = ElementGraph::new();
        graph
            .add_path(vec![
                FlowElement::tap("a", "a"),
                FlowElement::operation("b", "b"),
            ])
            .unwrap();

        assert_eq!(graph.source_elements(), ids(&["a"]));
        assert_eq!(graph.sink_elements(), ids(&["b"]));
    }

    #[test]
    fn test_traps_are_neither_source_nor_sink() {
        let mut graph = ElementGraph::new();
        graph
            .add_path(vec![
                FlowElement::tap("in", "in"),
                FlowElement::tap("out", "out"),
            ])
            .unwrap();
        graph.add_element(FlowElement::trap("bad", "bad-records"));

        assert_eq!(graph.source_elements(), ids(&["in"]));
        assert_eq!(graph.sink_elements(), ids(&["out"]));
        assert_eq!(graph.trap_elements(), ids(&["bad"]));
    }

    #[test]
    fn test_scope_ordinals() {
        let mut graph = ElementGraph::new();
        graph.add_element(FlowElement::tap("lhs", "lhs"));
        graph.add_element(FlowElement::tap("rhs", "rhs"));
        graph.add_element(FlowElement::group("join", "CoGroup"));
        graph
            .add_scope(&ElementId::new("lhs"), &ElementId::new("join"), 0)
            .unwrap();
        graph
            .add_scope(&ElementId::new("rhs"), &ElementId::new("join"), 1)
            .unwrap();

        let ordinals: Vec<usize> = graph
            .incoming_scopes(&ElementId::new("join"))
            .iter()
            .map(|(_, scope)| scope.ordinal)
            .collect();
        assert_eq!(ordinals, vec![0, 1]);
        assert_eq!(graph.outgoing_scopes(&ElementId::new("lhs")).len(), 1);
    }

    #[test]
    fn test_add_element_twice_is_noop() {
        let mut graph = ElementGraph::new();
        graph.add_element(FlowElement::tap("a", "a"));
        graph.add_element(FlowElement::tap("a", "renamed"));

        assert_eq!(graph.element_count(), 1);
        assert_eq!(graph.element(&ElementId::new("a")).unwrap().name, "a");
    }
}

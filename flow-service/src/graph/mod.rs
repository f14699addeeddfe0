// Directed Multigraph
// Vertex/edge storage, adjacency queries and comparator-ordered topological iteration

mod topological;

pub use topological::TopologicalIter;

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;

/// Error type for graph operations
#[derive(Debug, Clone)]
pub struct GraphError {
    pub message: String,
    pub kind: GraphErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphErrorKind {
    /// Circular dependency detected
    CyclicDependency,
    /// Reference to a vertex that is not in the graph
    UnknownVertex,
    /// Vertex key added twice
    DuplicateVertex,
    /// Edge whose source and target are the same vertex
    SelfLoop,
    /// Invalid graph structure
    InvalidStructure,
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "graph error: {}", self.message)
    }
}

impl std::error::Error for GraphError {}

impl GraphError {
    pub fn cyclic(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: GraphErrorKind::CyclicDependency,
        }
    }

    pub fn unknown_vertex(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: GraphErrorKind::UnknownVertex,
        }
    }

    pub fn duplicate_vertex(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: GraphErrorKind::DuplicateVertex,
        }
    }

    pub fn self_loop(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: GraphErrorKind::SelfLoop,
        }
    }

    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: GraphErrorKind::InvalidStructure,
        }
    }
}

/// Identifier of an edge, unique within one graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(usize);

/// Borrowed view of an edge
#[derive(Debug)]
pub struct EdgeRef<'a, K, E> {
    pub id: EdgeId,
    pub source: &'a K,
    pub target: &'a K,
    pub weight: &'a E,
}

impl<K, E> Clone for EdgeRef<'_, K, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, E> Copy for EdgeRef<'_, K, E> {}

#[derive(Debug, Clone)]
struct VertexEntry<V> {
    value: V,
    incoming: Vec<EdgeId>,
    outgoing: Vec<EdgeId>,
}

#[derive(Debug, Clone)]
struct EdgeEntry<K, E> {
    source: K,
    target: K,
    weight: E,
}

/// Directed multigraph keyed by `K`, holding vertex values `V` and edge weights `E`.
///
/// More than one edge may connect the same ordered pair of vertices. Self
/// loops are rejected. Vertices iterate in insertion order and edges in
/// creation order, which keeps every derived ordering reproducible.
#[derive(Debug, Clone)]
pub struct DirectedGraph<K, V, E> {
    vertices: HashMap<K, VertexEntry<V>>,
    /// Vertex keys in insertion order
    order: Vec<K>,
    edges: BTreeMap<EdgeId, EdgeEntry<K, E>>,
    next_edge: usize,
}

impl<K, V, E> Default for DirectedGraph<K, V, E> {
    fn default() -> Self {
        Self {
            vertices: HashMap::new(),
            order: Vec::new(),
            edges: BTreeMap::new(),
            next_edge: 0,
        }
    }
}

impl<K, V, E> DirectedGraph<K, V, E>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex; fails if the key is already present
    pub fn add_vertex(&mut self, key: K, value: V) -> Result<(), GraphError> {
        if self.vertices.contains_key(&key) {
            return Err(GraphError::duplicate_vertex(format!(
                "vertex {:?} already exists",
                key
            )));
        }

        self.order.push(key.clone());
        self.vertices.insert(
            key,
            VertexEntry {
                value,
                incoming: Vec::new(),
                outgoing: Vec::new(),
            },
        );

        Ok(())
    }

    /// Remove a vertex and every edge touching it
    pub fn remove_vertex(&mut self, key: &K) -> Option<V> {
        let entry = self.vertices.remove(key)?;
        self.order.retain(|k| k != key);

        for id in entry.incoming.iter().chain(entry.outgoing.iter()) {
            if let Some(edge) = self.edges.remove(id) {
                if let Some(source) = self.vertices.get_mut(&edge.source) {
                    source.outgoing.retain(|e| e != id);
                }
                if let Some(target) = self.vertices.get_mut(&edge.target) {
                    target.incoming.retain(|e| e != id);
                }
            }
        }

        Some(entry.value)
    }

    pub fn contains_vertex(&self, key: &K) -> bool {
        self.vertices.contains_key(key)
    }

    pub fn vertex(&self, key: &K) -> Option<&V> {
        self.vertices.get(key).map(|entry| &entry.value)
    }

    pub fn vertex_mut(&mut self, key: &K) -> Option<&mut V> {
        self.vertices.get_mut(key).map(|entry| &mut entry.value)
    }

    pub fn vertex_count(&self) -> usize {
        self.order.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Vertex keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.order.iter()
    }

    /// Vertices in insertion order
    pub fn vertices(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.order
            .iter()
            .map(move |key| (key, &self.vertices[key].value))
    }

    /// Add an edge between two existing, distinct vertices
    pub fn add_edge(&mut self, source: K, target: K, weight: E) -> Result<EdgeId, GraphError> {
        if source == target {
            return Err(GraphError::self_loop(format!(
                "edge from {:?} to itself",
                source
            )));
        }
        if !self.vertices.contains_key(&source) {
            return Err(GraphError::unknown_vertex(format!(
                "edge source {:?} is not in the graph",
                source
            )));
        }
        if !self.vertices.contains_key(&target) {
            return Err(GraphError::unknown_vertex(format!(
                "edge target {:?} is not in the graph",
                target
            )));
        }

        let id = EdgeId(self.next_edge);
        self.next_edge += 1;

        if let Some(entry) = self.vertices.get_mut(&source) {
            entry.outgoing.push(id);
        }
        if let Some(entry) = self.vertices.get_mut(&target) {
            entry.incoming.push(id);
        }
        self.edges.insert(
            id,
            EdgeEntry {
                source,
                target,
                weight,
            },
        );

        Ok(id)
    }

    pub fn remove_edge(&mut self, id: EdgeId) -> Option<E> {
        let edge = self.edges.remove(&id)?;

        if let Some(source) = self.vertices.get_mut(&edge.source) {
            source.outgoing.retain(|e| *e != id);
        }
        if let Some(target) = self.vertices.get_mut(&edge.target) {
            target.incoming.retain(|e| *e != id);
        }

        Some(edge.weight)
    }

    pub fn edge(&self, id: EdgeId) -> Option<EdgeRef<'_, K, E>> {
        self.edges.get(&id).map(|edge| Self::edge_ref(id, edge))
    }

    /// All edges in creation order
    pub fn edges(&self) -> impl Iterator<Item = EdgeRef<'_, K, E>> + '_ {
        self.edges.iter().map(|(id, edge)| Self::edge_ref(*id, edge))
    }

    pub fn incoming_edges(&self, key: &K) -> Vec<EdgeRef<'_, K, E>> {
        self.vertices
            .get(key)
            .map(|entry| self.collect_edges(&entry.incoming))
            .unwrap_or_default()
    }

    pub fn outgoing_edges(&self, key: &K) -> Vec<EdgeRef<'_, K, E>> {
        self.vertices
            .get(key)
            .map(|entry| self.collect_edges(&entry.outgoing))
            .unwrap_or_default()
    }

    /// Every edge from `source` to `target`
    pub fn edges_between(&self, source: &K, target: &K) -> Vec<EdgeRef<'_, K, E>> {
        self.outgoing_edges(source)
            .into_iter()
            .filter(|edge| edge.target == target)
            .collect()
    }

    pub fn contains_edge(&self, source: &K, target: &K) -> bool {
        self.vertices
            .get(source)
            .map(|entry| {
                entry
                    .outgoing
                    .iter()
                    .any(|id| self.edges.get(id).is_some_and(|e| &e.target == target))
            })
            .unwrap_or(false)
    }

    pub fn in_degree(&self, key: &K) -> usize {
        self.vertices.get(key).map_or(0, |entry| entry.incoming.len())
    }

    pub fn out_degree(&self, key: &K) -> usize {
        self.vertices.get(key).map_or(0, |entry| entry.outgoing.len())
    }

    /// Distinct direct predecessors, in edge order
    pub fn predecessors(&self, key: &K) -> Vec<&K> {
        let mut result: Vec<&K> = Vec::new();
        for edge in self.incoming_edges(key) {
            if !result.contains(&edge.source) {
                result.push(edge.source);
            }
        }
        result
    }

    /// Distinct direct successors, in edge order
    pub fn successors(&self, key: &K) -> Vec<&K> {
        let mut result: Vec<&K> = Vec::new();
        for edge in self.outgoing_edges(key) {
            if !result.contains(&edge.target) {
                result.push(edge.target);
            }
        }
        result
    }

    /// Kahn's topological iteration; `compare` breaks ties among ready vertices.
    ///
    /// Vertices that compare equal are yielded in insertion order. On a cyclic
    /// graph the iterator ends early; see [`TopologicalIter::visited`].
    pub fn ordered_topological_iter<F>(&self, compare: F) -> TopologicalIter<'_, K, V, E>
    where
        F: FnMut(&V, &V) -> Ordering,
    {
        TopologicalIter::new(self, compare)
    }

    /// Topological order of the vertex keys, or a cycle error if some vertex is never reached
    pub fn topological_order<F>(&self, compare: F) -> Result<Vec<&K>, GraphError>
    where
        F: FnMut(&V, &V) -> Ordering,
    {
        let order: Vec<&K> = self
            .ordered_topological_iter(compare)
            .map(|(key, _)| key)
            .collect();

        if order.len() != self.vertex_count() {
            let stuck: Vec<String> = self
                .order
                .iter()
                .filter(|key| !order.contains(key))
                .map(|key| format!("{:?}", key))
                .collect();
            return Err(GraphError::cyclic(format!(
                "visited {} of {} vertices, cycle through: {}",
                order.len(),
                self.vertex_count(),
                stuck.join(", ")
            )));
        }

        Ok(order)
    }

    pub fn is_acyclic(&self) -> bool {
        let mut iter = self.ordered_topological_iter(|_, _| Ordering::Equal);
        iter.by_ref().for_each(drop);
        iter.visited() == self.vertex_count()
    }

    fn collect_edges(&self, ids: &[EdgeId]) -> Vec<EdgeRef<'_, K, E>> {
        ids.iter()
            .filter_map(|id| self.edges.get(id).map(|edge| Self::edge_ref(*id, edge)))
            .collect()
    }

    fn edge_ref(id: EdgeId, edge: &EdgeEntry<K, E>) -> EdgeRef<'_, K, E> {
        EdgeRef {
            id,
            source: &edge.source,
            target: &edge.target,
            weight: &edge.weight,
        }
    }

    pub(crate) fn insertion_order(&self) -> &[K] {
        &self.order
    }

    pub(crate) fn outgoing_ids(&self, key: &K) -> &[EdgeId] {
        self.vertices
            .get(key)
            .map(|entry| entry.outgoing.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn edge_target(&self, id: EdgeId) -> Option<&K> {
        self.edges.get(&id).map(|edge| &edge.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> DirectedGraph<&'static str, i32, &'static str> {
        let mut graph = DirectedGraph::new();
        graph.add_vertex("a", 1).unwrap();
        graph.add_vertex("b", 2).unwrap();
        graph.add_vertex("c", 3).unwrap();
        graph.add_vertex("d", 4).unwrap();
        graph.add_edge("a", "b", "ab").unwrap();
        graph.add_edge("a", "c", "ac").unwrap();
        graph.add_edge("b", "d", "bd").unwrap();
        graph.add_edge("c", "d", "cd").unwrap();
        graph
    }

    #[test]
    fn test_add_and_query() {
        let graph = diamond();

        assert_eq!(graph.vertex_count(), 4);
        assert_eq!(graph.edge_count(), 4);
        assert_eq!(graph.vertex(&"c"), Some(&3));
        assert_eq!(graph.successors(&"a"), vec![&"b", &"c"]);
        assert_eq!(graph.predecessors(&"d"), vec![&"b", &"c"]);
        assert!(graph.contains_edge(&"a", &"b"));
        assert!(!graph.contains_edge(&"b", &"a"));
        assert_eq!(graph.in_degree(&"d"), 2);
        assert_eq!(graph.out_degree(&"d"), 0);
    }

    #[test]
    fn test_duplicate_vertex_rejected() {
        let mut graph = diamond();
        let err = graph.add_vertex("a", 9).unwrap_err();
        assert_eq!(err.kind, GraphErrorKind::DuplicateVertex);
    }

    #[test]
    fn test_self_loop_and_unknown_vertex_rejected() {
        let mut graph = diamond();

        let err = graph.add_edge("a", "a", "aa").unwrap_err();
        assert_eq!(err.kind, GraphErrorKind::SelfLoop);

        let err = graph.add_edge("a", "z", "az").unwrap_err();
        assert_eq!(err.kind, GraphErrorKind::UnknownVertex);
    }

    #[test]
    fn test_parallel_edges_are_kept() {
        let mut graph = diamond();
        graph.add_edge("a", "b", "ab2").unwrap();

        let between = graph.edges_between(&"a", &"b");
        assert_eq!(between.len(), 2);
        assert_eq!(*between[1].weight, "ab2");
        // successors stay distinct
        assert_eq!(graph.successors(&"a"), vec![&"b", &"c"]);
    }

    #[test]
    fn test_remove_vertex_drops_incident_edges() {
        let mut graph = diamond();

        assert_eq!(graph.remove_vertex(&"b"), Some(2));
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.successors(&"a"), vec![&"c"]);
        assert_eq!(graph.predecessors(&"d"), vec![&"c"]);
        assert_eq!(graph.keys().collect::<Vec<_>>(), vec![&"a", &"c", &"d"]);
    }

    #[test]
    fn test_remove_edge() {
        let mut graph = diamond();
        let id = graph.edges_between(&"c", &"d")[0].id;

        assert_eq!(graph.remove_edge(id), Some("cd"));
        assert_eq!(graph.remove_edge(id), None);
        assert_eq!(graph.predecessors(&"d"), vec![&"b"]);
    }

    #[test]
    fn test_comparator_breaks_ties() {
        let graph = diamond();

        // descending by value: c before b once a is done
        let order = graph.topological_order(|x, y| y.cmp(x)).unwrap();
        assert_eq!(order, vec![&"a", &"c", &"b", &"d"]);

        let order = graph.topological_order(|x, y| x.cmp(y)).unwrap();
        assert_eq!(order, vec![&"a", &"b", &"c", &"d"]);
    }

    #[test]
    fn test_equal_rank_keeps_insertion_order() {
        let mut graph: DirectedGraph<&str, (), ()> = DirectedGraph::new();
        for key in ["x", "m", "b", "q"] {
            graph.add_vertex(key, ()).unwrap();
        }

        let first = graph.topological_order(|_, _| Ordering::Equal).unwrap();
        let second = graph.topological_order(|_, _| Ordering::Equal).unwrap();
        assert_eq!(first, vec![&"x", &"m", &"b", &"q"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_cycle_detection() {
        let mut graph = diamond();
        graph.add_edge("d", "a", "da").unwrap();

        assert!(!graph.is_acyclic());

        let mut iter = graph.ordered_topological_iter(|x, y| x.cmp(y));
        iter.by_ref().for_each(drop);
        assert!(iter.visited() < graph.vertex_count());

        let err = graph.topological_order(|x, y| x.cmp(y)).unwrap_err();
        assert_eq!(err.kind, GraphErrorKind::CyclicDependency);
    }

    #[test]
    fn test_empty_graph() {
        let graph: DirectedGraph<String, (), ()> = DirectedGraph::new();
        assert!(graph.is_empty());
        assert!(graph.is_acyclic());
        assert!(graph.topological_order(|_, _| Ordering::Equal).unwrap().is_empty());
    }
}

// Ordered topological iteration
// Kahn's algorithm with a priority-queue frontier

use super::DirectedGraph;

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::hash::Hash;

/// Lazily yields vertices so that every vertex comes after all of its predecessors.
///
/// Every vertex gets a rank up front: the vertices are stably sorted by the
/// comparator, so equal vertices keep their insertion order. The ready
/// frontier is a min-heap of ranks, which makes the comparator decide only
/// among vertices whose dependencies are already satisfied.
pub struct TopologicalIter<'a, K, V, E> {
    graph: &'a DirectedGraph<K, V, E>,
    ranked: Vec<&'a K>,
    rank: HashMap<&'a K, usize>,
    remaining: HashMap<&'a K, usize>,
    ready: BinaryHeap<Reverse<usize>>,
    visited: usize,
}

impl<'a, K, V, E> TopologicalIter<'a, K, V, E>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    pub(super) fn new<F>(graph: &'a DirectedGraph<K, V, E>, mut compare: F) -> Self
    where
        F: FnMut(&V, &V) -> Ordering,
    {
        let mut ranked: Vec<&'a K> = graph.insertion_order().iter().collect();
        ranked.sort_by(|a, b| match (graph.vertex(a), graph.vertex(b)) {
            (Some(a), Some(b)) => compare(a, b),
            _ => Ordering::Equal,
        });

        let rank: HashMap<&'a K, usize> = ranked
            .iter()
            .enumerate()
            .map(|(index, key)| (*key, index))
            .collect();

        let mut remaining = HashMap::new();
        let mut ready = BinaryHeap::new();

        for (index, key) in ranked.iter().enumerate() {
            let degree = graph.in_degree(key);
            if degree == 0 {
                ready.push(Reverse(index));
            } else {
                remaining.insert(*key, degree);
            }
        }

        Self {
            graph,
            ranked,
            rank,
            remaining,
            ready,
            visited: 0,
        }
    }

    /// Number of vertices yielded so far
    pub fn visited(&self) -> usize {
        self.visited
    }
}

impl<'a, K, V, E> Iterator for TopologicalIter<'a, K, V, E>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let Reverse(index) = self.ready.pop()?;
        let graph = self.graph;
        let key = self.ranked[index];

        for id in graph.outgoing_ids(key) {
            let Some(target) = graph.edge_target(*id) else {
                continue;
            };
            if let Some(degree) = self.remaining.get_mut(target) {
                *degree -= 1;
                if *degree == 0 {
                    self.remaining.remove(target);
                    if let Some(rank) = self.rank.get(target) {
                        self.ready.push(Reverse(*rank));
                    }
                }
            }
        }

        self.visited += 1;
        graph.vertex(key).map(|value| (key, value))
    }
}

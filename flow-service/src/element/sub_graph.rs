// Element Sub-Graph
// Shared element graph view that explicitly carries or omits annotations

use super::{merge_annotations, Annotations, ElementGraph, ElementGraphId, ElementId};

use std::collections::BTreeSet;
use std::ops::Deref;
use std::sync::Arc;

/// Element graph owned by a process.
///
/// Storage is shared; decorating with annotations never copies the graph.
#[derive(Debug, Clone)]
pub enum ElementSubGraph {
    Plain(Arc<ElementGraph>),
    Annotated {
        graph: Arc<ElementGraph>,
        annotations: Arc<Annotations>,
    },
}

impl ElementSubGraph {
    pub fn new(graph: ElementGraph) -> Self {
        Self::Plain(Arc::new(graph))
    }

    pub fn annotated(graph: ElementGraph, annotations: Annotations) -> Self {
        Self::Plain(Arc::new(graph)).annotate(annotations)
    }

    pub fn id(&self) -> ElementGraphId {
        self.graph().id()
    }

    pub fn graph(&self) -> &ElementGraph {
        match self {
            Self::Plain(graph) => graph,
            Self::Annotated { graph, .. } => graph,
        }
    }

    pub fn shared_graph(&self) -> &Arc<ElementGraph> {
        match self {
            Self::Plain(graph) => graph,
            Self::Annotated { graph, .. } => graph,
        }
    }

    pub fn annotations(&self) -> Option<&Annotations> {
        match self {
            Self::Plain(_) => None,
            Self::Annotated { annotations, .. } => Some(annotations),
        }
    }

    /// Decorate with more annotations; empty input leaves the view as is
    pub fn annotate(self, extra: Annotations) -> Self {
        if extra.values().all(|elements| elements.is_empty()) {
            return self;
        }

        match self {
            Self::Plain(graph) => Self::Annotated {
                graph,
                annotations: Arc::new(extra),
            },
            Self::Annotated { graph, annotations } => {
                let mut merged = (*annotations).clone();
                merge_annotations(&mut merged, &extra);
                Self::Annotated {
                    graph,
                    annotations: Arc::new(merged),
                }
            }
        }
    }

    /// Names of the annotations that include `element`
    pub fn annotations_of(&self, element: &ElementId) -> BTreeSet<String> {
        self.annotations()
            .map(|annotations| {
                annotations
                    .iter()
                    .filter(|(_, elements)| elements.contains(element))
                    .map(|(name, _)| name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Deref for ElementSubGraph {
    type Target = ElementGraph;

    fn deref(&self) -> &Self::Target {
        self.graph()
    }
}

impl From<ElementGraph> for ElementSubGraph {
    fn from(graph: ElementGraph) -> Self {
        Self::new(graph)
    }
}

impl PartialEq for ElementSubGraph {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id() && self.annotations() == other.annotations()
    }
}

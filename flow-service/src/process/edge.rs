// Process Edge
// Dependency between two processes through one shared element

use super::{Process, ProcessId};
use crate::element::ElementId;

use std::collections::BTreeSet;

/// One element flowing out of a source process and into a sink process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEdge {
    /// Shared element
    pub element: ElementId,
    pub source_process: ProcessId,
    pub sink_process: ProcessId,
    /// Ordinals of the source graph's scopes entering the element
    pub outgoing_ordinals: BTreeSet<usize>,
    /// Ordinals of the sink graph's scopes leaving the element
    pub incoming_ordinals: BTreeSet<usize>,
    /// Annotations on the element in the source process
    pub source_annotations: BTreeSet<String>,
    /// Annotations on the element in the sink process
    pub sink_annotations: BTreeSet<String>,
}

impl ProcessEdge {
    pub fn new<P: Process>(source: &P, element: &ElementId, sink: &P) -> Self {
        let source_graph = source.element_graph();
        let sink_graph = sink.element_graph();

        let outgoing_ordinals = source_graph
            .incoming_scopes(element)
            .into_iter()
            .map(|(_, scope)| scope.ordinal)
            .collect();
        let incoming_ordinals = sink_graph
            .outgoing_scopes(element)
            .into_iter()
            .map(|(_, scope)| scope.ordinal)
            .collect();

        Self {
            element: element.clone(),
            source_process: source.id(),
            sink_process: sink.id(),
            outgoing_ordinals,
            incoming_ordinals,
            source_annotations: source_graph.annotations_of(element),
            sink_annotations: sink_graph.annotations_of(element),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Annotations, ElementGraph, ElementSubGraph, FlowElement};
    use crate::process::FlowNode;

    #[test]
    fn test_edge_records_ordinals_and_annotations() {
        // producer: a -> b (b entered at ordinal 0)
        let mut producer = ElementGraph::new();
        producer
            .add_path(vec![
                FlowElement::operation("a", "a"),
                FlowElement::tap("b", "b"),
            ])
            .unwrap();

        // consumer: b feeds the join at ordinal 1
        let mut consumer = ElementGraph::new();
        consumer.add_element(FlowElement::tap("b", "b"));
        consumer.add_element(FlowElement::group("j", "CoGroup"));
        consumer
            .add_scope(&ElementId::new("b"), &ElementId::new("j"), 1)
            .unwrap();

        let mut annotations = Annotations::new();
        annotations
            .entry("streamed".to_string())
            .or_default()
            .insert(ElementId::new("b"));

        let producer = FlowNode::new(ElementSubGraph::new(producer));
        let consumer = FlowNode::new(ElementSubGraph::annotated(consumer, annotations));

        let edge = ProcessEdge::new(&producer, &ElementId::new("b"), &consumer);

        assert_eq!(edge.source_process, producer.id());
        assert_eq!(edge.sink_process, consumer.id());
        assert_eq!(edge.outgoing_ordinals, BTreeSet::from([0]));
        assert_eq!(edge.incoming_ordinals, BTreeSet::from([1]));
        assert!(edge.source_annotations.is_empty());
        assert_eq!(edge.sink_annotations, BTreeSet::from(["streamed".to_string()]));
    }
}

// Process graph DOT export

use super::{Process, ProcessGraph};
use crate::dot::DotWriter;
use crate::element::ElementId;

use std::collections::BTreeSet;

impl<P: Process> ProcessGraph<P> {
    /// Render the graph as DOT, one vertex per process in ordinal order
    pub fn to_dot(&self, name: &str) -> String {
        let mut writer = DotWriter::new(name);

        for process in self.ordered_processes() {
            let graph = process.element_graph();
            let mut lines = vec![process.name().to_string()];

            let sources = element_names(process, process.source_elements());
            if !sources.is_empty() {
                lines.push(format!("in: {}", sources.join(", ")));
            }
            let sinks = element_names(process, process.sink_elements());
            if !sinks.is_empty() {
                lines.push(format!("out: {}", sinks.join(", ")));
            }
            lines.extend(graph.group_names().into_iter().map(String::from));

            writer.vertex(&process.id().to_string(), &lines);
        }

        for edge in self.edges() {
            writer.edge(
                &edge.source_process.to_string(),
                &edge.sink_process.to_string(),
                Some(edge.element.as_str()),
            );
        }

        writer.finish()
    }
}

fn element_names<P: Process>(process: &P, elements: &BTreeSet<ElementId>) -> Vec<String> {
    let graph = process.element_graph();
    elements
        .iter()
        .map(|id| {
            graph
                .element(id)
                .map(|element| element.name.clone())
                .unwrap_or_else(|| id.to_string())
        })
        .collect()
}

// Cascade Connector
// Derives the flow dependency graph from the taps flows read and write

use super::cancel::CancellationContext;
use super::config::CascadeConfig;
use super::events::ProgressSender;
use super::flow::SharedFlow;
use super::scheduler::Cascade;
use super::skip::{SkipIfSinkNotStale, SkipStrategy};
use super::tap::identifiers;
use crate::dot::DotWriter;
use crate::error::{ServiceError, ServiceResult};
use crate::graph::DirectedGraph;

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Flows reading and writing one resource
#[derive(Debug, Clone, Default)]
pub struct ResourceUse {
    pub writers: Vec<String>,
    pub readers: Vec<String>,
}

/// The resource graph and the flow graph derived from it.
///
/// Resource vertices are fully qualified tap identifiers and resource edges
/// are labelled with the flow carrying data from one to the other. Flow
/// edges `Q -> P` mean Q writes a resource P reads, and are labelled with
/// that resource. Both graphs are fixed once built.
#[derive(Debug)]
pub struct CascadeGraph {
    resources: DirectedGraph<String, ResourceUse, String>,
    flows: DirectedGraph<String, SharedFlow, String>,
    order: Vec<String>,
}

impl CascadeGraph {
    /// Build and verify the graphs for `flows`
    pub fn build(flows: Vec<SharedFlow>) -> ServiceResult<Self> {
        let mut resources: DirectedGraph<String, ResourceUse, String> = DirectedGraph::new();
        let mut flow_graph: DirectedGraph<String, SharedFlow, String> = DirectedGraph::new();

        for flow in flows {
            let name = flow.name().to_string();
            if flow_graph.contains_vertex(&name) {
                return Err(ServiceError::DuplicateFlow(name));
            }

            let sources = identifiers(flow.sources());
            let sinks = identifiers(flow.sinks());

            if let Some(shared) = sources.iter().find(|id| sinks.contains(id)) {
                return Err(ServiceError::SelfReferentialResource {
                    flow: name,
                    resource: shared.clone(),
                });
            }

            for id in sources.iter().chain(sinks.iter()) {
                if !resources.contains_vertex(id) {
                    resources.add_vertex(id.clone(), ResourceUse::default())?;
                }
            }
            for id in &sources {
                if let Some(usage) = resources.vertex_mut(id) {
                    usage.readers.push(name.clone());
                }
            }
            for id in &sinks {
                if let Some(usage) = resources.vertex_mut(id) {
                    usage.writers.push(name.clone());
                }
            }
            for source in &sources {
                for sink in &sinks {
                    resources.add_edge(source.clone(), sink.clone(), name.clone())?;
                }
            }

            flow_graph.add_vertex(name, flow)?;
        }

        let mut dependencies = Vec::new();
        for (resource, usage) in resources.vertices() {
            for writer in &usage.writers {
                for reader in &usage.readers {
                    if writer != reader {
                        dependencies.push((writer.clone(), reader.clone(), resource.clone()));
                    }
                }
            }
        }
        for (writer, reader, resource) in dependencies {
            if !flow_graph.contains_edge(&writer, &reader) {
                flow_graph.add_edge(writer, reader, resource)?;
            }
        }

        let order: Vec<String> = {
            let mut iter = flow_graph.ordered_topological_iter(|_, _| Ordering::Equal);
            let order: Vec<String> = iter.by_ref().map(|(name, _)| name.clone()).collect();
            if iter.visited() != flow_graph.vertex_count() {
                let stuck: Vec<&str> = flow_graph
                    .keys()
                    .filter(|name| !order.contains(name))
                    .map(String::as_str)
                    .collect();
                return Err(ServiceError::CyclicDependency(format!(
                    "ordered {} of {} flows, cycle through: {}",
                    iter.visited(),
                    flow_graph.vertex_count(),
                    stuck.join(", ")
                )));
            }
            order
        };

        debug!(
            flows = flow_graph.vertex_count(),
            dependencies = flow_graph.edge_count(),
            resources = resources.vertex_count(),
            "Built cascade graph"
        );

        Ok(Self {
            resources,
            flows: flow_graph,
            order,
        })
    }

    pub fn flow_count(&self) -> usize {
        self.flows.vertex_count()
    }

    pub fn flow(&self, name: &str) -> Option<&SharedFlow> {
        self.flows.vertex(&name.to_string())
    }

    /// Flows in dependency order; unrelated flows keep the order they were given in
    pub fn flows_in_order(&self) -> Vec<&SharedFlow> {
        self.order
            .iter()
            .filter_map(|name| self.flows.vertex(name))
            .collect()
    }

    pub fn flow_names(&self) -> &[String] {
        &self.order
    }

    /// Flows that must finish before `name` may start
    pub fn predecessors(&self, name: &str) -> Vec<&str> {
        self.flows
            .predecessors(&name.to_string())
            .into_iter()
            .map(String::as_str)
            .collect()
    }

    pub fn successors(&self, name: &str) -> Vec<&str> {
        self.flows
            .successors(&name.to_string())
            .into_iter()
            .map(String::as_str)
            .collect()
    }

    pub fn has_dependency(&self, from: &str, to: &str) -> bool {
        self.flows.contains_edge(&from.to_string(), &to.to_string())
    }

    pub fn dependency_count(&self) -> usize {
        self.flows.edge_count()
    }

    /// Flows with no predecessors
    pub fn head_flows(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter(|name| self.flows.in_degree(name) == 0)
            .map(String::as_str)
            .collect()
    }

    /// Flows with no successors
    pub fn tail_flows(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter(|name| self.flows.out_degree(name) == 0)
            .map(String::as_str)
            .collect()
    }

    /// Resources read but written by no flow
    pub fn source_taps(&self) -> BTreeSet<&str> {
        self.resources_where(|usage| usage.writers.is_empty())
    }

    /// Resources written but read by no flow
    pub fn sink_taps(&self) -> BTreeSet<&str> {
        self.resources_where(|usage| usage.readers.is_empty())
    }

    /// Resources both written and read within the cascade
    pub fn intermediate_taps(&self) -> BTreeSet<&str> {
        self.resources_where(|usage| !usage.writers.is_empty() && !usage.readers.is_empty())
    }

    pub fn resource(&self, identifier: &str) -> Option<&ResourceUse> {
        self.resources.vertex(&identifier.to_string())
    }

    /// Resource graph as DOT
    pub fn resources_to_dot(&self, name: &str) -> String {
        let mut writer = DotWriter::new(name);
        for id in self.resources.keys() {
            writer.vertex(id, &[id.clone()]);
        }
        for edge in self.resources.edges() {
            writer.edge(edge.source, edge.target, Some(edge.weight));
        }
        writer.finish()
    }

    /// Flow graph as DOT
    pub fn flows_to_dot(&self, name: &str) -> String {
        let mut writer = DotWriter::new(name);
        for flow in self.flows_in_order() {
            let mut lines = vec![flow.name().to_string()];
            lines.extend(identifiers(flow.sources()).into_iter().map(|id| format!("in: {}", id)));
            lines.extend(identifiers(flow.sinks()).into_iter().map(|id| format!("out: {}", id)));
            writer.vertex(flow.name(), &lines);
        }
        for edge in self.flows.edges() {
            writer.edge(edge.source, edge.target, Some(edge.weight));
        }
        writer.finish()
    }

    fn resources_where<F>(&self, predicate: F) -> BTreeSet<&str>
    where
        F: Fn(&ResourceUse) -> bool,
    {
        self.resources
            .vertices()
            .filter(|(_, usage)| predicate(usage))
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

/// Connects flows into a [`Cascade`]
#[derive(Debug, Clone)]
pub struct CascadeConnector {
    config: CascadeConfig,
    skip_strategy: Arc<dyn SkipStrategy>,
    event_tx: Option<ProgressSender>,
    cancellation: Option<CancellationContext>,
}

impl Default for CascadeConnector {
    fn default() -> Self {
        Self {
            config: CascadeConfig::default(),
            skip_strategy: Arc::new(SkipIfSinkNotStale),
            event_tx: None,
            cancellation: None,
        }
    }
}

impl CascadeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: CascadeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_skip_strategy(mut self, strategy: Arc<dyn SkipStrategy>) -> Self {
        self.skip_strategy = strategy;
        self
    }

    /// Set progress event sender
    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn with_cancellation(mut self, context: CancellationContext) -> Self {
        self.cancellation = Some(context);
        self
    }

    /// Build the dependency graph of `flows` and wrap it in a cascade.
    ///
    /// Fails before anything runs on duplicate flow names, a flow reading
    /// its own output, or a dependency cycle.
    pub fn connect(&self, name: impl Into<String>, flows: Vec<SharedFlow>) -> ServiceResult<Cascade> {
        let name = name.into();
        let graph = CascadeGraph::build(flows)?;

        info!(
            cascade = %name,
            flows = graph.flow_count(),
            dependencies = graph.dependency_count(),
            "Connected cascade"
        );

        Ok(Cascade::new(
            name,
            graph,
            self.config.clone(),
            Arc::clone(&self.skip_strategy),
            self.event_tx.clone(),
            self.cancellation.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::testing::{MemoryTap, ProbeFlow};
    use crate::cascade::MultiSourceTap;

    fn flow(name: &str, reads: &[&str], writes: &[&str]) -> SharedFlow {
        let mut flow = ProbeFlow::new(name);
        for id in reads {
            flow = flow.reads(MemoryTap::shared(id));
        }
        for id in writes {
            flow = flow.writes(MemoryTap::shared(id));
        }
        Arc::new(flow)
    }

    #[test]
    fn test_three_flow_scenario() {
        let graph = CascadeGraph::build(vec![
            flow("Flow1", &["in"], &["mid"]),
            flow("Flow2", &["mid"], &["out"]),
            flow("Flow3", &["in2"], &["out2"]),
        ])
        .unwrap();

        assert_eq!(graph.flow_count(), 3);
        assert_eq!(graph.dependency_count(), 1);
        assert!(graph.has_dependency("Flow1", "Flow2"));
        assert!(graph.predecessors("Flow3").is_empty());
        assert!(graph.successors("Flow3").is_empty());

        assert_eq!(graph.head_flows(), vec!["Flow1", "Flow3"]);
        assert_eq!(graph.tail_flows(), vec!["Flow2", "Flow3"]);
        assert_eq!(
            graph.source_taps(),
            BTreeSet::from(["mem://in", "mem://in2"])
        );
        assert_eq!(graph.sink_taps(), BTreeSet::from(["mem://out", "mem://out2"]));
        assert_eq!(graph.intermediate_taps(), BTreeSet::from(["mem://mid"]));
    }

    #[test]
    fn test_order_respects_dependencies() {
        // consumer given first
        let graph = CascadeGraph::build(vec![
            flow("report", &["clean"], &["report"]),
            flow("clean", &["raw"], &["clean"]),
            flow("audit", &["raw"], &["audit"]),
        ])
        .unwrap();

        let order = graph.flow_names();
        let position = |name: &str| order.iter().position(|n| n == name).unwrap();
        assert!(position("clean") < position("report"));
        // report becomes ready first and was given first
        assert_eq!(order, &["clean", "report", "audit"]);
    }

    #[test]
    fn test_cycle_rejected() {
        let err = CascadeGraph::build(vec![
            flow("P1", &["R2"], &["R"]),
            flow("P2", &["R"], &["R2"]),
        ])
        .unwrap_err();

        assert!(matches!(err, ServiceError::CyclicDependency(_)));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_self_referential_flow_rejected() {
        let err = CascadeGraph::build(vec![flow("loop", &["a", "b"], &["b"])]).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::SelfReferentialResource { ref flow, ref resource }
                if flow == "loop" && resource == "mem://b"
        ));
    }

    #[test]
    fn test_duplicate_flow_rejected() {
        let err = CascadeGraph::build(vec![
            flow("import", &["a"], &["b"]),
            flow("import", &["c"], &["d"]),
        ])
        .unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateFlow(ref name) if name == "import"));
    }

    #[test]
    fn test_composite_taps_are_flattened() {
        let merge: SharedFlow = Arc::new(
            ProbeFlow::new("merge")
                .reads(Arc::new(MultiSourceTap::new(vec![
                    MemoryTap::shared("a"),
                    MemoryTap::shared("b"),
                ])))
                .writes(MemoryTap::shared("merged")),
        );

        let graph = CascadeGraph::build(vec![
            flow("make-a", &[], &["a"]),
            flow("make-b", &[], &["b"]),
            merge,
        ])
        .unwrap();

        assert_eq!(graph.predecessors("merge"), vec!["make-a", "make-b"]);
        assert!(graph.resource("mem://a").is_some());
    }

    #[test]
    fn test_parallel_resources_give_one_dependency() {
        let graph = CascadeGraph::build(vec![
            flow("split", &["in"], &["left", "right"]),
            flow("join", &["left", "right"], &["out"]),
        ])
        .unwrap();

        assert_eq!(graph.dependency_count(), 1);
    }

    #[test]
    fn test_isolated_flow_is_a_vertex() {
        let graph = CascadeGraph::build(vec![flow("alone", &[], &[])]).unwrap();
        assert_eq!(graph.flow_count(), 1);
        assert_eq!(graph.head_flows(), vec!["alone"]);
    }

    #[test]
    fn test_dot_exports() {
        let graph = CascadeGraph::build(vec![
            flow("Flow1", &["in"], &["mid"]),
            flow("Flow2", &["mid"], &["out"]),
        ])
        .unwrap();

        let flows = graph.flows_to_dot("cascade");
        assert!(flows.contains("\"Flow1\" -> \"Flow2\" [label=\"mem://mid\"]"));
        assert!(flows.contains("in: mem://in"));

        let resources = graph.resources_to_dot("resources");
        assert!(resources.contains("\"mem://in\" -> \"mem://mid\" [label=\"Flow1\"]"));
    }
}

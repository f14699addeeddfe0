// Plan definitions
// Builds the element graphs of a pre-partitioned plan and decomposes them into steps

use super::models::{NodeDefinition, PlanDefinition, StepDefinition};
use super::parser::{HEAD_KEYWORD, TAIL_KEYWORD};
use crate::element::{ElementGraph, ElementGraphId, ElementId, ElementSubGraph, FlowElement};
use crate::error::{ServiceError, ServiceResult};
use crate::process::{DefaultProcessFactory, ProcessFactory, StepGraph};

use std::collections::HashMap;
use tracing::info;

/// A decomposed plan: the whole assembly and its step graph
#[derive(Debug)]
pub struct Plan {
    pub name: String,
    pub assembly: ElementGraph,
    pub steps: StepGraph,
}

impl PlanDefinition {
    pub fn build(&self) -> ServiceResult<Plan> {
        self.build_with(&DefaultProcessFactory)
    }

    /// Build the assembly from every step path, then the step and node graphs
    pub fn build_with<F>(&self, factory: &F) -> ServiceResult<Plan>
    where
        F: ProcessFactory + ?Sized,
    {
        let elements: HashMap<&str, &FlowElement> = self
            .elements
            .iter()
            .map(|element| (element.id.as_str(), element))
            .collect();

        let mut assembly = ElementGraph::new();
        for step in &self.steps {
            add_paths(&mut assembly, &elements, &step.paths)?;
        }

        let mut step_sub_graphs = Vec::with_capacity(self.steps.len());
        let mut node_sub_graphs: HashMap<ElementGraphId, Vec<ElementSubGraph>> = HashMap::new();
        for step in &self.steps {
            let sub_graph = step_sub_graph(&elements, step)?;
            if !step.nodes.is_empty() {
                let nodes = step
                    .nodes
                    .iter()
                    .map(|node| node_sub_graph(&elements, node))
                    .collect::<ServiceResult<Vec<_>>>()?;
                node_sub_graphs.insert(sub_graph.id(), nodes);
            }
            step_sub_graphs.push(sub_graph);
        }

        let steps = StepGraph::build(factory, &assembly, step_sub_graphs, node_sub_graphs)?;
        info!(
            plan = %self.name,
            steps = steps.len(),
            nodes = steps.node_count(),
            "Built plan"
        );

        Ok(Plan {
            name: self.name.clone(),
            assembly,
            steps,
        })
    }
}

fn step_sub_graph(
    elements: &HashMap<&str, &FlowElement>,
    step: &StepDefinition,
) -> ServiceResult<ElementSubGraph> {
    let mut graph = ElementGraph::new();
    add_paths(&mut graph, elements, &step.paths)?;
    Ok(ElementSubGraph::new(graph))
}

fn node_sub_graph(
    elements: &HashMap<&str, &FlowElement>,
    node: &NodeDefinition,
) -> ServiceResult<ElementSubGraph> {
    let mut graph = ElementGraph::new();
    add_paths(&mut graph, elements, &node.paths)?;
    Ok(ElementSubGraph::annotated(graph, node.annotations.clone()))
}

/// Add each chain, numbering a scope by the inputs its target already has.
///
/// A link already present is not added again, so paths may overlap.
fn add_paths(
    graph: &mut ElementGraph,
    elements: &HashMap<&str, &FlowElement>,
    paths: &[Vec<ElementId>],
) -> ServiceResult<()> {
    for path in paths {
        for id in path {
            graph.add_element(resolve(elements, id)?);
        }

        for pair in path.windows(2) {
            let (from, to) = (sentinel_or(&pair[0]), sentinel_or(&pair[1]));
            let linked = graph
                .outgoing_scopes(&from)
                .iter()
                .any(|(target, _)| **target == to);
            if !linked {
                let ordinal = graph.incoming_scopes(&to).len();
                graph.add_scope(&from, &to, ordinal)?;
            }
        }
    }
    Ok(())
}

fn resolve(elements: &HashMap<&str, &FlowElement>, id: &ElementId) -> ServiceResult<FlowElement> {
    match id.as_str() {
        HEAD_KEYWORD => Ok(FlowElement::head()),
        TAIL_KEYWORD => Ok(FlowElement::tail()),
        other => elements
            .get(other)
            .map(|element| (*element).clone())
            .ok_or_else(|| ServiceError::InvalidInput(format!("unknown element '{}'", other))),
    }
}

fn sentinel_or(id: &ElementId) -> ElementId {
    match id.as_str() {
        HEAD_KEYWORD => ElementId::head(),
        TAIL_KEYWORD => ElementId::tail(),
        _ => id.clone(),
    }
}

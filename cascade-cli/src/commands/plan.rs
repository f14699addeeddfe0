use crate::output;

use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;

use flow_service::{DefinitionParser, Process};

/// Decompose a plan definition into steps and nodes
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Path to the plan YAML file
    pub plan: PathBuf,

    /// Print the step graph as DOT instead of a summary
    #[arg(long)]
    pub dot: bool,
}

pub fn execute(args: PlanArgs) -> Result<()> {
    let path = &args.plan;

    if !path.exists() {
        color_eyre::eyre::bail!("Plan file not found: {}", path.display());
    }

    let plan = DefinitionParser::plan_from_file(path)?.build()?;

    if args.dot {
        print!("{}", plan.steps.to_dot(&plan.name));
        return Ok(());
    }

    output::header(&format!(
        "Plan '{}' ({} steps, {} nodes)",
        plan.name,
        plan.steps.len(),
        plan.steps.node_count()
    ));

    let element_names = |ids: &std::collections::BTreeSet<flow_service::ElementId>| {
        ids.iter()
            .map(|id| {
                plan.assembly
                    .element(id)
                    .map(|element| element.name.clone())
                    .unwrap_or_else(|| id.to_string())
            })
            .collect::<Vec<_>>()
            .join(", ")
    };

    for step in plan.steps.ordered_processes() {
        println!("  {}", step.name());
        println!("      in:  {}", element_names(step.source_elements()));
        println!("      out: {}", element_names(step.sink_elements()));

        for node in step.node_graph().ordered_processes() {
            output::dim(&format!(
                "      node {} ({} elements)",
                node.name(),
                node.element_graph().size_without_sentinels()
            ));
        }

        for successor in plan.steps.successors(&step.id()) {
            output::dim(&format!("      -> {}", successor.name()));
        }
    }

    output::info(&format!(
        "Plan sources: {}",
        element_names(plan.steps.source_elements())
    ));
    output::info(&format!(
        "Plan sinks: {}",
        element_names(plan.steps.sink_elements())
    ));

    let duplicated = plan.steps.duplicated_elements(&plan.assembly);
    if !duplicated.is_empty() {
        output::warning(&format!(
            "Elements shared between steps: {}",
            element_names(&duplicated)
        ));
    }

    Ok(())
}

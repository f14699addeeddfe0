use crate::output;

use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;

use flow_service::DefinitionParser;

/// Check a cascade definition without running it
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the cascade YAML file
    pub definition: PathBuf,
}

pub fn execute(args: ValidateArgs) -> Result<()> {
    let path = &args.definition;

    if !path.exists() {
        color_eyre::eyre::bail!("Cascade file not found: {}", path.display());
    }

    // Step 1: Parse YAML and check flow definitions
    output::status("Validating", &format!("{}", path.display()));

    let definition = match DefinitionParser::cascade_from_file(path) {
        Ok(definition) => definition,
        Err(e) => {
            output::error(&e.to_string());
            std::process::exit(1);
        }
    };

    output::check(&format!(
        "Definition '{}': {} flows",
        definition.name,
        definition.flows.len()
    ));

    // Step 2: Derive dependencies and check for cycles
    let cascade = match definition.connect(None, None) {
        Ok(cascade) => cascade,
        Err(e) => {
            output::error(&e.to_string());
            std::process::exit(1);
        }
    };

    let graph = cascade.graph();
    output::check(&format!(
        "Dependency graph is acyclic: {} dependencies",
        graph.dependency_count()
    ));

    for name in graph.flow_names() {
        let predecessors = graph.predecessors(name);
        if predecessors.is_empty() {
            output::dim(&format!("    {}", name));
        } else {
            output::dim(&format!("    {} <- {}", name, predecessors.join(", ")));
        }
    }

    output::info(&format!("Runs {} flow(s) at a time", cascade.width()));
    output::success("Cascade is valid");

    Ok(())
}

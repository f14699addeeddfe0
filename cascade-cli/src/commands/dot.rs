use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;

use flow_service::DefinitionParser;

/// Print the flow or resource graph of a cascade as DOT
#[derive(Args, Debug)]
pub struct DotArgs {
    /// Path to the cascade YAML file
    pub definition: PathBuf,

    /// Print the resource graph instead of the flow graph
    #[arg(long)]
    pub resources: bool,
}

pub fn execute(args: DotArgs) -> Result<()> {
    let definition = DefinitionParser::cascade_from_file(&args.definition)?;
    let cascade = definition.connect(None, None)?;

    let dot = if args.resources {
        cascade.graph().resources_to_dot(&definition.name)
    } else {
        cascade.graph().flows_to_dot(&definition.name)
    };
    print!("{}", dot);

    Ok(())
}

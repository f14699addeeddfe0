mod commands;
mod output;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Plan and run cascades of dependent flows
#[derive(Parser, Debug)]
#[command(name = "cascade", version, about)]
struct Cli {
    /// Log at debug level unless RUST_LOG is set
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a cascade definition
    Run(commands::run::RunArgs),
    /// Check a cascade definition without running it
    Validate(commands::validate::ValidateArgs),
    /// Print the flow or resource graph of a cascade as DOT
    Dot(commands::dot::DotArgs),
    /// Decompose a plan definition into steps and nodes
    Plan(commands::plan::PlanArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Run(args) => commands::run::execute(args).await,
        Commands::Validate(args) => commands::validate::execute(args),
        Commands::Dot(args) => commands::dot::execute(args),
        Commands::Plan(args) => commands::plan::execute(args),
    }
}

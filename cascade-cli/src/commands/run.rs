use crate::output;

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use color_eyre::Result;
use tracing::debug;

use flow_service::cascade::{
    progress_channel, CancellationContext, CascadeEvent, CascadeStatus, FlowStatus, LogLevel,
};
use flow_service::definition::SkipMode;
use flow_service::DefinitionParser;

/// Run a cascade definition
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the cascade YAML file
    pub definition: PathBuf,

    /// Maximum flows running at once
    #[arg(long, short = 'j', value_name = "N")]
    pub max_concurrent: Option<usize>,

    /// Seconds to wait for running flows after a failure or stop
    #[arg(long, value_name = "SECS")]
    pub grace: Option<u64>,

    /// Run every flow, even when its sinks are up to date
    #[arg(long)]
    pub force: bool,

    /// Print final statistics as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let path = &args.definition;

    if !path.exists() {
        color_eyre::eyre::bail!("Cascade file not found: {}", path.display());
    }

    output::status("Loading", &format!("{}", path.display()));
    let mut definition = DefinitionParser::cascade_from_file(path)?;

    if let Some(max) = args.max_concurrent {
        definition.config.max_concurrent_flows = Some(max);
    }
    if let Some(secs) = args.grace {
        definition.config.shutdown_grace = Duration::from_secs(secs);
    }
    if args.force {
        definition.skip = SkipMode::Never;
    }
    debug!(config = ?definition.config, skip = ?definition.skip, "Effective cascade settings");

    let cancellation = CancellationContext::new();
    cancellation.listen_for_ctrl_c();

    let (tx, mut rx) = progress_channel();
    let cascade = definition.connect(Some(tx), Some(cancellation))?;

    // Spawn the run in the background
    let running = cascade.clone();
    let run_handle = tokio::spawn(async move { running.complete().await });

    // Process events in the foreground
    while let Some(event) = rx.recv().await {
        let finished = matches!(event, CascadeEvent::CascadeCompleted { .. });
        render(&event);
        if finished {
            break;
        }
    }

    let result = run_handle.await?;
    let stats = cascade.stats();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }

    output::info(&format!(
        "{} successful, {} skipped, {} failed, {} stopped, {} not run",
        stats.count(FlowStatus::Successful),
        stats.count(FlowStatus::Skipped),
        stats.count(FlowStatus::Failed),
        stats.count(FlowStatus::Stopped),
        stats.count(FlowStatus::Pending),
    ));

    if let Err(e) = result {
        output::error(&e.to_string());
        std::process::exit(1);
    }
    if stats.status == CascadeStatus::Stopped {
        std::process::exit(130);
    }

    Ok(())
}

fn render(event: &CascadeEvent) {
    match event {
        CascadeEvent::CascadeStarted {
            cascade_name,
            total_flows,
            width,
        } => {
            println!();
            output::header(&format!(
                "Cascade '{}' ({} flows, {} at a time)",
                cascade_name, total_flows, width
            ));
        }

        CascadeEvent::CascadeCompleted {
            status, duration, ..
        } => {
            println!();
            match status {
                CascadeStatus::Successful => output::success(&format!(
                    "Cascade completed successfully in {:.2}s",
                    duration.as_secs_f64()
                )),
                CascadeStatus::Stopped => output::warning(&format!(
                    "Cascade stopped after {:.2}s",
                    duration.as_secs_f64()
                )),
                _ => output::failure(&format!(
                    "Cascade {} after {:.2}s",
                    status,
                    duration.as_secs_f64()
                )),
            }
        }

        CascadeEvent::FlowStarted { flow_name } => {
            output::flow_header(flow_name);
        }

        CascadeEvent::FlowCompleted {
            flow_name,
            status,
            duration,
        } => {
            output::flow_completed(flow_name, *status, *duration);
        }

        CascadeEvent::FlowSkipped { flow_name, reason } => {
            output::warning(&format!("  Flow '{}' skipped: {}", flow_name, reason));
        }

        CascadeEvent::FlowOutput {
            flow_name,
            output,
            is_error,
        } => {
            for line in output.lines() {
                if *is_error {
                    output::flow_error(flow_name, line);
                } else {
                    output::flow_output(flow_name, line);
                }
            }
        }

        CascadeEvent::Log { level, message, .. } => match level {
            LogLevel::Error => output::error(message),
            LogLevel::Warning => output::warning(message),
            _ => output::dim(message),
        },
    }
}

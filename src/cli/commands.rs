//! Command execution: device resolution, config overrides, and dispatch
//!
//! Exactly one pipeline entry point is invoked per parsed invocation.
//! The match over [`Commands`] is exhaustive, so an unmapped command
//! cannot exist once parsing has succeeded.

use clap::CommandFactory;
use tracing::{debug, instrument};

use crate::cli::args::{
    Cli, Commands, CompareArgs, DeviceArgs, EvaluateArgs, TrainArgs, VisualizeArgs,
};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::TrainConfig;
use crate::device::{self, CapabilityProbe, DevicePreference, ResolvedDevice};
use crate::pipeline::{EvaluationRequest, Pipeline, TrainOptions};

/// Map a parsed invocation onto exactly one pipeline entry point.
pub fn execute_command<P: Pipeline>(
    cli: &Cli,
    pipeline: &P,
    probe: &dyn CapabilityProbe,
) -> CliResult<()> {
    match &cli.command {
        Some(Commands::Train(args)) => train(args, pipeline, probe),
        Some(Commands::Evaluate(args)) => evaluate(args, pipeline, probe),
        Some(Commands::Compare(args)) => compare(args, pipeline, probe),
        Some(Commands::Visualize(args)) => visualize(args, pipeline),
        None => {
            // No subcommand is not an error: show usage and stop.
            let _ = Cli::command().print_help();
            println!();
            Ok(())
        }
    }
}

/// Derive the preference once, resolve it, and report the outcome.
fn resolve_device(flags: &DeviceArgs, probe: &dyn CapabilityProbe) -> CliResult<ResolvedDevice> {
    let preference = DevicePreference::from_flags(flags.gpu, flags.cpu)?;
    let caps = probe.query();
    debug!(?preference, ?caps, "resolving device");
    let resolution = device::resolve(preference, &caps);
    if let Some(warning) = &resolution.fallback {
        output::warning(warning);
    }
    output::action("Device", &resolution.device);
    Ok(resolution.device)
}

#[instrument(skip(args, pipeline, probe))]
fn train<P: Pipeline>(
    args: &TrainArgs,
    pipeline: &P,
    probe: &dyn CapabilityProbe,
) -> CliResult<()> {
    let device = resolve_device(&args.device, probe)?;

    let mut config = TrainConfig::default();
    for notice in config.apply_cli_overrides(args.episodes, args.learning_starts) {
        output::info(&notice);
    }

    let opts = TrainOptions {
        render: args.render,
        output_dir: args.output_dir.clone(),
        resume_from: args.model.clone(),
    };
    let outcome = pipeline
        .run_training(&device, &opts, &config)
        .map_err(CliError::Training)?;

    output::success("Training complete!");
    output::detail(&format!(
        "{} episodes, {} steps, final checkpoint: {}",
        outcome.stats.episodes,
        outcome.stats.total_steps,
        outcome.checkpoint.display()
    ));
    Ok(())
}

#[instrument(skip(args, pipeline, probe))]
fn evaluate<P: Pipeline>(
    args: &EvaluateArgs,
    pipeline: &P,
    probe: &dyn CapabilityProbe,
) -> CliResult<()> {
    let device = resolve_device(&args.device, probe)?;

    let request = EvaluationRequest {
        model: args.model.clone(),
        episodes: args.episodes,
        render: args.render,
        record_replay: args.video,
    };
    pipeline
        .run_evaluation(&request, &device)
        .map_err(CliError::Evaluation)?;
    Ok(())
}

#[instrument(skip(args, pipeline, probe))]
fn compare<P: Pipeline>(
    args: &CompareArgs,
    pipeline: &P,
    probe: &dyn CapabilityProbe,
) -> CliResult<()> {
    let device = resolve_device(&args.device, probe)?;

    pipeline
        .run_comparison(&args.models, args.episodes, &device)
        .map_err(CliError::Comparison)
}

#[instrument(skip(args, pipeline))]
fn visualize<P: Pipeline>(args: &VisualizeArgs, pipeline: &P) -> CliResult<()> {
    pipeline
        .render_results(&args.results)
        .map_err(CliError::Visualization)
}

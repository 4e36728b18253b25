//! Dispatcher tests with a counting fake pipeline
//!
//! The pipeline sits behind a trait precisely so these tests can count
//! entry-point calls and capture the config the dispatcher hands over,
//! without touching hardware or the filesystem.

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};

use clap::Parser;
use rstest::rstest;

use rinkrl::cli::args::Cli;
use rinkrl::cli::commands::execute_command;
use rinkrl::cli::error::CliError;
use rinkrl::config::{TrainConfig, DEFAULT_EPISODES};
use rinkrl::device::{CapabilityProbe, CapabilityReport, ResolvedDevice};
use rinkrl::exitcode;
use rinkrl::pipeline::{
    EvaluationRequest, EvaluationResults, EvaluationSummary, Pipeline, PipelineError,
    PipelineResult, TrainOptions, TrainingOutcome, TrainingStats,
};

/// Developer-laptop capability report: nothing but a CPU.
struct NoHardware;

impl CapabilityProbe for NoHardware {
    fn query(&self) -> CapabilityReport {
        CapabilityReport::default()
    }
}

#[derive(Default)]
struct CountingPipeline {
    train_calls: Cell<u32>,
    eval_calls: Cell<u32>,
    compare_calls: Cell<u32>,
    render_calls: Cell<u32>,
    seen_config: RefCell<Option<TrainConfig>>,
    seen_models: RefCell<Vec<PathBuf>>,
    seen_request: RefCell<Option<EvaluationRequest>>,
    fail_evaluation: bool,
}

impl CountingPipeline {
    fn failing() -> Self {
        Self {
            fail_evaluation: true,
            ..Self::default()
        }
    }

    fn total_calls(&self) -> u32 {
        self.train_calls.get()
            + self.eval_calls.get()
            + self.compare_calls.get()
            + self.render_calls.get()
    }
}

impl Pipeline for CountingPipeline {
    fn run_training(
        &self,
        _device: &ResolvedDevice,
        _opts: &TrainOptions,
        config: &TrainConfig,
    ) -> PipelineResult<TrainingOutcome> {
        self.train_calls.set(self.train_calls.get() + 1);
        *self.seen_config.borrow_mut() = Some(config.clone());
        Ok(TrainingOutcome {
            checkpoint: PathBuf::from("final.safetensors"),
            stats: TrainingStats {
                episodes: config.episodes,
                total_steps: 0,
                best_avg_reward: 0.0,
                episode_rewards: Vec::new(),
            },
        })
    }

    fn run_evaluation(
        &self,
        request: &EvaluationRequest,
        _device: &ResolvedDevice,
    ) -> PipelineResult<EvaluationResults> {
        self.eval_calls.set(self.eval_calls.get() + 1);
        *self.seen_request.borrow_mut() = Some(request.clone());
        if self.fail_evaluation {
            return Err(PipelineError::Checkpoint {
                path: request.model.clone(),
                reason: "corrupt checkpoint".to_string(),
            });
        }
        Ok(EvaluationResults {
            model: request.model.clone(),
            episodes: request.episodes,
            records: Vec::new(),
            summary: EvaluationSummary {
                mean_reward: 0.0,
                min_reward: 0.0,
                max_reward: 0.0,
                mean_steps: 0.0,
            },
            generated_at: "2026-01-01T00:00:00+00:00".to_string(),
        })
    }

    fn run_comparison(
        &self,
        models: &[PathBuf],
        _episodes: u32,
        _device: &ResolvedDevice,
    ) -> PipelineResult<()> {
        self.compare_calls.set(self.compare_calls.get() + 1);
        *self.seen_models.borrow_mut() = models.to_vec();
        Ok(())
    }

    fn render_results(&self, _results: &Path) -> PipelineResult<()> {
        self.render_calls.set(self.render_calls.get() + 1);
        Ok(())
    }
}

fn cli(args: &[&str]) -> Cli {
    Cli::try_parse_from(args.iter().copied()).unwrap()
}

/// Conflicting device flags abort before any pipeline entry point runs.
#[rstest]
#[case::train(&["rinkrl", "train", "--gpu", "--cpu"])]
#[case::evaluate(&["rinkrl", "evaluate", "m.safetensors", "--gpu", "--cpu"])]
#[case::compare(&["rinkrl", "compare", "a.safetensors", "--gpu", "--cpu"])]
fn given_conflicting_flags_when_executed_then_zero_dispatches(#[case] args: &[&str]) {
    let pipeline = CountingPipeline::default();

    let err = execute_command(&cli(args), &pipeline, &NoHardware).unwrap_err();

    assert!(matches!(err, CliError::Device(_)));
    assert_eq!(err.exit_code(), exitcode::USAGE);
    assert_eq!(pipeline.total_calls(), 0);
}

#[test]
fn given_no_subcommand_when_executed_then_usage_and_zero_dispatches() {
    let pipeline = CountingPipeline::default();

    execute_command(&cli(&["rinkrl"]), &pipeline, &NoHardware).unwrap();

    assert_eq!(pipeline.total_calls(), 0);
}

#[test]
fn given_train_with_episode_override_when_executed_then_pipeline_sees_it() {
    let pipeline = CountingPipeline::default();

    execute_command(
        &cli(&["rinkrl", "train", "--episodes", "500"]),
        &pipeline,
        &NoHardware,
    )
    .unwrap();

    assert_eq!(pipeline.train_calls.get(), 1);
    let config = pipeline.seen_config.borrow().clone().unwrap();
    assert_eq!(config.episodes, 500);
    // Untouched fields keep their compiled-in defaults.
    assert_eq!(config.learning_starts, TrainConfig::default().learning_starts);
}

#[test]
fn given_train_without_overrides_when_executed_then_default_config() {
    let pipeline = CountingPipeline::default();

    execute_command(&cli(&["rinkrl", "train"]), &pipeline, &NoHardware).unwrap();

    let config = pipeline.seen_config.borrow().clone().unwrap();
    assert_eq!(config, TrainConfig::default());
    assert_eq!(config.episodes, DEFAULT_EPISODES);
}

#[test]
fn given_failing_evaluation_when_executed_then_reported_and_nonzero_exit() {
    let pipeline = CountingPipeline::failing();

    let err = execute_command(
        &cli(&["rinkrl", "evaluate", "model.safetensors", "--episodes", "10"]),
        &pipeline,
        &NoHardware,
    )
    .unwrap_err();

    assert!(err.to_string().starts_with("Evaluation failed"));
    assert_ne!(err.exit_code(), exitcode::OK);
    assert_eq!(pipeline.eval_calls.get(), 1);
}

#[test]
fn given_evaluate_flags_when_executed_then_request_forwarded() {
    let pipeline = CountingPipeline::default();

    execute_command(
        &cli(&[
            "rinkrl",
            "evaluate",
            "model.safetensors",
            "--episodes",
            "3",
            "--video",
        ]),
        &pipeline,
        &NoHardware,
    )
    .unwrap();

    let request = pipeline.seen_request.borrow().clone().unwrap();
    assert_eq!(request.model, PathBuf::from("model.safetensors"));
    assert_eq!(request.episodes, 3);
    assert!(request.record_replay);
    assert!(!request.render);
}

#[test]
fn given_compare_when_executed_then_models_forwarded_in_order() {
    let pipeline = CountingPipeline::default();

    execute_command(
        &cli(&["rinkrl", "compare", "a.safetensors", "b.safetensors", "c.safetensors"]),
        &pipeline,
        &NoHardware,
    )
    .unwrap();

    assert_eq!(pipeline.compare_calls.get(), 1);
    assert_eq!(
        *pipeline.seen_models.borrow(),
        vec![
            PathBuf::from("a.safetensors"),
            PathBuf::from("b.safetensors"),
            PathBuf::from("c.safetensors"),
        ]
    );
}

#[test]
fn given_visualize_when_executed_then_render_called_once() {
    let pipeline = CountingPipeline::default();

    execute_command(
        &cli(&["rinkrl", "visualize", "run.eval.json"]),
        &pipeline,
        &NoHardware,
    )
    .unwrap();

    assert_eq!(pipeline.render_calls.get(), 1);
    assert_eq!(pipeline.total_calls(), 1);
}

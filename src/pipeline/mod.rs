//! Execution pipelines behind the dispatcher
//!
//! [`Pipeline`] is the narrow contract the CLI dispatches through: one
//! entry point per subcommand. [`DqnPipeline`] is the production
//! implementation; tests substitute counting fakes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::TrainConfig;
use crate::device::ResolvedDevice;

pub mod agent;
pub mod env;
pub mod evaluate;
pub mod train;
pub mod visualize;

/// Pipeline-level errors (checkpoint loading, artifacts, tensor math).
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("cannot load checkpoint {}: {reason}", path.display())]
    Checkpoint { path: PathBuf, reason: String },

    #[error("bad results file {}: {reason}", path.display())]
    Results { path: PathBuf, reason: String },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Tensor(#[from] candle_core::Error),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Training parameters that come from the command line rather than the
/// config: where to write, whether to render, what to resume from.
#[derive(Debug, Clone, Default)]
pub struct TrainOptions {
    pub render: bool,
    pub output_dir: Option<PathBuf>,
    pub resume_from: Option<PathBuf>,
}

/// What the final checkpoint is and what happened along the way.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub checkpoint: PathBuf,
    pub stats: TrainingStats,
}

/// Persisted as `training_stats.json` in the run directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingStats {
    pub episodes: u32,
    pub total_steps: u64,
    pub best_avg_reward: f64,
    pub episode_rewards: Vec<f64>,
}

/// One `evaluate` invocation, minus the device.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub model: PathBuf,
    pub episodes: u32,
    pub render: bool,
    pub record_replay: bool,
}

/// Per-episode evaluation record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub episode: u32,
    pub reward: f64,
    pub steps: u32,
    pub goals_for: u32,
    pub goals_against: u32,
}

/// Aggregates over an evaluation's episodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub mean_reward: f64,
    pub min_reward: f64,
    pub max_reward: f64,
    pub mean_steps: f64,
}

/// The serialized results artifact (`<model>.eval.json`), consumed by
/// `visualize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResults {
    pub model: PathBuf,
    pub episodes: u32,
    pub records: Vec<EpisodeRecord>,
    pub summary: EvaluationSummary,
    pub generated_at: String,
}

/// The collaborator contract the dispatcher calls through.
pub trait Pipeline {
    fn run_training(
        &self,
        device: &ResolvedDevice,
        opts: &TrainOptions,
        config: &TrainConfig,
    ) -> PipelineResult<TrainingOutcome>;

    /// An `Err` is the absent-on-failure state: the dispatcher reports
    /// it as "Evaluation failed" and exits non-zero.
    fn run_evaluation(
        &self,
        request: &EvaluationRequest,
        device: &ResolvedDevice,
    ) -> PipelineResult<EvaluationResults>;

    /// Reports its ranking internally.
    fn run_comparison(
        &self,
        models: &[PathBuf],
        episodes: u32,
        device: &ResolvedDevice,
    ) -> PipelineResult<()>;

    fn render_results(&self, results: &Path) -> PipelineResult<()>;
}

/// Production pipeline: the built-in rink environment plus the candle
/// DQN agent.
pub struct DqnPipeline;

impl Pipeline for DqnPipeline {
    fn run_training(
        &self,
        device: &ResolvedDevice,
        opts: &TrainOptions,
        config: &TrainConfig,
    ) -> PipelineResult<TrainingOutcome> {
        train::run(device, opts, config)
    }

    fn run_evaluation(
        &self,
        request: &EvaluationRequest,
        device: &ResolvedDevice,
    ) -> PipelineResult<EvaluationResults> {
        evaluate::run(request, device)
    }

    fn run_comparison(
        &self,
        models: &[PathBuf],
        episodes: u32,
        device: &ResolvedDevice,
    ) -> PipelineResult<()> {
        evaluate::compare(models, episodes, device)
    }

    fn render_results(&self, results: &Path) -> PipelineResult<()> {
        visualize::render(results)
    }
}

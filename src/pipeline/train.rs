//! Training pipeline: episode loop, checkpoints, stats artifact
//!
//! Each run gets its own output directory (timestamped under `runs/` by
//! default) holding a snapshot of the effective config, periodic and
//! best checkpoints, and a `training_stats.json` artifact.

use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::cli::output;
use crate::config::TrainConfig;
use crate::device::ResolvedDevice;
use crate::pipeline::agent::{AgentConfig, DqnAgent, Transition};
use crate::pipeline::env::{Action, EnvConfig, RinkEnv};
use crate::pipeline::{
    PipelineError, PipelineResult, TrainOptions, TrainingOutcome, TrainingStats,
};

/// Episodes in the rolling reward window.
const AVG_WINDOW: usize = 100;

pub fn run(
    device: &ResolvedDevice,
    opts: &TrainOptions,
    config: &TrainConfig,
) -> PipelineResult<TrainingOutcome> {
    let run_dir = match &opts.output_dir {
        Some(dir) => dir.clone(),
        None => PathBuf::from(format!(
            "runs/train_{}",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        )),
    };
    fs::create_dir_all(&run_dir).map_err(|e| PipelineError::io(&run_dir, e))?;

    // Snapshot the effective config; it is read-only from here on.
    write_json(&run_dir.join("config.json"), config)?;

    let candle_device = device.to_candle()?;
    let mut env = RinkEnv::new(EnvConfig {
        period_length: config.max_steps_per_episode,
    });
    let mut agent = DqnAgent::new(&candle_device, AgentConfig::from_train_config(config))?;

    if let Some(checkpoint) = &opts.resume_from {
        agent.load(checkpoint).map_err(|e| PipelineError::Checkpoint {
            path: checkpoint.clone(),
            reason: e.to_string(),
        })?;
        info!(checkpoint = %checkpoint.display(), "resumed from checkpoint");
        output::action("Resumed", &checkpoint.display());
    }

    output::header(&format!("Training on {device} for {} episodes", config.episodes));
    debug!(?config, run_dir = %run_dir.display(), "starting training");

    let mut total_steps: u64 = 0;
    let mut best_avg = f64::NEG_INFINITY;
    let mut recent: VecDeque<f64> = VecDeque::with_capacity(AVG_WINDOW);
    let mut episode_rewards = Vec::with_capacity(config.episodes as usize);

    for episode in 1..=config.episodes {
        let mut state = env.reset();
        let mut ep_reward = 0.0f64;
        let mut ep_loss = 0.0f32;
        let mut loss_count = 0u32;

        loop {
            let action = agent.select_action(&state)?;
            let result = env.step(Action::from_index(action));
            agent.remember(Transition {
                state,
                action,
                reward: result.reward,
                next_state: result.state,
                done: result.done,
            });
            state = result.state;
            ep_reward += f64::from(result.reward);
            total_steps += 1;
            agent.total_env_steps = total_steps;

            let loss = agent.train_step()?;
            if loss > 0.0 {
                ep_loss += loss;
                loss_count += 1;
            }

            if opts.render {
                println!("{}", env.render());
            }
            if result.done {
                break;
            }
        }

        recent.push_back(ep_reward);
        if recent.len() > AVG_WINDOW {
            recent.pop_front();
        }
        let avg: f64 = recent.iter().sum::<f64>() / recent.len() as f64;
        episode_rewards.push(ep_reward);

        if recent.len() >= AVG_WINDOW && avg > best_avg {
            best_avg = avg;
            agent.save(&run_dir.join("best.safetensors"))?;
        }

        if episode % config.checkpoint_interval == 0 {
            agent.save(&run_dir.join(format!("checkpoint_ep{episode}.safetensors")))?;
        }

        if episode % 10 == 0 || episode == config.episodes {
            let avg_loss = if loss_count > 0 {
                ep_loss / loss_count as f32
            } else {
                0.0
            };
            output::info(&format!(
                "Ep {episode:>5}/{} | steps {total_steps:>8} | R {ep_reward:>7.2} | \
                 avg{} {avg:>7.2} | score {}:{} | eps {:.3} | loss {avg_loss:.5}",
                config.episodes,
                AVG_WINDOW,
                env.goals_for,
                env.goals_against,
                agent.epsilon,
            ));
        }
    }

    let checkpoint = run_dir.join("final.safetensors");
    agent.save(&checkpoint)?;

    let stats = TrainingStats {
        episodes: config.episodes,
        total_steps,
        best_avg_reward: if best_avg.is_finite() { best_avg } else { 0.0 },
        episode_rewards,
    };
    write_json(&run_dir.join("training_stats.json"), &stats)?;
    info!(checkpoint = %checkpoint.display(), total_steps, "training finished");

    Ok(TrainingOutcome { checkpoint, stats })
}

pub(crate) fn write_json<T: serde::Serialize>(
    path: &std::path::Path,
    value: &T,
) -> PipelineResult<()> {
    let file = fs::File::create(path).map_err(|e| PipelineError::io(path, e))?;
    serde_json::to_writer_pretty(file, value).map_err(|e| PipelineError::Results {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

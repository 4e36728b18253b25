//! Evaluation and comparison pipelines
//!
//! Evaluation loads a checkpoint, plays greedy episodes, prints a
//! summary, and writes a `<model>.eval.json` artifact for `visualize`.
//! Comparison evaluates several checkpoints and prints a ranked table.

use std::fs;
use std::path::{Path, PathBuf};

use colored::Colorize;
use tracing::{debug, info};

use crate::cli::output;
use crate::config::TrainConfig;
use crate::device::ResolvedDevice;
use crate::pipeline::agent::{AgentConfig, DqnAgent};
use crate::pipeline::env::{Action, EnvConfig, RinkEnv};
use crate::pipeline::train::write_json;
use crate::pipeline::{
    EpisodeRecord, EvaluationRequest, EvaluationResults, EvaluationSummary, PipelineError,
    PipelineResult,
};

pub fn run(request: &EvaluationRequest, device: &ResolvedDevice) -> PipelineResult<EvaluationResults> {
    output::header(&format!(
        "Evaluating {} for {} episodes on {device}",
        request.model.display(),
        request.episodes
    ));

    let agent = load_agent(&request.model, device)?;
    let mut env = RinkEnv::new(EnvConfig::default());

    let mut records = Vec::with_capacity(request.episodes as usize);
    let mut transcript = if request.record_replay {
        Some(String::new())
    } else {
        None
    };

    for episode in 1..=request.episodes {
        let record = play_episode(
            &mut env,
            &agent,
            episode,
            request.render,
            // Only the first episode goes into the replay transcript.
            if episode == 1 { transcript.as_mut() } else { None },
        )?;
        output::info(&format!(
            "Episode {:>3}: reward={:>7.2}, steps={}, goals {}:{}",
            record.episode, record.reward, record.steps, record.goals_for, record.goals_against
        ));
        records.push(record);
    }

    let results = EvaluationResults {
        model: request.model.clone(),
        episodes: request.episodes,
        summary: summarize(&records),
        records,
        generated_at: chrono::Local::now().to_rfc3339(),
    };

    output::header("Evaluation summary");
    output::detail(&format!("mean reward {:.2}", results.summary.mean_reward));
    output::detail(&format!(
        "min/max reward {:.2} / {:.2}",
        results.summary.min_reward, results.summary.max_reward
    ));
    output::detail(&format!("mean steps {:.1}", results.summary.mean_steps));

    let artifact = request.model.with_extension("eval.json");
    write_json(&artifact, &results)?;
    output::action("Results", &artifact.display());

    if let Some(transcript) = transcript {
        let replay_path = request.model.with_extension("replay.txt");
        fs::write(&replay_path, transcript).map_err(|e| PipelineError::io(&replay_path, e))?;
        output::action("Replay", &replay_path.display());
    }

    info!(model = %request.model.display(), episodes = request.episodes, "evaluation finished");
    Ok(results)
}

/// Evaluate each checkpoint and print a table ranked by mean reward.
pub fn compare(models: &[PathBuf], episodes: u32, device: &ResolvedDevice) -> PipelineResult<()> {
    let mut ranked = Vec::with_capacity(models.len());
    for model in models {
        output::action("Evaluating", &model.display());
        let agent = load_agent(model, device)?;
        let mut env = RinkEnv::new(EnvConfig::default());
        let mut records = Vec::with_capacity(episodes as usize);
        for episode in 1..=episodes {
            records.push(play_episode(&mut env, &agent, episode, false, None)?);
        }
        ranked.push((model.clone(), summarize(&records)));
    }

    ranked.sort_by(|a, b| b.1.mean_reward.total_cmp(&a.1.mean_reward));

    output::header(&format!("Comparison over {episodes} episodes"));
    println!(
        "{:<4} {:<40} {:>10} {:>10} {:>10}",
        "#".bold(),
        "model".bold(),
        "mean".bold(),
        "max".bold(),
        "steps".bold()
    );
    for (rank, (model, summary)) in ranked.iter().enumerate() {
        println!(
            "{:<4} {:<40} {:>10.2} {:>10.2} {:>10.1}",
            rank + 1,
            model.display(),
            summary.mean_reward,
            summary.max_reward,
            summary.mean_steps
        );
    }
    Ok(())
}

/// Load a checkpoint into a fresh greedy agent. A missing or malformed
/// file is the collaborator-failure path the dispatcher reports.
fn load_agent(model: &Path, device: &ResolvedDevice) -> PipelineResult<DqnAgent> {
    if !model.is_file() {
        return Err(PipelineError::Checkpoint {
            path: model.to_path_buf(),
            reason: "no such file".to_string(),
        });
    }
    let candle_device = device.to_candle()?;
    let config = AgentConfig::from_train_config(&TrainConfig::default());
    let mut agent = DqnAgent::new(&candle_device, config)?;
    agent.load(model).map_err(|e| PipelineError::Checkpoint {
        path: model.to_path_buf(),
        reason: e.to_string(),
    })?;
    agent.epsilon = 0.0;
    debug!(model = %model.display(), "checkpoint loaded");
    Ok(agent)
}

fn play_episode(
    env: &mut RinkEnv,
    agent: &DqnAgent,
    episode: u32,
    render: bool,
    mut transcript: Option<&mut String>,
) -> PipelineResult<EpisodeRecord> {
    let mut state = env.reset();
    let mut reward = 0.0f64;
    let mut steps = 0u32;

    loop {
        let action = agent.select_action(&state)?;
        let result = env.step(Action::from_index(action));
        state = result.state;
        reward += f64::from(result.reward);
        steps += 1;

        if render {
            println!("{}", env.render());
        }
        if let Some(transcript) = transcript.as_mut() {
            transcript.push_str(&env.render());
            transcript.push('\n');
        }
        if result.done {
            break;
        }
    }

    Ok(EpisodeRecord {
        episode,
        reward,
        steps,
        goals_for: env.goals_for,
        goals_against: env.goals_against,
    })
}

fn summarize(records: &[EpisodeRecord]) -> EvaluationSummary {
    let count = records.len().max(1) as f64;
    let min = records
        .iter()
        .map(|r| r.reward)
        .fold(f64::INFINITY, f64::min);
    let max = records
        .iter()
        .map(|r| r.reward)
        .fold(f64::NEG_INFINITY, f64::max);
    EvaluationSummary {
        mean_reward: records.iter().map(|r| r.reward).sum::<f64>() / count,
        min_reward: if min.is_finite() { min } else { 0.0 },
        max_reward: if max.is_finite() { max } else { 0.0 },
        mean_steps: records.iter().map(|r| f64::from(r.steps)).sum::<f64>() / count,
    }
}

//! Terminal rendering of an evaluation results artifact

use std::fs;
use std::path::Path;

use colored::Colorize;

use crate::cli::output;
use crate::pipeline::{EvaluationResults, PipelineError, PipelineResult};

const BAR_WIDTH: f64 = 40.0;

/// Read a `.eval.json` artifact and draw per-episode reward bars plus
/// the stored summary.
pub fn render(path: &Path) -> PipelineResult<()> {
    let file = fs::File::open(path).map_err(|e| PipelineError::io(path, e))?;
    let results: EvaluationResults =
        serde_json::from_reader(file).map_err(|e| PipelineError::Results {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    output::header(&format!(
        "Evaluation of {} ({} episodes, {})",
        results.model.display(),
        results.episodes,
        results.generated_at
    ));

    let scale = results
        .records
        .iter()
        .map(|r| r.reward.abs())
        .fold(0.0f64, f64::max)
        .max(1e-9);

    for record in &results.records {
        let len = ((record.reward.abs() / scale) * BAR_WIDTH).round() as usize;
        let bar = "█".repeat(len.max(1));
        let bar = if record.reward < 0.0 {
            bar.red()
        } else {
            bar.green()
        };
        println!(
            "{:>4} {} {:>7.2}  ({}:{} in {} steps)",
            record.episode, bar, record.reward, record.goals_for, record.goals_against,
            record.steps
        );
    }

    output::header("Summary");
    output::detail(&format!("mean reward {:.2}", results.summary.mean_reward));
    output::detail(&format!(
        "min/max reward {:.2} / {:.2}",
        results.summary.min_reward, results.summary.max_reward
    ));
    output::detail(&format!("mean steps {:.1}", results.summary.mean_steps));
    Ok(())
}

//! Training configuration: compiled-in defaults plus CLI overrides
//!
//! `TrainConfig` is initialized from compiled-in defaults at process
//! start. For the `train` command only, CLI flags may override individual
//! fields before dispatch; each applied change produces one user-facing
//! notice. The config is read-only once the training pipeline runs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default number of training episodes.
pub const DEFAULT_EPISODES: u32 = 1000;

/// Default number of environment steps collected before learning begins.
pub const DEFAULT_LEARNING_STARTS: u32 = 5000;

/// Process-wide training parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainConfig {
    /// Number of training episodes
    pub episodes: u32,
    /// Environment steps collected before gradient updates start
    pub learning_starts: u32,
    /// Replay buffer capacity
    pub replay_capacity: usize,
    /// Minibatch size per gradient step
    pub batch_size: usize,
    /// Discount factor
    pub gamma: f64,
    /// AdamW learning rate
    pub learning_rate: f64,
    /// Initial exploration rate
    pub epsilon_start: f64,
    /// Final exploration rate
    pub epsilon_end: f64,
    /// Steps over which epsilon anneals linearly
    pub epsilon_decay_steps: u32,
    /// Step cap per episode
    pub max_steps_per_episode: u32,
    /// Episodes between periodic checkpoints
    pub checkpoint_interval: u32,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            episodes: DEFAULT_EPISODES,
            learning_starts: DEFAULT_LEARNING_STARTS,
            replay_capacity: 100_000,
            batch_size: 64,
            gamma: 0.99,
            learning_rate: 1e-3,
            epsilon_start: 1.0,
            epsilon_end: 0.05,
            epsilon_decay_steps: 50_000,
            max_steps_per_episode: 500,
            checkpoint_interval: 100,
        }
    }
}

/// One applied override, kept for the user-facing notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideNotice {
    pub field: &'static str,
    pub old: u32,
    pub new: u32,
}

impl fmt::Display for OverrideNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Overriding {} from {} to {}",
            self.field, self.old, self.new
        )
    }
}

impl TrainConfig {
    /// Apply CLI overrides in place.
    ///
    /// Only values that differ from the compiled-in default mutate the
    /// config and produce a notice; absent flags leave their field
    /// untouched.
    pub fn apply_cli_overrides(
        &mut self,
        episodes: Option<u32>,
        learning_starts: Option<u32>,
    ) -> Vec<OverrideNotice> {
        let mut notices = Vec::new();
        if let Some(episodes) = episodes {
            if episodes != DEFAULT_EPISODES {
                notices.push(OverrideNotice {
                    field: "training episodes",
                    old: self.episodes,
                    new: episodes,
                });
                self.episodes = episodes;
            }
        }
        if let Some(learning_starts) = learning_starts {
            if learning_starts != DEFAULT_LEARNING_STARTS {
                notices.push(OverrideNotice {
                    field: "learning start threshold",
                    old: self.learning_starts,
                    new: learning_starts,
                });
                self.learning_starts = learning_starts;
            }
        }
        notices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_differing_episodes_when_applied_then_one_notice_and_mutation() {
        let mut config = TrainConfig::default();
        let notices = config.apply_cli_overrides(Some(500), None);

        assert_eq!(config.episodes, 500);
        assert_eq!(notices.len(), 1);
        assert_eq!(
            notices[0].to_string(),
            format!("Overriding training episodes from {DEFAULT_EPISODES} to 500")
        );
    }

    #[test]
    fn given_default_value_when_applied_then_no_notice() {
        let mut config = TrainConfig::default();
        let notices = config.apply_cli_overrides(Some(DEFAULT_EPISODES), None);

        assert!(notices.is_empty());
        assert_eq!(config, TrainConfig::default());
    }

    #[test]
    fn given_no_flags_when_applied_then_config_untouched() {
        let mut config = TrainConfig::default();
        let notices = config.apply_cli_overrides(None, None);

        assert!(notices.is_empty());
        assert_eq!(config, TrainConfig::default());
    }

    #[test]
    fn given_both_overrides_when_applied_then_two_notices() {
        let mut config = TrainConfig::default();
        let notices = config.apply_cli_overrides(Some(50), Some(100));

        assert_eq!(config.episodes, 50);
        assert_eq!(config.learning_starts, 100);
        assert_eq!(notices.len(), 2);
    }
}

//! CLI argument definitions using clap
//!
//! Single source of truth for what each subcommand accepts: parsing and
//! help generation both consult this model. Adding a command means one
//! `Commands` variant here and one dispatcher arm in `cli::commands`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// DQN for a simplified ice-hockey rink: train, evaluate, compare, and visualize agents
#[derive(Parser, Debug)]
#[command(name = "rinkrl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-d: info, -dd: debug, -ddd: trace)
    #[arg(short = 'd', long = "debug", action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    /// Generate shell completions and exit
    #[arg(long = "generate", value_enum, value_name = "SHELL")]
    pub generator: Option<clap_complete::Shell>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a DQN agent
    Train(TrainArgs),

    /// Evaluate a trained model
    Evaluate(EvaluateArgs),

    /// Compare multiple models
    Compare(CompareArgs),

    /// Visualize evaluation results
    Visualize(VisualizeArgs),
}

/// Device forcing flags shared by the device-aware commands.
/// `--gpu` and `--cpu` are mutually exclusive; the conflict is detected
/// by device resolution, not by the parser.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct DeviceArgs {
    /// Force GPU usage
    #[arg(long)]
    pub gpu: bool,

    /// Force CPU usage
    #[arg(long)]
    pub cpu: bool,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory to save outputs (default: runs/train_<timestamp>)
    #[arg(long = "output_dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Number of episodes to train (default: compiled-in config)
    #[arg(long, value_name = "N")]
    pub episodes: Option<u32>,

    /// Steps before training begins (default: compiled-in config)
    #[arg(long = "learning_starts", value_name = "N")]
    pub learning_starts: Option<u32>,

    /// Render training episodes in the terminal
    #[arg(long)]
    pub render: bool,

    #[command(flatten)]
    pub device: DeviceArgs,

    /// Path to a pre-trained model to continue training
    #[arg(long, value_name = "PATH")]
    pub model: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Path to the model checkpoint (.safetensors)
    pub model: PathBuf,

    /// Number of episodes
    #[arg(long, default_value_t = 10, value_name = "N")]
    pub episodes: u32,

    /// Render the rink while evaluating
    #[arg(long)]
    pub render: bool,

    /// Record a replay transcript of the first episode
    #[arg(long)]
    pub video: bool,

    #[command(flatten)]
    pub device: DeviceArgs,
}

#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Paths to model checkpoints (.safetensors)
    #[arg(required = true, num_args = 1..)]
    pub models: Vec<PathBuf>,

    /// Number of episodes per model
    #[arg(long, default_value_t = 10, value_name = "N")]
    pub episodes: u32,

    #[command(flatten)]
    pub device: DeviceArgs,
}

#[derive(Args, Debug)]
pub struct VisualizeArgs {
    /// Path to an evaluation results file (.eval.json)
    pub results: PathBuf,
}

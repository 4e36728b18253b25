//! CLI-level errors (wraps device and pipeline errors)

use thiserror::Error;

use crate::device::DeviceError;
use crate::exitcode;
use crate::pipeline::PipelineError;

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Device(#[from] DeviceError),

    #[error("Training failed: {0}")]
    Training(#[source] PipelineError),

    #[error("Evaluation failed: {0}")]
    Evaluation(#[source] PipelineError),

    #[error("Comparison failed: {0}")]
    Comparison(#[source] PipelineError),

    #[error("Cannot render results: {0}")]
    Visualization(#[source] PipelineError),
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Device(_) => exitcode::USAGE,
            CliError::Training(e)
            | CliError::Evaluation(e)
            | CliError::Comparison(e)
            | CliError::Visualization(e) => match e {
                PipelineError::Checkpoint { .. } => exitcode::NOINPUT,
                PipelineError::Results { .. } => exitcode::DATAERR,
                PipelineError::Io { .. } => exitcode::IOERR,
                PipelineError::Tensor(_) => exitcode::SOFTWARE,
            },
        }
    }
}

// CLI error type and user-facing messages

use stencil_engine::EngineError;
use thiserror::Error;

pub type CliResult<T> = Result<T, CliError>;

/// Errors surfaced by the CLI layer
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid answers input: {0}")]
    Answers(String),
}

impl CliError {
    /// Message shown to the user on failure
    pub fn user_message(&self) -> String {
        match self {
            CliError::Engine(EngineError::Validation(violations)) => {
                let mut lines = vec!["some answers were rejected:".to_string()];
                for violation in violations {
                    lines.push(format!("  - {}", violation));
                }
                lines.join("\n")
            }
            other => other.to_string(),
        }
    }
}

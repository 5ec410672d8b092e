use thiserror::Error;

use mp_storage::StorageError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Provider(#[from] mp_core::Error),

    #[error("Failed to store artifact: {0}")]
    Storage(#[from] StorageError),

    #[error("Agent {agent} did not return valid JSON even after retry: {reason}")]
    Unparseable {
        agent: String,
        reason: String,
        raw_output: String,
    },

    #[error("Validation failed after {attempts} attempts: {last_error}")]
    Exhausted {
        attempts: usize,
        last_error: String,
        raw_output: String,
    },
}

impl PipelineError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// The last model output, for errors caused by malformed output.
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            Self::Unparseable { raw_output, .. } | Self::Exhausted { raw_output, .. } => {
                Some(raw_output)
            }
            _ => None,
        }
    }

    /// Whether the caller, not the pipeline, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Provider(err.into())
    }
}

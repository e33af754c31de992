//! Completion errors.

use thiserror::Error;

use crate::prompt::PromptId;

/// Errors from a completion call or from turning its reply into data.
#[derive(Debug, Error)]
pub enum LlmError {
    /// No provider is configured, or a test double has nothing to say.
    #[error("completion service unavailable: {0}")]
    Unavailable(String),

    /// Every transport attempt failed.
    #[error("completion failed after {attempts} attempts: {last_error}")]
    Provider { attempts: u32, last_error: String },

    /// The reply contained no usable JSON.
    #[error("reply is not JSON: {0}")]
    Unparseable(String),

    /// The reply was JSON of the wrong shape.
    #[error("reply has the wrong shape: {0}")]
    UnexpectedShape(String),

    #[error("prompt '{0}' not loaded")]
    PromptNotLoaded(PromptId),

    /// A prompt override file could not be used.
    #[error("prompt override rejected: {0}")]
    PromptOverride(String),
}

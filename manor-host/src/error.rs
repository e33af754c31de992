//! Error types for the host.

use manor_core::error::StoreError;
use manor_llm::LlmError;
use thiserror::Error;

/// Errors raised while wiring the runtime together.
#[derive(Error, Debug)]
pub enum HostError {
    /// Configuration could not be assembled.
    #[error("configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    /// The configured provider is not one we know.
    #[error("unknown LLM provider '{0}' (expected openai, ollama or none)")]
    UnknownProvider(String),

    /// The API key variable is unset.
    #[error("environment variable {0} is not set")]
    MissingApiKey(String),

    /// The world file could not be loaded.
    #[error("world file {path}: {reason}")]
    WorldFile {
        /// Path as given.
        path: String,
        /// What went wrong.
        reason: String,
    },

    /// The world-state server could not be reached.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Prompt loading failed.
    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, HostError>;

//! Error types for the MANOR core library.
//!
//! Inside a turn almost nothing is fatal: validation, unknown tools and store
//! rejections are rendered into [`MutationFailure`] strings and carried as
//! data. The remaining types surface at pipeline boundaries.

use manor_llm::LlmError;
use thiserror::Error;

/// A mutation's arguments were missing or malformed. Never reaches the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required argument is absent or blank.
    #[error("{tool} requires '{field}' parameter")]
    MissingField {
        /// Tool name.
        tool: &'static str,
        /// Argument name.
        field: &'static str,
    },

    /// An argument is present but not a string.
    #[error("{tool} expects '{field}' to be a string")]
    WrongType {
        /// Tool name.
        tool: &'static str,
        /// Argument name.
        field: &'static str,
    },

    /// The arguments are individually fine but make no sense together.
    #[error("{tool} {reason}")]
    Invalid {
        /// Tool name.
        tool: &'static str,
        /// What is wrong.
        reason: &'static str,
    },
}

/// The planner named a tool the registry does not know.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown tool: {0}")]
pub struct UnknownToolError(pub String);

/// Failure talking to the world-state store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store answered with an error payload.
    #[error("{0}")]
    Rejected(String),

    /// The store could not be reached or the connection broke.
    #[error("store transport failed: {0}")]
    Transport(String),

    /// The store answered with something that could not be decoded.
    #[error("store response malformed: {0}")]
    Malformed(String),

    /// The request context was cancelled.
    #[error("request cancelled")]
    Cancelled,
}

/// The store rejected or failed an otherwise valid mutation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// Store-side failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The acting NPC is not in the cached snapshot.
    #[error("unknown actor '{0}'")]
    UnknownActor(String),
}

/// The planner could not produce a plan.
#[derive(Error, Debug)]
pub enum PlanningError {
    /// Completion call failed.
    #[error("planner unavailable: {0}")]
    Planner(#[from] LlmError),

    /// The store's tool catalog could not be listed.
    #[error("tool catalog unavailable: {0}")]
    Catalog(#[source] StoreError),

    /// The request context was cancelled.
    #[error("planning cancelled")]
    Cancelled,
}

/// The post-mutation world-state refetch failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("world state sync failed: {0}")]
pub struct SyncError(#[from] pub StoreError);

/// One failed mutation, rendered into the executor's failure list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MutationFailure {
    /// Lookup failed.
    #[error(transparent)]
    UnknownTool(#[from] UnknownToolError),

    /// Validation failed; the store was not contacted.
    #[error("Invalid args for {tool}: {source}")]
    InvalidArgs {
        /// Tool name as the planner wrote it.
        tool: String,
        /// Why validation failed.
        source: ValidationError,
    },

    /// The store call failed.
    #[error("Failed to execute {tool}: {source}")]
    Execution {
        /// Tool name.
        tool: String,
        /// Why execution failed.
        source: ExecutionError,
    },
}

/// Top-level error type for MANOR operations outside a turn's data path.
#[derive(Error, Debug)]
pub enum ManorError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A scheduler operation was requested in the wrong phase.
    #[error("out of turn: cannot {action} during {phase}")]
    OutOfTurn {
        /// What was attempted.
        action: &'static str,
        /// The phase the scheduler was in.
        phase: String,
    },

    /// Planning failed.
    #[error(transparent)]
    Planning(#[from] PlanningError),

    /// Sync failed.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Store failure outside a mutation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Completion failure outside planning.
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, ManorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_strings_match_executor_contract() {
        let unknown = MutationFailure::from(UnknownToolError("unknown_tool".into()));
        assert_eq!(unknown.to_string(), "Unknown tool: unknown_tool");

        let invalid = MutationFailure::InvalidArgs {
            tool: "move_player".into(),
            source: ValidationError::MissingField { tool: "move_player", field: "location" },
        };
        assert_eq!(
            invalid.to_string(),
            "Invalid args for move_player: move_player requires 'location' parameter"
        );

        let failed = MutationFailure::Execution {
            tool: "move_player".into(),
            source: StoreError::Rejected("Error: The locked oak door is locked".into()).into(),
        };
        assert_eq!(
            failed.to_string(),
            "Failed to execute move_player: Error: The locked oak door is locked"
        );
    }
}

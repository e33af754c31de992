//! Read-only store access.

use super::MutationTool;
use crate::error::ValidationError;
use crate::mutation::{ArgMap, Mutation};

/// `get_world_state()`.
pub struct GetWorldStateTool;

impl MutationTool for GetWorldStateTool {
    fn name(&self) -> &'static str {
        "get_world_state"
    }

    fn description(&self) -> &'static str {
        "Fetch the current world state"
    }

    fn validate(&self, _args: &ArgMap) -> Result<Mutation, ValidationError> {
        Ok(Mutation::GetWorldState)
    }
}

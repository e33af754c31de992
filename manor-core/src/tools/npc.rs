//! NPC bookkeeping tools.

use super::{MutationTool, optional, required};
use crate::error::ValidationError;
use crate::mutation::{ArgMap, Mutation};

/// `mark_npc_as_met(npc_id)`.
pub struct MarkNpcAsMetTool;

impl MutationTool for MarkNpcAsMetTool {
    fn name(&self) -> &'static str {
        "mark_npc_as_met"
    }

    fn description(&self) -> &'static str {
        "Record that the player now knows an NPC by name"
    }

    fn validate(&self, args: &ArgMap) -> Result<Mutation, ValidationError> {
        Ok(Mutation::MarkNpcAsMet {
            npc_id: required(args, self.name(), "npc_id")?,
        })
    }
}

/// `update_npc_memory(npc_id, thought?, action?)`.
pub struct UpdateNpcMemoryTool;

impl MutationTool for UpdateNpcMemoryTool {
    fn name(&self) -> &'static str {
        "update_npc_memory"
    }

    fn description(&self) -> &'static str {
        "Append a recent thought or action to an NPC's short memory"
    }

    fn validate(&self, args: &ArgMap) -> Result<Mutation, ValidationError> {
        Ok(Mutation::UpdateNpcMemory {
            npc_id: required(args, self.name(), "npc_id")?,
            thought: optional(args, self.name(), "thought")?,
            action: optional(args, self.name(), "action")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: serde_json::Value) -> ArgMap {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn memory_update_needs_only_the_npc() {
        let bare = UpdateNpcMemoryTool.validate(&args(json!({"npc_id": "elena"})));
        assert_eq!(
            bare,
            Ok(Mutation::UpdateNpcMemory { npc_id: "elena".into(), thought: None, action: None })
        );
        let blank = UpdateNpcMemoryTool.validate(&args(json!({"npc_id": "elena", "thought": "  "})));
        assert_eq!(blank, bare);
        assert_eq!(
            UpdateNpcMemoryTool.validate(&args(json!({"thought": "cold in here"}))),
            Err(ValidationError::MissingField { tool: "update_npc_memory", field: "npc_id" })
        );
    }

    #[test]
    fn memory_update_rejects_non_string_parts() {
        assert_eq!(
            UpdateNpcMemoryTool.validate(&args(json!({"npc_id": "elena", "action": 3}))),
            Err(ValidationError::WrongType { tool: "update_npc_memory", field: "action" })
        );
    }
}

//! # Tool Registry
//!
//! Maps mutation-tool names the planner may emit onto implementations.
//! The registry is an explicit value built once at startup and handed to the
//! executor; tests build their own.
//!
//! A tool's contract:
//! - [`MutationTool::validate`] is local and deterministic: it turns the
//!   planner's argument map into a typed [`Mutation`] or a
//!   [`ValidationError`] without touching the store.
//! - [`MutationTool::execute`] performs exactly one store call.
//! - [`MutationTool::success_message`] renders the narrative-safe result.

mod inventory;
mod movement;
mod npc;
mod world;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{ExecutionError, UnknownToolError, ValidationError};
use crate::mutation::{ArgMap, Mutation};
use crate::store::WorldStore;
use crate::world::{Actor, WorldState};

pub use inventory::{AddToInventoryTool, RemoveFromInventoryTool, TransferItemTool};
pub use movement::{MoveActorTool, MoveNpcTool, UnlockDoorTool};
pub use npc::{MarkNpcAsMetTool, UpdateNpcMemoryTool};
pub use world::GetWorldStateTool;

/// Everything a tool may read while executing.
#[derive(Clone, Copy)]
pub struct ToolContext<'a> {
    /// The authoritative store.
    pub store: &'a dyn WorldStore,
    /// Working copy of the snapshot, following the batch's accepted moves.
    pub world: &'a WorldState,
    /// Whoever is acting.
    pub actor: &'a Actor,
    /// Request context.
    pub cancel: &'a CancellationToken,
}

/// A registered mutation tool.
#[async_trait]
pub trait MutationTool: Send + Sync {
    /// Wire name, matched case-sensitively.
    fn name(&self) -> &'static str;

    /// One-line description.
    fn description(&self) -> &'static str;

    /// Check the arguments and produce the typed mutation.
    ///
    /// # Errors
    ///
    /// [`ValidationError`] for missing or malformed arguments.
    fn validate(&self, args: &ArgMap) -> Result<Mutation, ValidationError>;

    /// Perform the mutation with exactly one store call.
    ///
    /// # Errors
    ///
    /// [`ExecutionError`] when the store rejects or fails the call.
    async fn execute(&self, mutation: &Mutation, ctx: ToolContext<'_>) -> Result<(), ExecutionError> {
        let call = mutation.store_call(ctx.world, ctx.actor)?;
        ctx.store.call_tool(&call, ctx.cancel).await?;
        Ok(())
    }

    /// Success line for the executor's result.
    fn success_message(&self, mutation: &Mutation, actor: &Actor) -> String {
        mutation.success_message(actor)
    }
}

/// Name → tool lookup.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, Arc<dyn MutationTool>>,
}

impl ToolRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in tool.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(MoveActorTool);
        registry.register(MoveNpcTool);
        registry.register(TransferItemTool);
        registry.register(AddToInventoryTool);
        registry.register(RemoveFromInventoryTool);
        registry.register(MarkNpcAsMetTool);
        registry.register(UpdateNpcMemoryTool);
        registry.register(UnlockDoorTool);
        registry.register(GetWorldStateTool);
        registry
    }

    /// Add or replace a tool.
    pub fn register(&mut self, tool: impl MutationTool + 'static) {
        self.tools.insert(tool.name(), Arc::new(tool));
    }

    /// Look up a tool by exact name.
    ///
    /// # Errors
    ///
    /// [`UnknownToolError`] if no tool has that name.
    pub fn get(&self, name: &str) -> Result<&dyn MutationTool, UnknownToolError> {
        self.tools
            .get(name)
            .map(|tool| tool.as_ref())
            .ok_or_else(|| UnknownToolError(name.to_string()))
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.tools.keys().copied().collect()
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").field("tools", &self.names()).finish()
    }
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

/// A required, non-blank string argument.
fn required(args: &ArgMap, tool: &'static str, field: &'static str) -> Result<String, ValidationError> {
    optional(args, tool, field)?.ok_or(ValidationError::MissingField { tool, field })
}

/// An optional string argument. Blank counts as absent.
fn optional(args: &ArgMap, tool: &'static str, field: &'static str) -> Result<Option<String>, ValidationError> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(_) => Err(ValidationError::WrongType { tool, field }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> ArgMap {
        match value {
            Value::Object(map) => map,
            _ => ArgMap::new(),
        }
    }

    #[test]
    fn standard_registry_has_every_tool() {
        let registry = ToolRegistry::standard();
        assert_eq!(
            registry.names(),
            [
                "add_to_inventory",
                "get_world_state",
                "mark_npc_as_met",
                "move_npc",
                "move_player",
                "remove_from_inventory",
                "transfer_item",
                "unlock_door",
                "update_npc_memory",
            ]
        );
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let registry = ToolRegistry::standard();
        assert!(registry.get("move_player").is_ok());
        let err = registry.get("Move_Player").err().expect("unknown");
        assert_eq!(err.to_string(), "Unknown tool: Move_Player");
    }

    #[test]
    fn argument_helpers() {
        let a = args(json!({"location": " kitchen ", "blank": "  ", "n": 3}));
        assert_eq!(required(&a, "t", "location"), Ok("kitchen".into()));
        assert_eq!(
            required(&a, "t", "blank"),
            Err(ValidationError::MissingField { tool: "t", field: "blank" })
        );
        assert_eq!(optional(&a, "t", "absent"), Ok(None));
        assert_eq!(
            optional(&a, "t", "n"),
            Err(ValidationError::WrongType { tool: "t", field: "n" })
        );
    }

    #[test]
    fn every_tool_rejects_empty_args_except_world_state() {
        let registry = ToolRegistry::standard();
        for name in registry.names() {
            let tool = registry.get(name).expect("registered");
            let result = tool.validate(&ArgMap::new());
            if name == "get_world_state" {
                assert_eq!(result, Ok(Mutation::GetWorldState));
            } else {
                assert!(result.is_err(), "{name} accepted empty args");
            }
        }
    }
}

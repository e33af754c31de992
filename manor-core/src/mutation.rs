//! Mutations: the planner's untrusted requests and their validated form.
//!
//! The planner speaks `{"tool": "...", "args": {...}}`. Once a tool has
//! validated the argument map, the request becomes a typed [`Mutation`], and
//! everything downstream (store call, success message) works from that.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::error::ExecutionError;
use crate::store::{GET_WORLD_STATE, ToolCall};
use crate::world::{Actor, PLAYER_ID, WorldState};

/// Free-form argument map as produced by the planner.
pub type ArgMap = Map<String, Value>;

/// One proposed mutation, untrusted until validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRequest {
    /// Tool name, matched case-sensitively.
    pub tool: String,
    /// Arguments.
    #[serde(default)]
    pub args: ArgMap,
}

impl MutationRequest {
    /// Build a request; non-object `args` become an empty map.
    #[must_use]
    pub fn new(tool: impl Into<String>, args: Value) -> Self {
        let args = match args {
            Value::Object(map) => map,
            _ => ArgMap::new(),
        };
        Self { tool: tool.into(), args }
    }
}

/// Ordered list of mutations proposed for one actor's intent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    /// Mutations in execution order.
    #[serde(default)]
    pub mutations: Vec<MutationRequest>,
}

impl ActionPlan {
    /// Plan from a list of requests.
    #[must_use]
    pub fn new(mutations: Vec<MutationRequest>) -> Self {
        Self { mutations }
    }

    /// Read a `{"mutations": [...]}` document leniently.
    ///
    /// Entries without a string `tool` are skipped; missing or non-object
    /// `args` become empty. Anything that is not an object with a
    /// `mutations` array yields an empty plan.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let Some(entries) = value.get("mutations").and_then(Value::as_array) else {
            return Self::default();
        };
        let mutations = entries
            .iter()
            .filter_map(|entry| {
                let tool = entry.get("tool")?.as_str()?;
                let args = entry.get("args").cloned().unwrap_or(Value::Null);
                Some(MutationRequest::new(tool, args))
            })
            .collect();
        Self { mutations }
    }

    /// Parse a planner reply. Unparseable text is an empty plan.
    #[must_use]
    pub fn from_response(text: &str) -> Self {
        match manor_llm::structured::parse_json::<Value>(text) {
            Ok(value) => Self::from_value(&value),
            Err(e) => {
                debug!(error = %e, "planner reply unparseable; treating as empty plan");
                Self::default()
            }
        }
    }

    /// Whether the plan has no mutations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Number of mutations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mutations.len()
    }
}

/// A validated mutation. One variant per registered tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Move whoever is acting.
    MoveActor {
        /// Destination location id.
        location: String,
    },
    /// Move a named NPC.
    MoveNpc {
        /// NPC id.
        npc_id: String,
        /// Destination location id.
        location: String,
    },
    /// Move an item between locations and inventories.
    TransferItem {
        /// Item id.
        item: String,
        /// Source: location id, `"player"`, or NPC id.
        from_location: String,
        /// Destination: location id, `"player"`, or NPC id.
        to_location: String,
    },
    /// Pick up an item from the actor's location.
    AddToInventory {
        /// Item id.
        item: String,
    },
    /// Drop an item at the actor's location.
    RemoveFromInventory {
        /// Item id.
        item: String,
    },
    /// The player learned an NPC's name.
    MarkNpcAsMet {
        /// NPC id.
        npc_id: String,
    },
    /// Record an NPC thought and/or action.
    UpdateNpcMemory {
        /// NPC id.
        npc_id: String,
        /// Thought to remember.
        thought: Option<String>,
        /// Action to remember.
        action: Option<String>,
    },
    /// Unlock the door between two adjacent locations.
    UnlockDoor {
        /// Location holding the door.
        from_location: String,
        /// Location the door leads to.
        to_location: String,
    },
    /// Fetch the snapshot. Changes nothing.
    GetWorldState,
}

impl Mutation {
    /// The single store call this mutation performs for `actor`.
    ///
    /// NPC inventory changes are expressed as item transfers between the
    /// NPC's location and the NPC, so `world` must know where it is now,
    /// including moves made earlier in the same batch.
    ///
    /// # Errors
    ///
    /// [`ExecutionError::UnknownActor`] if an NPC actor is missing from `world`.
    pub fn store_call(&self, world: &WorldState, actor: &Actor) -> Result<ToolCall, ExecutionError> {
        let npc_location = |id: &str| {
            world
                .npc(id)
                .map(|npc| npc.location.clone())
                .ok_or_else(|| ExecutionError::UnknownActor(id.to_string()))
        };

        let call = match (self, actor) {
            (Self::MoveActor { location }, Actor::Player) => {
                ToolCall::new("move_player", json!({ "location": location }))
            }
            (Self::MoveActor { location }, Actor::Npc(id)) => {
                ToolCall::new("move_npc", json!({ "npc_id": id, "location": location }))
            }
            (Self::MoveNpc { npc_id, location }, _) => {
                ToolCall::new("move_npc", json!({ "npc_id": npc_id, "location": location }))
            }
            (Self::TransferItem { item, from_location, to_location }, _) => ToolCall::new(
                "transfer_item",
                json!({ "item": item, "from_location": from_location, "to_location": to_location }),
            ),
            (Self::AddToInventory { item }, Actor::Player) => {
                ToolCall::new("add_to_inventory", json!({ "item": item }))
            }
            (Self::AddToInventory { item }, Actor::Npc(id)) => ToolCall::new(
                "transfer_item",
                json!({ "item": item, "from_location": npc_location(id)?, "to_location": id }),
            ),
            (Self::RemoveFromInventory { item }, Actor::Player) => {
                ToolCall::new("remove_from_inventory", json!({ "item": item }))
            }
            (Self::RemoveFromInventory { item }, Actor::Npc(id)) => ToolCall::new(
                "transfer_item",
                json!({ "item": item, "from_location": id, "to_location": npc_location(id)? }),
            ),
            (Self::MarkNpcAsMet { npc_id }, _) => {
                ToolCall::new("mark_npc_as_met", json!({ "npc_id": npc_id }))
            }
            (Self::UpdateNpcMemory { npc_id, thought, action }, _) => {
                let mut args = json!({ "npc_id": npc_id });
                if let Some(thought) = thought {
                    args["thought"] = json!(thought);
                }
                if let Some(action) = action {
                    args["action"] = json!(action);
                }
                ToolCall::new("update_npc_memory", args)
            }
            (Self::UnlockDoor { from_location, to_location }, _) => ToolCall::new(
                "unlock_door",
                json!({
                    "from_location": from_location,
                    "to_location": to_location,
                    "holder": actor.id(),
                }),
            ),
            (Self::GetWorldState, _) => ToolCall::new(GET_WORLD_STATE, json!({})),
        };
        Ok(call)
    }

    /// Apply an accepted mutation's change of position to `world`.
    ///
    /// The executor keeps a working copy of the snapshot for the length of a
    /// batch; later actor-relative calls translate against it.
    pub fn track(&self, world: &mut WorldState, actor: &Actor) {
        let (npc_id, location) = match (self, actor) {
            (Self::MoveActor { location }, Actor::Player) => {
                world.player_location.clone_from(location);
                return;
            }
            (Self::MoveActor { location }, Actor::Npc(id)) => (id, location),
            (Self::MoveNpc { npc_id, location }, _) => (npc_id, location),
            _ => return,
        };
        if let Some(npc) = world.npcs.get_mut(npc_id) {
            npc.location.clone_from(location);
        }
    }

    /// Narrative-safe success line.
    #[must_use]
    pub fn success_message(&self, actor: &Actor) -> String {
        match (self, actor) {
            (Self::MoveActor { location }, Actor::Player) => format!("Moved to {location}"),
            (Self::MoveActor { location }, Actor::Npc(id)) => format!("{id} moved to {location}"),
            (Self::MoveNpc { npc_id, location }, _) => format!("NPC {npc_id} moved to {location}"),
            (Self::TransferItem { item, from_location, to_location }, _) => {
                format!("Transferred {item} from {from_location} to {to_location}")
            }
            (Self::AddToInventory { item }, Actor::Player) => format!("Added {item} to inventory"),
            (Self::AddToInventory { item }, Actor::Npc(id)) => format!("{id} picked up {item}"),
            (Self::RemoveFromInventory { item }, Actor::Player) => {
                format!("Removed {item} from inventory")
            }
            (Self::RemoveFromInventory { item }, Actor::Npc(id)) => format!("{id} dropped {item}"),
            (Self::MarkNpcAsMet { npc_id }, _) => format!("Player has now met {npc_id}"),
            (Self::UpdateNpcMemory { npc_id, thought, action }, _) => {
                let parts: Vec<&str> = [thought.as_ref().map(|_| "thought"), action.as_ref().map(|_| "action")]
                    .into_iter()
                    .flatten()
                    .collect();
                if parts.is_empty() {
                    format!("Updated {npc_id} memory")
                } else {
                    format!("Updated {npc_id} memory ({})", parts.join(", "))
                }
            }
            (Self::UnlockDoor { from_location, to_location }, _) => {
                format!("Unlocked door from {from_location} to {to_location}")
            }
            (Self::GetWorldState, _) => "Retrieved world state".to_string(),
        }
    }
}

/// Whether `holder` names the player inventory.
#[must_use]
pub fn is_player_holder(holder: &str) -> bool {
    holder == PLAYER_ID
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::StoreSnapshot;

    #[test]
    fn lenient_plan_parsing() {
        let plan = ActionPlan::from_response(
            r#"{"mutations": [
                {"tool": "move_player", "args": {"location": "kitchen"}},
                {"args": {"location": "nowhere"}},
                {"tool": "get_world_state", "args": null}
            ]}"#,
        );
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.mutations[0].tool, "move_player");
        assert_eq!(plan.mutations[0].args["location"], "kitchen");
        assert!(plan.mutations[1].args.is_empty());
    }

    #[test]
    fn unparseable_reply_is_empty_plan() {
        assert!(ActionPlan::from_response("I think the player wants to go north.").is_empty());
        assert!(ActionPlan::from_response(r#"{"plan": []}"#).is_empty());
        assert!(ActionPlan::from_response("").is_empty());
    }

    #[test]
    fn npc_inventory_changes_become_transfers() {
        let world: WorldState = StoreSnapshot::manor().into();
        let elena = Actor::npc("elena");

        let pick_up = Mutation::AddToInventory { item: "silver_key".into() };
        let call = pick_up.store_call(&world, &elena).expect("elena is known");
        assert_eq!(call.name, "transfer_item");
        assert_eq!(call.arg("from_location"), Some("library"));
        assert_eq!(call.arg("to_location"), Some("elena"));
        assert_eq!(pick_up.success_message(&elena), "elena picked up silver_key");

        let ghost = Actor::npc("ghost");
        assert_eq!(
            pick_up.store_call(&world, &ghost),
            Err(ExecutionError::UnknownActor("ghost".into()))
        );
    }

    #[test]
    fn tracked_moves_change_later_transfers() {
        let mut world: WorldState = StoreSnapshot::manor().into();
        let elena = Actor::npc("elena");

        Mutation::MoveActor { location: "foyer".into() }.track(&mut world, &elena);
        assert_eq!(world.actor_location(&elena), Some("foyer"));
        let drop = Mutation::RemoveFromInventory { item: "silver_key".into() };
        assert_eq!(drop.store_call(&world, &elena).expect("call").arg("to_location"), Some("foyer"));

        Mutation::MoveNpc { npc_id: "elena".into(), location: "kitchen".into() }.track(&mut world, &Actor::Player);
        assert_eq!(world.actor_location(&elena), Some("kitchen"));
        Mutation::MoveActor { location: "library".into() }.track(&mut world, &Actor::Player);
        assert_eq!(world.player_location, "library");

        let before = world.clone();
        Mutation::AddToInventory { item: "silver_key".into() }.track(&mut world, &elena);
        assert_eq!(world, before);
    }

    #[test]
    fn move_actor_depends_on_who_acts() {
        let world = WorldState::default();
        let mv = Mutation::MoveActor { location: "kitchen".into() };
        assert_eq!(mv.store_call(&world, &Actor::Player).expect("call").name, "move_player");
        let npc_call = mv.store_call(&world, &Actor::npc("elena")).expect("call");
        assert_eq!(npc_call.name, "move_npc");
        assert_eq!(npc_call.arg("npc_id"), Some("elena"));
        assert_eq!(mv.success_message(&Actor::Player), "Moved to kitchen");
    }

    #[test]
    fn memory_message_lists_updated_parts() {
        let m = Mutation::UpdateNpcMemory {
            npc_id: "elena".into(),
            thought: Some("who is there?".into()),
            action: None,
        };
        assert_eq!(m.success_message(&Actor::Player), "Updated elena memory (thought)");
        let call = m.store_call(&WorldState::default(), &Actor::Player).expect("call");
        assert!(call.arguments.get("action").is_none());
    }
}

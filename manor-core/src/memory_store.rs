//! In-process world-state store.
//!
//! Serves the same tool set, with the same rejection rules, as the MCP
//! world-state server, over a [`StoreSnapshot`] held behind a mutex. Used for
//! offline play, tests and benchmarks.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::StoreError;
use crate::mutation::is_player_holder;
use crate::snapshot::{ItemRecord, StoreSnapshot};
use crate::store::{GET_WORLD_STATE, ToolCall, ToolDescriptor, WorldStore};
use crate::world::WorldState;

/// How many recent thoughts/actions an NPC keeps.
pub const NPC_MEMORY_LIMIT: usize = 4;

type ToolResult = Result<String, String>;

/// A [`WorldStore`] backed by an in-memory snapshot.
#[derive(Debug, Default)]
pub struct InMemoryWorldStore {
    state: Mutex<StoreSnapshot>,
    calls: Mutex<Vec<ToolCall>>,
}

impl InMemoryWorldStore {
    /// Store seeded with `snapshot`.
    #[must_use]
    pub fn new(snapshot: StoreSnapshot) -> Self {
        Self {
            state: Mutex::new(snapshot),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Store seeded with the default manor.
    #[must_use]
    pub fn manor() -> Self {
        Self::new(StoreSnapshot::manor())
    }

    /// Copy of the current document.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        self.state.lock().clone()
    }

    /// Current document as a [`WorldState`].
    #[must_use]
    pub fn world(&self) -> WorldState {
        self.snapshot().into()
    }

    /// Every tool call received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().clone()
    }

    fn dispatch(&self, call: &ToolCall) -> ToolResult {
        let mut state = self.state.lock();
        let s = &mut *state;
        match call.name.as_str() {
            GET_WORLD_STATE => serde_json::to_string(s).map_err(|e| format!("Error: {e}")),
            "move_player" => move_player(s, arg(call, "location")?),
            "move_npc" => move_npc(s, arg(call, "npc_id")?, arg(call, "location")?),
            "transfer_item" => transfer_item(
                s,
                arg(call, "item")?,
                arg(call, "from_location")?,
                arg(call, "to_location")?,
            ),
            "add_to_inventory" => add_to_inventory(s, arg(call, "item")?),
            "remove_from_inventory" => remove_from_inventory(s, arg(call, "item")?),
            "unlock_door" => unlock_door(
                s,
                arg(call, "from_location")?,
                arg(call, "to_location")?,
                call.arg("holder").unwrap_or("player"),
            ),
            "update_npc_memory" => update_npc_memory(
                s,
                arg(call, "npc_id")?,
                call.arg("thought").unwrap_or_default(),
                call.arg("action").unwrap_or_default(),
            ),
            "mark_npc_as_met" => mark_npc_as_met(s, arg(call, "npc_id")?),
            "add_location_facts" => {
                add_location_facts(s, arg(call, "location_id")?, &fact_list(call)?)
            }
            "add_npc_facts" => add_npc_facts(s, arg(call, "npc_id")?, &fact_list(call)?),
            "add_item_facts" => add_item_facts(s, arg(call, "item_id")?, &fact_list(call)?),
            other => Err(format!("Error: Unknown tool '{other}'")),
        }
    }
}

#[async_trait]
impl WorldStore for InMemoryWorldStore {
    async fn call_tool(&self, call: &ToolCall, cancel: &CancellationToken) -> Result<String, StoreError> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        self.calls.lock().push(call.clone());
        let result = self.dispatch(call);
        debug!(tool = %call.name, ok = result.is_ok(), "in-memory store call");
        result.map_err(StoreError::Rejected)
    }

    async fn list_tools(&self, cancel: &CancellationToken) -> Result<Vec<ToolDescriptor>, StoreError> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        Ok(catalog())
    }
}

// ---------------------------------------------------------------------------
// Tool implementations
// ---------------------------------------------------------------------------

fn arg<'a>(call: &'a ToolCall, key: &str) -> Result<&'a str, String> {
    call.arg(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| format!("Error: missing '{key}' argument"))
}

fn fact_list(call: &ToolCall) -> Result<Vec<String>, String> {
    call.arguments
        .get("new_facts")
        .and_then(Value::as_array)
        .map(|facts| facts.iter().filter_map(Value::as_str).map(String::from).collect())
        .ok_or_else(|| "Error: missing 'new_facts' argument".to_string())
}

/// Check that `target` is one unlocked hop from `current`.
fn check_route(s: &StoreSnapshot, current: &str, target: &str) -> Result<(), String> {
    if !s.locations.contains_key(target) {
        return Err(format!("Error: Location '{target}' does not exist"));
    }
    let here = s
        .locations
        .get(current)
        .ok_or_else(|| format!("Error: Location '{current}' does not exist"))?;
    let mut directions = here.exits.iter().filter(|(_, to)| to.as_str() == target).peekable();
    if directions.peek().is_none() {
        return Err(format!("Error: Cannot move directly from {current} to {target}"));
    }
    for (direction, _) in directions {
        if let Some(door) = here.door_states.get(direction).filter(|d| d.locked) {
            let what = if door.description.is_empty() { "door" } else { door.description.as_str() };
            return Err(format!("Error: The {what} is locked"));
        }
    }
    Ok(())
}

fn move_player(s: &mut StoreSnapshot, location: &str) -> ToolResult {
    let current = s.player.location.clone();
    check_route(s, &current, location)?;
    s.player.location = location.to_string();
    Ok(format!("Player moved from {current} to {location}"))
}

fn move_npc(s: &mut StoreSnapshot, npc_id: &str, location: &str) -> ToolResult {
    let current = s
        .npcs
        .get(npc_id)
        .map(|npc| npc.location.clone())
        .ok_or_else(|| format!("Error: NPC '{npc_id}' does not exist"))?;
    check_route(s, &current, location)?;
    if let Some(npc) = s.npcs.get_mut(npc_id) {
        npc.location = location.to_string();
    }
    Ok(format!("NPC {npc_id} moved from {current} to {location}"))
}

/// The item list a holder name refers to: the player, an NPC, or a location.
fn holder_items<'a>(s: &'a mut StoreSnapshot, holder: &str) -> Result<&'a mut Vec<String>, String> {
    if is_player_holder(holder) {
        return Ok(&mut s.player.inventory);
    }
    if let Some(npc) = s.npcs.get_mut(holder) {
        return Ok(&mut npc.inventory);
    }
    s.locations
        .get_mut(holder)
        .map(|loc| &mut loc.items)
        .ok_or_else(|| format!("Error: Location '{holder}' does not exist"))
}

fn transfer_item(s: &mut StoreSnapshot, item: &str, from: &str, to: &str) -> ToolResult {
    // Validate the destination before touching the source.
    holder_items(s, to)?;
    let source = holder_items(s, from)?;
    let index = source
        .iter()
        .position(|i| i == item)
        .ok_or_else(|| format!("Error: Item '{item}' not in {from}"))?;
    source.remove(index);
    holder_items(s, to)?.push(item.to_string());
    Ok(format!("Item '{item}' transferred from {from} to {to}"))
}

fn add_to_inventory(s: &mut StoreSnapshot, item: &str) -> ToolResult {
    let here = s.player.location.clone();
    let available = s.locations.get(&here).is_some_and(|loc| loc.items.iter().any(|i| i == item));
    if !available {
        return Err(format!("Error: Item '{item}' is not available in {here}"));
    }
    transfer_item(s, item, &here, "player")?;
    Ok(format!("Player picked up {item}"))
}

fn remove_from_inventory(s: &mut StoreSnapshot, item: &str) -> ToolResult {
    if !s.player.inventory.iter().any(|i| i == item) {
        return Err(format!("Error: Item '{item}' is not in inventory"));
    }
    let here = s.player.location.clone();
    transfer_item(s, item, "player", &here)?;
    Ok(format!("Player dropped {item} in {here}"))
}

fn unlock_door(s: &mut StoreSnapshot, from: &str, to: &str, holder: &str) -> ToolResult {
    let here = s
        .locations
        .get(from)
        .ok_or_else(|| format!("Error: Location '{from}' does not exist"))?;
    let direction = here
        .exits
        .iter()
        .find(|(dir, dest)| dest.as_str() == to && here.door_states.contains_key(*dir))
        .map(|(dir, _)| dir.clone())
        .ok_or_else(|| format!("Error: No door from {from} to {to}"))?;

    let door_id = format!("{from}_{direction}");
    let keys: Vec<&String> = s
        .items
        .iter()
        .filter(|(_, rec)| rec.can_unlock.contains(&door_id))
        .map(|(id, _)| id)
        .collect();
    if !keys.is_empty() {
        let carried: &[String] = if is_player_holder(holder) {
            &s.player.inventory
        } else {
            s.npcs.get(holder).map(|npc| npc.inventory.as_slice()).unwrap_or_default()
        };
        if !keys.iter().any(|key| carried.contains(key)) {
            return Err(format!("Error: {holder} has nothing that unlocks the door to the {direction}"));
        }
    }

    let door = s
        .locations
        .get_mut(from)
        .and_then(|loc| loc.door_states.get_mut(&direction))
        .ok_or_else(|| format!("Error: No door from {from} to {to}"))?;
    if !door.locked {
        return Ok(format!("Door to the {direction} in {from} is already unlocked"));
    }
    door.locked = false;
    Ok(format!("Door to the {direction} in {from} has been unlocked"))
}

fn push_bounded(list: &mut Vec<String>, entry: &str) {
    list.push(entry.to_string());
    if list.len() > NPC_MEMORY_LIMIT {
        let excess = list.len() - NPC_MEMORY_LIMIT;
        list.drain(..excess);
    }
}

fn update_npc_memory(s: &mut StoreSnapshot, npc_id: &str, thought: &str, action: &str) -> ToolResult {
    let npc = s
        .npcs
        .get_mut(npc_id)
        .ok_or_else(|| format!("Error: NPC '{npc_id}' does not exist"))?;
    let mut updates = Vec::new();
    if !thought.is_empty() {
        push_bounded(&mut npc.recent_thoughts, thought);
        updates.push(format!("thought: '{thought}'"));
    }
    if !action.is_empty() {
        push_bounded(&mut npc.recent_actions, action);
        updates.push(format!("action: '{action}'"));
    }
    if updates.is_empty() {
        Ok(format!("No updates provided for {npc_id}"))
    } else {
        Ok(format!("Updated {npc_id} memory - {}", updates.join(", ")))
    }
}

fn mark_npc_as_met(s: &mut StoreSnapshot, npc_id: &str) -> ToolResult {
    if !s.npcs.contains_key(npc_id) {
        return Err(format!("Error: NPC '{npc_id}' does not exist"));
    }
    if s.player.met_npcs.iter().any(|id| id == npc_id) {
        return Ok(format!("Player has already met {npc_id}"));
    }
    s.player.met_npcs.push(npc_id.to_string());
    Ok(format!("Player has now met {npc_id}"))
}

fn add_location_facts(s: &mut StoreSnapshot, location_id: &str, facts: &[String]) -> ToolResult {
    let loc = s
        .locations
        .get_mut(location_id)
        .ok_or_else(|| format!("Error: Location '{location_id}' does not exist"))?;
    let added = loc.facts.extend(facts);
    Ok(format!("Added {added} facts to {location_id}"))
}

fn add_npc_facts(s: &mut StoreSnapshot, npc_id: &str, facts: &[String]) -> ToolResult {
    let npc = s
        .npcs
        .get_mut(npc_id)
        .ok_or_else(|| format!("Error: NPC '{npc_id}' does not exist"))?;
    let added = npc.facts.extend(facts);
    Ok(format!("Added {added} facts to {npc_id}"))
}

fn add_item_facts(s: &mut StoreSnapshot, item_id: &str, facts: &[String]) -> ToolResult {
    let item = s.items.entry(item_id.to_string()).or_insert_with(|| ItemRecord {
        name: item_id.replace('_', " "),
        ..ItemRecord::default()
    });
    let added = item.facts.extend(facts);
    Ok(format!("Added {added} facts to {item_id}"))
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

fn descriptor(name: &str, description: &str, required: &[&str], optional: &[&str]) -> ToolDescriptor {
    let properties: serde_json::Map<String, Value> = required
        .iter()
        .chain(optional)
        .map(|key| {
            let schema = if *key == "new_facts" {
                json!({"type": "array", "items": {"type": "string"}})
            } else {
                json!({"type": "string"})
            };
            ((*key).to_string(), schema)
        })
        .collect();
    ToolDescriptor {
        name: name.into(),
        description: description.into(),
        input_schema: Some(json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })),
    }
}

fn catalog() -> Vec<ToolDescriptor> {
    vec![
        descriptor(GET_WORLD_STATE, "Get the current world state", &[], &[]),
        descriptor("move_player", "Move the acting character to an adjacent location", &["location"], &[]),
        descriptor("move_npc", "Move an NPC to an adjacent location", &["npc_id", "location"], &[]),
        descriptor(
            "transfer_item",
            "Move an item between a location, \"player\", or an NPC id",
            &["item", "from_location", "to_location"],
            &[],
        ),
        descriptor("add_to_inventory", "Pick up an item at the current location", &["item"], &[]),
        descriptor("remove_from_inventory", "Drop a carried item at the current location", &["item"], &[]),
        descriptor(
            "unlock_door",
            "Unlock the door between two adjacent locations",
            &["from_location", "to_location"],
            &[],
        ),
        descriptor("update_npc_memory", "Record an NPC thought and/or action", &["npc_id"], &["thought", "action"]),
        descriptor("mark_npc_as_met", "Mark an NPC as known to the player by name", &["npc_id"], &[]),
        descriptor("add_location_facts", "Add established facts to a location", &["location_id", "new_facts"], &[]),
        descriptor("add_npc_facts", "Add established facts to an NPC", &["npc_id", "new_facts"], &[]),
        descriptor("add_item_facts", "Add established facts to an item", &["item_id", "new_facts"], &[]),
    ]
}

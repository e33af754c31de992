//! Wire shape of the store's `get_world_state` payload.
//!
//! ```json
//! { "player": { "location": "foyer", "inventory": [], "met_npcs": [] },
//!   "locations": { "foyer": { "name": "...", "facts": [], "exits": {}, "items": [], "door_states": {} } },
//!   "items": { "silver_key": { "name": "...", "can_unlock": ["foyer_north"] } },
//!   "npcs": { "elena": { "location": "library", ... } } }
//! ```
//!
//! [`StoreSnapshot`] mirrors that document exactly so it round-trips through
//! the MCP server untouched; [`WorldState`] is the view the pipeline reads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::world::{DoorState, FactSet, ItemInfo, LocationInfo, NpcInfo, WorldState};

/// Player record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Current location id.
    pub location: String,
    /// Carried item ids.
    #[serde(default)]
    pub inventory: Vec<String>,
    /// NPC ids the player knows by name.
    #[serde(default)]
    pub met_npcs: Vec<String>,
}

/// Location record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    /// Display name. Older snapshots call it `title`.
    #[serde(default, alias = "title")]
    pub name: String,
    /// Established facts.
    #[serde(default)]
    pub facts: FactSet,
    /// Direction → destination id.
    #[serde(default)]
    pub exits: BTreeMap<String, String>,
    /// Items lying here.
    #[serde(default)]
    pub items: Vec<String>,
    /// Doors keyed by direction.
    #[serde(default)]
    pub door_states: BTreeMap<String, DoorState>,
}

/// Item record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Display name.
    #[serde(default, alias = "title")]
    pub name: String,
    /// Established facts.
    #[serde(default)]
    pub facts: FactSet,
    /// Door ids (`<location>_<direction>`) this item opens.
    #[serde(default)]
    pub can_unlock: Vec<String>,
}

/// NPC record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NpcRecord {
    /// Current location id.
    pub location: String,
    /// Outward appearance.
    #[serde(default)]
    pub description: String,
    /// Carried item ids.
    #[serde(default)]
    pub inventory: Vec<String>,
    /// Personality summary.
    #[serde(default)]
    pub personality: String,
    /// Backstory.
    #[serde(default)]
    pub backstory: String,
    /// Established facts.
    #[serde(default)]
    pub facts: FactSet,
    /// Bounded recent thoughts.
    #[serde(default)]
    pub recent_thoughts: Vec<String>,
    /// Bounded recent actions.
    #[serde(default)]
    pub recent_actions: Vec<String>,
}

/// The full store document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// The player.
    pub player: PlayerRecord,
    /// Locations by id.
    #[serde(default)]
    pub locations: BTreeMap<String, LocationRecord>,
    /// Item definitions by id.
    #[serde(default)]
    pub items: BTreeMap<String, ItemRecord>,
    /// NPCs by id.
    #[serde(default)]
    pub npcs: BTreeMap<String, NpcRecord>,
}

impl StoreSnapshot {
    /// Parse a `get_world_state` payload.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the payload does not match the wire shape.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// The starting manor: six rooms, two locked doors, one key, one NPC.
    #[must_use]
    pub fn manor() -> Self {
        fn exits(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
            pairs.iter().map(|(d, t)| ((*d).to_string(), (*t).to_string())).collect()
        }
        fn room(name: &str, pairs: &[(&str, &str)]) -> LocationRecord {
            LocationRecord {
                name: name.into(),
                exits: exits(pairs),
                ..LocationRecord::default()
            }
        }
        fn locked(description: &str) -> DoorState {
            DoorState { locked: true, description: description.into() }
        }

        let mut foyer = room(
            "Old Foyer",
            &[("north", "study"), ("east", "library"), ("west", "kitchen")],
        );
        foyer.door_states.insert("north".into(), locked("locked oak door"));

        let mut kitchen = room("Abandoned Kitchen", &[("east", "foyer"), ("down", "cellar")]);
        kitchen.door_states.insert("down".into(), locked("heavy wooden trapdoor"));

        let mut library = room("Dusty Library", &[("west", "foyer")]);
        library.items.push("silver_key".into());

        let locations = BTreeMap::from([
            ("foyer".to_string(), foyer),
            ("study".to_string(), room("Quiet Study", &[("south", "foyer"), ("up", "attic")])),
            ("library".to_string(), library),
            ("kitchen".to_string(), kitchen),
            ("attic".to_string(), room("Cramped Attic", &[("down", "study")])),
            ("cellar".to_string(), room("Stone Cellar", &[("up", "kitchen")])),
        ]);

        let items = BTreeMap::from([(
            "silver_key".to_string(),
            ItemRecord {
                name: "Silver Key".into(),
                can_unlock: vec!["foyer_north".into()],
                ..ItemRecord::default()
            },
        )]);

        let npcs = BTreeMap::from([(
            "elena".to_string(),
            NpcRecord {
                location: "library".into(),
                description: "a woman in her thirties with dark hair loose and slightly \
                              disheveled, wearing a simple gray dress"
                    .into(),
                personality: "curious and observant, pragmatic under pressure, empathetic but guarded"
                    .into(),
                backstory: "She has just woken up inside the manor and cannot remember who she \
                            is or how she got there."
                    .into(),
                ..NpcRecord::default()
            },
        )]);

        Self {
            player: PlayerRecord { location: "foyer".into(), ..PlayerRecord::default() },
            locations,
            items,
            npcs,
        }
    }
}

impl From<StoreSnapshot> for WorldState {
    fn from(snapshot: StoreSnapshot) -> Self {
        let locations = snapshot
            .locations
            .into_iter()
            .map(|(id, rec)| {
                let info = LocationInfo {
                    id: id.clone(),
                    name: rec.name,
                    facts: rec.facts,
                    exits: rec.exits,
                    items: rec.items,
                    doors: rec.door_states,
                };
                (id, info)
            })
            .collect();

        let npcs = snapshot
            .npcs
            .into_iter()
            .map(|(id, rec)| {
                let info = NpcInfo {
                    id: id.clone(),
                    location: rec.location,
                    description: rec.description,
                    inventory: rec.inventory,
                    personality: rec.personality,
                    backstory: rec.backstory,
                    facts: rec.facts,
                    recent_thoughts: rec.recent_thoughts,
                    recent_actions: rec.recent_actions,
                };
                (id, info)
            })
            .collect();

        let items = snapshot
            .items
            .into_iter()
            .map(|(id, rec)| {
                let info = ItemInfo { id: id.clone(), name: rec.name, facts: rec.facts };
                (id, info)
            })
            .collect();

        WorldState {
            player_location: snapshot.player.location,
            inventory: snapshot.player.inventory,
            met_npcs: snapshot.player.met_npcs.into_iter().collect(),
            locations,
            npcs,
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_store_payload_with_extra_fields() {
        let payload = r#"{
            "player": {"location": "foyer", "inventory": ["lamp"]},
            "locations": {
                "foyer": {"title": "Old Foyer", "description": "dusty", "items": [],
                          "exits": {"north": "study"},
                          "door_states": {"north": {"locked": true, "description": "oak door"}}},
                "study": {"name": "Quiet Study", "exits": {"south": "foyer"}}
            },
            "items": {},
            "npcs": {"elena": {"location": "study", "debug_color": "35", "facts": ["tall", "tall"]}}
        }"#;
        let world: WorldState = StoreSnapshot::from_json(payload).expect("payload").into();
        assert_eq!(world.player_location, "foyer");
        assert_eq!(world.inventory, ["lamp"]);
        assert_eq!(world.locations["foyer"].name, "Old Foyer");
        assert!(world.locations["foyer"].locked_door_to("study").is_some());
        assert_eq!(world.npcs["elena"].id, "elena");
        assert_eq!(world.npcs["elena"].facts.len(), 1);
    }

    #[test]
    fn manor_is_connected_from_the_foyer() {
        let world: WorldState = StoreSnapshot::manor().into();
        assert_eq!(world.player_location, "foyer");
        assert_eq!(world.npc_ids(), ["elena"]);
        for loc in world.locations.values() {
            for dest in loc.neighbours() {
                assert!(world.locations.contains_key(dest), "{} → {dest} dangles", loc.id);
            }
        }
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let manor = StoreSnapshot::manor();
        let text = serde_json::to_string(&manor).expect("serialize");
        assert_eq!(StoreSnapshot::from_json(&text).expect("parse"), manor);
    }
}

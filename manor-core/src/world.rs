//! The cached world model.
//!
//! A [`WorldState`] is a read-only snapshot of what the external store holds.
//! The core never patches it; after each actor's mutations it is replaced
//! wholesale by a fresh fetch (see [`crate::sync`]).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier the store uses for the player's inventory.
pub const PLAYER_ID: &str = "player";

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// Whoever's turn is executing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    /// The human player.
    Player,
    /// An NPC, by id.
    Npc(String),
}

impl Actor {
    /// Shorthand for [`Actor::Npc`].
    #[must_use]
    pub fn npc(id: impl Into<String>) -> Self {
        Self::Npc(id.into())
    }

    /// The store-side id: `"player"` or the NPC id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Player => PLAYER_ID,
            Self::Npc(id) => id,
        }
    }

    /// The name used in event-line tags: `"Player"` or the NPC id.
    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            Self::Player => "Player",
            Self::Npc(id) => id,
        }
    }

    /// Label the director prompt uses for this actor's intent.
    #[must_use]
    pub fn action_label(&self) -> String {
        match self {
            Self::Player => "Player action".to_string(),
            Self::Npc(id) => format!("NPC {} ACTION", id.to_uppercase()),
        }
    }

    /// Whether this is the player.
    #[must_use]
    pub fn is_player(&self) -> bool {
        matches!(self, Self::Player)
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// ---------------------------------------------------------------------------
// FactSet
// ---------------------------------------------------------------------------

/// An ordered set of unique, trimmed, non-empty fact strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct FactSet(Vec<String>);

impl FactSet {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fact. Returns `false` if it was blank or already present.
    pub fn insert(&mut self, fact: impl AsRef<str>) -> bool {
        let fact = fact.as_ref().trim();
        if fact.is_empty() || self.contains(fact) {
            return false;
        }
        self.0.push(fact.to_string());
        true
    }

    /// Insert many facts, returning how many were new.
    pub fn extend<I, S>(&mut self, facts: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        facts.into_iter().filter(|f| self.insert(f)).count()
    }

    /// Whether `fact` (trimmed) is already present.
    #[must_use]
    pub fn contains(&self, fact: &str) -> bool {
        let fact = fact.trim();
        self.0.iter().any(|f| f == fact)
    }

    /// Facts in insertion order.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Number of facts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for FactSet {
    fn from(facts: Vec<String>) -> Self {
        let mut set = Self::new();
        set.extend(facts);
        set
    }
}

impl From<FactSet> for Vec<String> {
    fn from(set: FactSet) -> Self {
        set.0
    }
}

impl FromIterator<String> for FactSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

// ---------------------------------------------------------------------------
// Locations, NPCs, items
// ---------------------------------------------------------------------------

/// A door on one exit of a location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorState {
    /// Whether the door currently blocks the exit.
    #[serde(default)]
    pub locked: bool,
    /// How the door is described ("locked oak door").
    #[serde(default)]
    pub description: String,
}

/// One node of the location graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationInfo {
    /// Location id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Established facts.
    pub facts: FactSet,
    /// Direction label → destination id. Edges are directed.
    pub exits: BTreeMap<String, String>,
    /// Items lying here.
    pub items: Vec<String>,
    /// Doors keyed by the direction label they guard.
    pub doors: BTreeMap<String, DoorState>,
}

impl LocationInfo {
    /// Destination ids reachable in one hop.
    pub fn neighbours(&self) -> impl Iterator<Item = &str> {
        self.exits.values().map(String::as_str)
    }

    /// The locked door, if any, on the exit leading to `destination`.
    #[must_use]
    pub fn locked_door_to(&self, destination: &str) -> Option<&DoorState> {
        self.exits
            .iter()
            .filter(|(_, to)| to.as_str() == destination)
            .find_map(|(dir, _)| self.doors.get(dir).filter(|d| d.locked))
    }
}

/// An NPC as the store describes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NpcInfo {
    /// NPC id.
    pub id: String,
    /// Current location id.
    pub location: String,
    /// Outward appearance, used before the player learns the name.
    pub description: String,
    /// Carried items.
    pub inventory: Vec<String>,
    /// Personality summary.
    pub personality: String,
    /// Backstory.
    pub backstory: String,
    /// Established facts.
    pub facts: FactSet,
    /// Most recent private thoughts, oldest first.
    pub recent_thoughts: Vec<String>,
    /// Most recent actions, oldest first.
    pub recent_actions: Vec<String>,
}

/// An item definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemInfo {
    /// Item id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Established facts.
    pub facts: FactSet,
}

// ---------------------------------------------------------------------------
// WorldState
// ---------------------------------------------------------------------------

/// Snapshot of the simulated world.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    /// Where the player is.
    pub player_location: String,
    /// What the player carries.
    pub inventory: Vec<String>,
    /// NPCs the player knows by name.
    pub met_npcs: BTreeSet<String>,
    /// The location graph.
    pub locations: BTreeMap<String, LocationInfo>,
    /// NPCs by id.
    pub npcs: BTreeMap<String, NpcInfo>,
    /// Item definitions by id.
    pub items: BTreeMap<String, ItemInfo>,
}

impl WorldState {
    /// Where `actor` currently is, if known.
    #[must_use]
    pub fn actor_location(&self, actor: &Actor) -> Option<&str> {
        match actor {
            Actor::Player => Some(self.player_location.as_str()).filter(|l| !l.is_empty()),
            Actor::Npc(id) => self.npcs.get(id).map(|npc| npc.location.as_str()),
        }
    }

    /// What `actor` carries.
    #[must_use]
    pub fn inventory_of(&self, actor: &Actor) -> &[String] {
        match actor {
            Actor::Player => &self.inventory,
            Actor::Npc(id) => self
                .npcs
                .get(id)
                .map(|npc| npc.inventory.as_slice())
                .unwrap_or_default(),
        }
    }

    /// Look up a location.
    #[must_use]
    pub fn location(&self, id: &str) -> Option<&LocationInfo> {
        self.locations.get(id)
    }

    /// Look up an NPC.
    #[must_use]
    pub fn npc(&self, id: &str) -> Option<&NpcInfo> {
        self.npcs.get(id)
    }

    /// Every known NPC id, in a stable order.
    #[must_use]
    pub fn npc_ids(&self) -> Vec<String> {
        self.npcs.keys().cloned().collect()
    }

    /// Ids of NPCs standing at `location`.
    #[must_use]
    pub fn npcs_at(&self, location: &str) -> Vec<&str> {
        self.npcs
            .values()
            .filter(|npc| npc.location == location)
            .map(|npc| npc.id.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fact_set_trims_and_dedupes() {
        let mut facts = FactSet::new();
        assert!(facts.insert("  stone floors "));
        assert!(!facts.insert("stone floors"));
        assert!(!facts.insert("   "));
        assert_eq!(facts.extend(["musty smell", "stone floors", "low ceiling"]), 2);
        assert_eq!(facts.as_slice(), ["stone floors", "musty smell", "low ceiling"]);
    }

    #[test]
    fn fact_set_deserializes_deduplicated() {
        let facts: FactSet = serde_json::from_str(r#"["a", " a", "b", ""]"#).expect("json");
        assert_eq!(facts.as_slice(), ["a", "b"]);
        assert_eq!(serde_json::to_string(&facts).expect("json"), r#"["a","b"]"#);
    }

    #[test]
    fn actor_labels() {
        assert_eq!(Actor::Player.action_label(), "Player action");
        assert_eq!(Actor::npc("elena").action_label(), "NPC ELENA ACTION");
        assert_eq!(Actor::Player.tag(), "Player");
        assert_eq!(Actor::Player.id(), "player");
        assert_eq!(Actor::npc("elena").to_string(), "elena");
    }

    #[test]
    fn locked_door_lookup_follows_direction() {
        let loc = LocationInfo {
            id: "foyer".into(),
            exits: BTreeMap::from([
                ("north".into(), "study".into()),
                ("east".into(), "library".into()),
            ]),
            doors: BTreeMap::from([(
                "north".into(),
                DoorState { locked: true, description: "locked oak door".into() },
            )]),
            ..LocationInfo::default()
        };
        assert!(loc.locked_door_to("study").is_some());
        assert!(loc.locked_door_to("library").is_none());
    }
}

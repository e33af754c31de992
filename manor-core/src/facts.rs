//! # Fact Recording
//!
//! After narration, permanent facts are pulled out of the narration text and
//! attributed to the locations, NPCs and items they describe, then written to
//! the store through its `add_*_facts` tools.
//!
//! ```text
//! narration ──► extract (light) ──► attribute (light) ──► retain_known ──► add_*_facts
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use manor_llm::structured::{parse_json, parse_string_list};
use manor_llm::{CompletionBackend, PromptEngine, PromptId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::entity_listing;
use crate::store::{ToolCall, WorldStore, or_cancelled};
use crate::world::{FactSet, WorldState};

/// Facts sorted by the entity they describe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactAttribution {
    /// Location id → facts.
    #[serde(default)]
    pub location_facts: BTreeMap<String, Vec<String>>,
    /// Item id → facts.
    #[serde(default)]
    pub item_facts: BTreeMap<String, Vec<String>>,
    /// NPC id → facts.
    #[serde(default)]
    pub npc_facts: BTreeMap<String, Vec<String>>,
    /// Facts the attribution call declined, with a reason.
    #[serde(default)]
    pub skipped: Vec<String>,
}

fn retain_new(
    facts: &mut BTreeMap<String, Vec<String>>,
    known: impl Fn(&str) -> Option<FactSet>,
) {
    facts.retain(|id, list| {
        let Some(existing) = known(id.as_str()) else {
            debug!(entity = %id, "dropping facts for unknown entity");
            return false;
        };
        let mut fresh = FactSet::new();
        for fact in list.iter() {
            if !existing.contains(fact) {
                fresh.insert(fact);
            }
        }
        *list = fresh.into();
        !list.is_empty()
    });
}

impl FactAttribution {
    /// Drop unknown entity ids, facts the entity already has, and blanks.
    pub fn retain_known(&mut self, world: &WorldState) {
        retain_new(&mut self.location_facts, |id| world.location(id).map(|l| l.facts.clone()));
        retain_new(&mut self.npc_facts, |id| world.npc(id).map(|n| n.facts.clone()));

        let carried: BTreeSet<&str> = world
            .locations
            .values()
            .flat_map(|l| l.items.iter())
            .chain(world.inventory.iter())
            .chain(world.npcs.values().flat_map(|n| n.inventory.iter()))
            .map(String::as_str)
            .collect();
        retain_new(&mut self.item_facts, |id| match world.items.get(id) {
            Some(item) => Some(item.facts.clone()),
            None => carried.contains(id).then(FactSet::new),
        });
    }

    /// Number of facts across all entities.
    #[must_use]
    pub fn total(&self) -> usize {
        [&self.location_facts, &self.item_facts, &self.npc_facts]
            .iter()
            .flat_map(|m| m.values())
            .map(Vec::len)
            .sum()
    }

    /// Whether nothing is left to record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// One store call per entity.
    #[must_use]
    pub fn store_calls(&self) -> Vec<ToolCall> {
        let mut calls = Vec::new();
        for (id, facts) in &self.location_facts {
            calls.push(ToolCall::new("add_location_facts", json!({ "location_id": id, "new_facts": facts })));
        }
        for (id, facts) in &self.npc_facts {
            calls.push(ToolCall::new("add_npc_facts", json!({ "npc_id": id, "new_facts": facts })));
        }
        for (id, facts) in &self.item_facts {
            calls.push(ToolCall::new("add_item_facts", json!({ "item_id": id, "new_facts": facts })));
        }
        calls
    }
}

/// What a recording pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FactReport {
    /// Facts extracted from the narration.
    pub extracted: usize,
    /// Facts sent to the store.
    pub recorded: usize,
    /// Store calls that failed.
    pub failures: Vec<String>,
}

/// Extracts, attributes and records facts from narration.
pub struct FactRecorder {
    llm: Arc<dyn CompletionBackend>,
    prompts: Arc<PromptEngine>,
}

impl FactRecorder {
    /// Recorder over `llm`.
    #[must_use]
    pub fn new(llm: Arc<dyn CompletionBackend>, prompts: Arc<PromptEngine>) -> Self {
        Self { llm, prompts }
    }

    async fn ask(&self, id: PromptId, vars: &[(&str, &str)], cancel: &CancellationToken) -> Option<String> {
        let request = match self.prompts.request(id, vars) {
            Ok(r) => r.json_object(),
            Err(e) => {
                warn!(prompt = %id, error = %e, "prompt unavailable");
                return None;
            }
        };
        match or_cancelled(cancel, self.llm.complete(&request)).await? {
            Ok(response) => Some(response.text),
            Err(e) => {
                debug!(prompt = %id, error = %e, "fact call failed");
                None
            }
        }
    }

    /// Permanent facts stated in `narration` about the player's location.
    pub async fn extract(&self, narration: &str, world: &WorldState, cancel: &CancellationToken) -> Vec<String> {
        let here = world.location(&world.player_location);
        let location = here.map_or(world.player_location.as_str(), |l| l.name.as_str());
        let existing = here
            .map(|l| l.facts.as_slice().iter().map(|f| format!("- {f}")).collect::<Vec<_>>().join("\n"))
            .unwrap_or_default();

        let Some(text) = self
            .ask(
                PromptId::FactExtraction,
                &[("location", location), ("narration", narration), ("existing_facts", existing.as_str())],
                cancel,
            )
            .await
        else {
            return Vec::new();
        };
        parse_string_list(&text).unwrap_or_default()
    }

    /// Sort `facts` by entity. Unknown ids and known facts are dropped.
    pub async fn attribute(&self, facts: &[String], world: &WorldState, cancel: &CancellationToken) -> FactAttribution {
        let entities = entity_listing(world);
        let listed = serde_json::to_string(facts).unwrap_or_default();
        let Some(text) = self
            .ask(
                PromptId::FactAttribution,
                &[("world_entities", entities.as_str()), ("facts", listed.as_str())],
                cancel,
            )
            .await
        else {
            return FactAttribution::default();
        };
        let mut attribution = parse_json::<FactAttribution>(&text).unwrap_or_default();
        attribution.retain_known(world);
        attribution
    }

    /// Run the whole pass and write the facts to `store`.
    pub async fn record(
        &self,
        narration: &str,
        world: &WorldState,
        store: &dyn WorldStore,
        cancel: &CancellationToken,
    ) -> FactReport {
        let mut report = FactReport::default();
        if narration.trim().is_empty() {
            return report;
        }

        let facts = self.extract(narration, world, cancel).await;
        report.extracted = facts.len();
        if facts.is_empty() {
            return report;
        }

        let attribution = self.attribute(&facts, world, cancel).await;
        for call in attribution.store_calls() {
            let count = call.arguments["new_facts"].as_array().map_or(0, Vec::len);
            match store.call_tool(&call, cancel).await {
                Ok(_) => report.recorded += count,
                Err(e) => report.failures.push(format!("Failed to execute {}: {e}", call.name)),
            }
        }
        info!(extracted = report.extracted, recorded = report.recorded, "facts recorded");
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::InMemoryWorldStore;
    use crate::snapshot::StoreSnapshot;
    use crate::testing::ScriptedLlm;

    #[test]
    fn retain_known_filters_ids_and_duplicates() {
        let mut snapshot = StoreSnapshot::manor();
        snapshot.locations.get_mut("foyer").expect("foyer").facts.insert("has a cracked mirror");
        let world: WorldState = snapshot.into();

        let mut attribution = FactAttribution {
            location_facts: BTreeMap::from([
                ("foyer".into(), vec!["has a cracked mirror ".into(), "smells of dust".into()]),
                ("garden".into(), vec!["is overgrown".into()]),
            ]),
            item_facts: BTreeMap::from([("silver_key".into(), vec!["is tarnished".into()])]),
            npc_facts: BTreeMap::from([("elena".into(), vec!["  ".into()])]),
            skipped: vec![],
        };
        attribution.retain_known(&world);

        assert_eq!(attribution.location_facts.len(), 1);
        assert_eq!(attribution.location_facts["foyer"], ["smells of dust"]);
        assert_eq!(attribution.item_facts["silver_key"], ["is tarnished"]);
        assert!(attribution.npc_facts.is_empty());
        assert_eq!(attribution.total(), 2);
    }

    #[tokio::test]
    async fn record_writes_to_store() {
        let llm = ScriptedLlm::new()
            .reply(PromptId::FactExtraction, r#"{"facts": ["has a checkered floor", "Elena has grey eyes"]}"#)
            .reply(
                PromptId::FactAttribution,
                r#"{"location_facts": {"foyer": ["has a checkered floor"]},
                    "npc_facts": {"elena": ["has grey eyes"]},
                    "item_facts": {}, "skipped": []}"#,
            );
        let recorder = FactRecorder::new(Arc::new(llm), Arc::new(PromptEngine::builtin()));
        let store = InMemoryWorldStore::manor();
        let world = store.world();

        let report = recorder.record("The foyer floor is checkered.", &world, &store, &CancellationToken::new()).await;
        assert_eq!(report.extracted, 2);
        assert_eq!(report.recorded, 2);
        let after = store.world();
        assert!(after.locations["foyer"].facts.contains("has a checkered floor"));
        assert!(after.npcs["elena"].facts.contains("has grey eyes"));
    }

    #[tokio::test]
    async fn extraction_failure_records_nothing() {
        let recorder = FactRecorder::new(Arc::new(ScriptedLlm::new()), Arc::new(PromptEngine::builtin()));
        let store = InMemoryWorldStore::manor();
        let report = recorder.record("text", &store.world(), &store, &CancellationToken::new()).await;
        assert_eq!(report, FactReport::default());
        assert!(store.calls().is_empty());
    }
}

//! # Perception Engine
//!
//! Decides, per NPC, which of the canonical event lines since its last turn
//! it could have perceived. Two mechanisms are combined:
//!
//! 1. **Semantic filter**: a reasoning call picks lines it judges perceivable.
//!    Anything it returns that is not a verbatim input line is discarded.
//! 2. **Adjacency override**: speech-like lines tagged at the NPC's location
//!    or one outgoing hop away are always included, as are untagged lines.
//!
//! The result is the union of both, in input order, without duplicates.
//! Sounds ([`SensoryEvent`]) are handled separately by [`audible_sounds`].

pub mod filter;
pub mod graph;
pub mod sound;

use std::collections::HashSet;
use std::sync::Arc;

use manor_llm::structured::{events_schema, parse_string_list};
use manor_llm::{CompletionBackend, PromptEngine, PromptId};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub use filter::{adjacency_override, is_speech_like, restrict_to_inputs};
pub use graph::{is_within_one_hop, room_distance};
pub use sound::{Audibility, HeardSound, SensoryEvent, Volume, audible_sounds, decay};

use crate::context::world_context;
use crate::store::or_cancelled;
use crate::world::{Actor, WorldState};

/// Per-NPC event-line perception.
pub struct PerceptionEngine {
    llm: Arc<dyn CompletionBackend>,
    prompts: Arc<PromptEngine>,
    semantic: bool,
}

impl PerceptionEngine {
    /// Engine with the semantic filter enabled.
    #[must_use]
    pub fn new(llm: Arc<dyn CompletionBackend>, prompts: Arc<PromptEngine>) -> Self {
        Self { llm, prompts, semantic: true }
    }

    /// Enable or disable the semantic filter. Disabled, only the override applies.
    #[must_use]
    pub fn with_semantic(mut self, enabled: bool) -> Self {
        self.semantic = enabled;
        self
    }

    /// The lines `npc_id` perceives out of `lines`.
    pub async fn perceive(
        &self,
        npc_id: &str,
        world: &WorldState,
        lines: &[String],
        cancel: &CancellationToken,
    ) -> Vec<String> {
        if lines.is_empty() {
            return Vec::new();
        }

        let listener = world.npc(npc_id).map(|npc| npc.location.as_str());
        let forced = adjacency_override(world, listener, lines);
        let selected = if self.semantic {
            match self.semantic_filter(npc_id, world, lines, cancel).await {
                Ok(selected) => restrict_to_inputs(selected, lines),
                Err(reason) => {
                    warn!(npc = npc_id, %reason, "semantic perception unavailable");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let keep: HashSet<&str> = forced.iter().chain(&selected).map(String::as_str).collect();
        let mut seen = HashSet::new();
        let perceived: Vec<String> = lines
            .iter()
            .filter(|line| keep.contains(line.as_str()) && seen.insert(line.as_str()))
            .cloned()
            .collect();
        debug!(npc = npc_id, offered = lines.len(), perceived = perceived.len(), "perception");
        perceived
    }

    async fn semantic_filter(
        &self,
        npc_id: &str,
        world: &WorldState,
        lines: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, String> {
        let context = world_context(world, &Actor::npc(npc_id), &[]);
        let event_lines = lines.iter().map(|l| format!("- {l}")).collect::<Vec<_>>().join("\n");
        let request = self
            .prompts
            .request(PromptId::Perception, &[
                ("npc_id", npc_id),
                ("world_context", context.as_str()),
                ("event_lines", event_lines.as_str()),
            ])
            .map_err(|e| e.to_string())?
            .with_schema("events", events_schema());

        let response = or_cancelled(cancel, self.llm.complete(&request))
            .await
            .ok_or_else(|| "cancelled".to_string())?
            .map_err(|e| e.to_string())?;
        parse_string_list(&response.text).map_err(|e| e.to_string())
    }
}

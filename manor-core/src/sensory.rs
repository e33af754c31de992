//! Sound generation for a finished turn.
//!
//! A light reasoning call turns the actor's input and outcome into at most
//! one auditory event at the origin. Any failure means the turn was silent.

use std::sync::Arc;

use manor_llm::structured::parse_json;
use manor_llm::{CompletionBackend, PromptEngine, PromptId};
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::perception::SensoryEvent;
use crate::store::or_cancelled;
use crate::world::Actor;

/// Most sounds one turn may produce.
pub const MAX_SOUNDS_PER_TURN: usize = 1;

#[derive(Debug, Deserialize)]
struct AuditoryReply {
    #[serde(default)]
    auditory_events: Vec<Value>,
}

/// Generates the sounds a turn made.
pub struct SensoryGenerator {
    llm: Arc<dyn CompletionBackend>,
    prompts: Arc<PromptEngine>,
}

impl SensoryGenerator {
    /// Generator over `llm`.
    #[must_use]
    pub fn new(llm: Arc<dyn CompletionBackend>, prompts: Arc<PromptEngine>) -> Self {
        Self { llm, prompts }
    }

    /// Sounds produced by `actor` at `location` attempting `input`.
    pub async fn generate(
        &self,
        actor: &Actor,
        location: &str,
        input: &str,
        successes: &[String],
        cancel: &CancellationToken,
    ) -> Vec<SensoryEvent> {
        let changes = if successes.is_empty() { "none".to_string() } else { successes.join("\n") };
        let request = match self.prompts.request(PromptId::SensoryEvents, &[
            ("actor", actor.tag()),
            ("location", location),
            ("input", input),
            ("successes", changes.as_str()),
        ]) {
            Ok(request) => request.json_object(),
            Err(e) => {
                warn!(error = %e, "sensory prompt unavailable");
                return Vec::new();
            }
        };

        let text = match or_cancelled(cancel, self.llm.complete(&request)).await {
            Some(Ok(response)) => response.text,
            Some(Err(e)) => {
                debug!(actor = %actor, error = %e, "no sensory events");
                return Vec::new();
            }
            None => return Vec::new(),
        };

        let Ok(reply) = parse_json::<AuditoryReply>(&text) else {
            debug!(actor = %actor, "sensory reply unparseable");
            return Vec::new();
        };

        reply
            .auditory_events
            .into_iter()
            .filter_map(|value| serde_json::from_value::<SensoryEvent>(value).ok())
            .filter(|event| !event.description.trim().is_empty())
            .map(|mut event| {
                if event.location.trim().is_empty() {
                    event.location = location.to_string();
                }
                event
            })
            .take(MAX_SOUNDS_PER_TURN)
            .collect()
    }
}

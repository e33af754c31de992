//! Player-facing narration of a finished turn.

use std::sync::Arc;

use manor_core::context::world_context;
use manor_core::store::or_cancelled;
use manor_core::{Actor, TurnReport, WorldState};
use manor_llm::{CompletionBackend, PromptEngine, PromptId};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Writes the prose the player reads after each of their turns.
pub struct Narrator {
    llm: Arc<dyn CompletionBackend>,
    prompts: Arc<PromptEngine>,
}

impl Narrator {
    /// Narrator over `llm`.
    #[must_use]
    pub fn new(llm: Arc<dyn CompletionBackend>, prompts: Arc<PromptEngine>) -> Self {
        Self { llm, prompts }
    }

    /// Narrate `report` against the post-turn `world`.
    ///
    /// Never fails: without a usable reply the turn's events are listed
    /// plainly instead.
    pub async fn narrate(
        &self,
        world: &WorldState,
        history: &[String],
        report: &TurnReport,
        cancel: &CancellationToken,
    ) -> String {
        match self.compose(world, history, report, cancel).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => fallback(report),
            Err(reason) => {
                warn!(%reason, "narration unavailable; listing events");
                fallback(report)
            }
        }
    }

    async fn compose(
        &self,
        world: &WorldState,
        history: &[String],
        report: &TurnReport,
        cancel: &CancellationToken,
    ) -> Result<String, String> {
        let context = world_context(world, &Actor::Player, history);
        let action = report.input.as_deref().unwrap_or("nothing");
        let changes = world_changes(report);
        let sounds = sensory_lines(report);

        let request = self
            .prompts
            .request(PromptId::Narration, &[
                ("world_context", context.as_str()),
                ("action", action),
                ("world_changes", changes.as_str()),
                ("sensory_events", sounds.as_str()),
            ])
            .map_err(|e| e.to_string())?;
        let response = or_cancelled(cancel, self.llm.complete(&request))
            .await
            .ok_or_else(|| "cancelled".to_string())?
            .map_err(|e| e.to_string())?;
        Ok(response.text)
    }
}

fn world_changes(report: &TurnReport) -> String {
    let successes = report.result.successes.iter().map(|success| format!("- {success}\n"));
    let failures = report.result.failures.iter().map(|failure| format!("- FAILED: {failure}\n"));
    let out: String = successes.chain(failures).collect();
    if out.is_empty() { "- none\n".to_string() } else { out }
}

fn sensory_lines(report: &TurnReport) -> String {
    if report.sounds.is_empty() {
        return "- none".to_string();
    }
    report
        .sounds
        .iter()
        .map(|s| format!("- {} ({} volume) at {}", s.description, s.volume, s.location))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Plain narration used when the completion service cannot help.
#[must_use]
pub fn fallback(report: &TurnReport) -> String {
    let events = report.events.iter().map(|line| format!("* {line}"));
    let failures = report.result.failures.iter().map(|failure| format!("  ({failure})"));
    let lines: Vec<String> = events.chain(failures).collect();
    if lines.is_empty() {
        "Nothing happens.".to_string()
    } else {
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use manor_core::StoreSnapshot;
    use manor_core::perception::{SensoryEvent, Volume};
    use manor_core::testing::ScriptedLlm;

    fn narrator(llm: ScriptedLlm) -> (Narrator, Arc<ScriptedLlm>) {
        let llm = Arc::new(llm);
        (Narrator::new(llm.clone(), Arc::new(PromptEngine::builtin())), llm)
    }

    fn report() -> TurnReport {
        let mut report = TurnReport::new(Actor::Player, Some("knock on the door"));
        report.result.failures.push("Failed to execute unlock_door: Error: no key".into());
        report.events.push("Player@foyer: knock on the door".into());
        report.sounds.push(SensoryEvent::auditory("three sharp knocks", "foyer", Volume::Moderate));
        report
    }

    #[tokio::test]
    async fn narration_prompt_carries_changes_and_sounds() {
        let (narrator, llm) =
            narrator(ScriptedLlm::new().reply(PromptId::Narration, "  The oak door does not budge.  "));
        let world: WorldState = StoreSnapshot::manor().into();
        let text = narrator.narrate(&world, &[], &report(), &CancellationToken::new()).await;
        assert_eq!(text, "The oak door does not budge.");

        let sent = llm.requests_for(PromptId::Narration);
        assert_eq!(sent.len(), 1);
        assert!(sent[0].user.contains("- FAILED: Failed to execute unlock_door"));
        assert!(sent[0].user.contains("- three sharp knocks (moderate volume) at foyer"));
        assert!(sent[0].user.contains("knock on the door"));
    }

    #[tokio::test]
    async fn unavailable_service_falls_back_to_events() {
        let (narrator, _) = narrator(ScriptedLlm::new());
        let world: WorldState = StoreSnapshot::manor().into();
        let text = narrator.narrate(&world, &[], &report(), &CancellationToken::new()).await;
        assert_eq!(
            text,
            "* Player@foyer: knock on the door\n  (Failed to execute unlock_door: Error: no key)"
        );
    }
}

//! NPC thoughts and action decisions.

use std::sync::Arc;

use manor_llm::{CompletionBackend, PromptEngine, PromptId};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::store::or_cancelled;
use crate::world::NpcInfo;

/// Replies that mean "I do nothing".
const IDLE_REPLIES: &[&str] = &["none", "nothing", "no action", "n/a", "(nothing)"];

/// First non-blank line, trimmed, with wrapping quotes removed.
fn first_line(text: &str) -> Option<String> {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = line
        .strip_prefix('"')
        .and_then(|l| l.strip_suffix('"'))
        .unwrap_or(line)
        .trim();
    (!line.is_empty()).then(|| line.to_string())
}

/// Generates what an NPC thinks and decides to do.
pub struct NpcMind {
    llm: Arc<dyn CompletionBackend>,
    prompts: Arc<PromptEngine>,
}

impl NpcMind {
    /// Mind over `llm`.
    #[must_use]
    pub fn new(llm: Arc<dyn CompletionBackend>, prompts: Arc<PromptEngine>) -> Self {
        Self { llm, prompts }
    }

    async fn ask(&self, id: PromptId, vars: &[(&str, &str)], cancel: &CancellationToken) -> Option<String> {
        let request = self.prompts.request(id, vars).ok()?;
        match or_cancelled(cancel, self.llm.complete(&request)).await? {
            Ok(response) => first_line(&response.text),
            Err(e) => {
                debug!(prompt = %id, error = %e, "npc reasoning call failed");
                None
            }
        }
    }

    /// One private thought, or `None` if the call failed.
    pub async fn think(&self, npc: &NpcInfo, context: &str, cancel: &CancellationToken) -> Option<String> {
        self.ask(
            PromptId::NpcThoughts,
            &[
                ("npc_id", npc.id.as_str()),
                ("personality", npc.personality.as_str()),
                ("backstory", npc.backstory.as_str()),
                ("npc_context", context),
            ],
            cancel,
        )
        .await
    }

    /// The action `npc` takes given `thought`, or `None` for no action.
    pub async fn decide(
        &self,
        npc: &NpcInfo,
        context: &str,
        thought: &str,
        cancel: &CancellationToken,
    ) -> Option<String> {
        let action = self
            .ask(
                PromptId::NpcAction,
                &[
                    ("npc_id", npc.id.as_str()),
                    ("personality", npc.personality.as_str()),
                    ("npc_context", context),
                    ("thoughts", thought),
                ],
                cancel,
            )
            .await?;
        let lower = action.to_lowercase();
        let idle = IDLE_REPLIES.iter().any(|r| lower.trim_end_matches('.') == *r);
        (!idle).then_some(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedLlm;

    fn elena() -> NpcInfo {
        NpcInfo { id: "elena".into(), location: "library".into(), ..NpcInfo::default() }
    }

    #[test]
    fn first_line_strips_quotes() {
        assert_eq!(first_line("\n  \"Who's there?\"\nmore"), Some("Who's there?".into()));
        assert_eq!(first_line("   \n"), None);
        assert_eq!(first_line("\"\""), None);
    }

    #[tokio::test]
    async fn thought_then_action() {
        let llm = Arc::new(
            ScriptedLlm::new()
                .reply(PromptId::NpcThoughts, "Someone is shouting nearby.")
                .reply(PromptId::NpcAction, "I walk to the foyer"),
        );
        let mind = NpcMind::new(Arc::clone(&llm) as Arc<dyn CompletionBackend>, Arc::new(PromptEngine::builtin()));
        let cancel = CancellationToken::new();

        let thought = mind.think(&elena(), "ctx", &cancel).await.expect("thought");
        let action = mind.decide(&elena(), "ctx", &thought, &cancel).await;
        assert_eq!(action.as_deref(), Some("I walk to the foyer"));

        let sent = llm.requests_for(PromptId::NpcAction);
        assert!(sent[0].user.contains("YOUR THOUGHTS: Someone is shouting nearby."));
    }

    #[tokio::test]
    async fn idle_replies_mean_no_action() {
        let llm = ScriptedLlm::new().reply(PromptId::NpcAction, "Nothing.");
        let mind = NpcMind::new(Arc::new(llm), Arc::new(PromptEngine::builtin()));
        assert!(mind.decide(&elena(), "ctx", "hm", &CancellationToken::new()).await.is_none());
    }
}

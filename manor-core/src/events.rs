//! # Event Summarizer
//!
//! Canonical event lines for one turn. Lines are tagged
//! `Actor@location: content` so perception can route them; an untagged line
//! is ambient and reaches every listener.
//!
//! The phrasing call may fail or return nothing useful. Whatever it does, the
//! final list carries exactly one attempt line (`Actor@location: input`).

use std::collections::HashSet;
use std::sync::Arc;

use manor_llm::structured::{events_schema, parse_string_list};
use manor_llm::{CompletionBackend, PromptEngine, PromptId};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::executor::ExecutionResult;
use crate::store::or_cancelled;
use crate::world::Actor;

/// A parsed `Actor@location: content` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventLine<'a> {
    /// Actor tag.
    pub actor: &'a str,
    /// Location id.
    pub location: &'a str,
    /// What happened.
    pub content: &'a str,
}

impl<'a> EventLine<'a> {
    /// Parse a tagged line. `None` for untagged (ambient) lines.
    #[must_use]
    pub fn parse(line: &'a str) -> Option<Self> {
        let at = line.find('@')?;
        let colon = at + line[at..].find(':')?;
        let actor = line[..at].trim();
        let location = line[at + 1..colon].trim();
        if actor.is_empty() || location.is_empty() || actor.contains(char::is_whitespace) {
            return None;
        }
        Some(Self { actor, location, content: line[colon + 1..].trim() })
    }
}

/// Build a tagged line.
#[must_use]
pub fn tag_line(actor: &str, location: &str, content: &str) -> String {
    format!("{actor}@{location}: {content}")
}

/// The deterministic attempt line for `input`. Newlines fold to spaces.
#[must_use]
pub fn attempt_line(actor: &Actor, location: &str, input: &str) -> String {
    let flat = input.split_whitespace().collect::<Vec<_>>().join(" ");
    tag_line(actor.tag(), location, &flat)
}

fn normalize(line: &str) -> String {
    line.trim().to_lowercase()
}

/// Clean `events` and guarantee exactly one line equivalent to `attempt`.
///
/// Blank lines and exact duplicates go. If the list already holds lines
/// equivalent to the attempt (case-insensitive), the first is kept and the
/// rest dropped; otherwise the attempt line is prepended.
#[must_use]
pub fn ensure_attempt_line(events: Vec<String>, attempt: &str) -> Vec<String> {
    let wanted = normalize(attempt);
    let mut seen = HashSet::new();
    let mut has_attempt = false;
    let mut out = Vec::with_capacity(events.len() + 1);

    for line in events {
        let line = line.trim().to_string();
        if line.is_empty() || !seen.insert(line.clone()) {
            continue;
        }
        if normalize(&line) == wanted {
            if has_attempt {
                continue;
            }
            has_attempt = true;
        }
        out.push(line);
    }

    if !has_attempt {
        out.insert(0, attempt.trim().to_string());
    }
    out
}

/// One turn's raw outcome, as handed to the summarizer.
#[derive(Debug, Clone, Copy)]
pub struct TurnSummary<'a> {
    /// Who acted.
    pub actor: &'a Actor,
    /// Where they were when they acted.
    pub location: &'a str,
    /// What they said they would do.
    pub input: &'a str,
    /// What the executor reported.
    pub result: &'a ExecutionResult,
    /// `(from, to)` if the actor's location changed.
    pub location_change: Option<(&'a str, &'a str)>,
}

impl TurnSummary<'_> {
    /// The attempt line for this turn.
    #[must_use]
    pub fn attempt_line(&self) -> String {
        attempt_line(self.actor, self.location, self.input)
    }
}

fn bullet_list(lines: &[String]) -> String {
    if lines.is_empty() {
        return "- none".to_string();
    }
    lines.iter().map(|l| format!("- {l}")).collect::<Vec<_>>().join("\n")
}

/// Phrases a turn's canonical events.
pub struct EventSummarizer {
    llm: Arc<dyn CompletionBackend>,
    prompts: Arc<PromptEngine>,
}

impl EventSummarizer {
    /// Summarizer over `llm`.
    #[must_use]
    pub fn new(llm: Arc<dyn CompletionBackend>, prompts: Arc<PromptEngine>) -> Self {
        Self { llm, prompts }
    }

    /// Canonical lines for `turn`. Never empty.
    pub async fn summarize(&self, turn: &TurnSummary<'_>, cancel: &CancellationToken) -> Vec<String> {
        let attempt = turn.attempt_line();
        let phrased = match self.phrase(turn, cancel).await {
            Ok(lines) => lines,
            Err(reason) => {
                warn!(actor = %turn.actor, %reason, "event summary unavailable; using attempt line only");
                Vec::new()
            }
        };
        let events = ensure_attempt_line(phrased, &attempt);
        debug!(actor = %turn.actor, count = events.len(), "turn events");
        events
    }

    async fn phrase(&self, turn: &TurnSummary<'_>, cancel: &CancellationToken) -> Result<Vec<String>, String> {
        let successes = bullet_list(&turn.result.successes);
        let failures = bullet_list(&turn.result.failures);
        let change = turn
            .location_change
            .map_or_else(|| "none".to_string(), |(from, to)| format!("{from} -> {to}"));

        let request = self
            .prompts
            .request(PromptId::EventSummary, &[
                ("actor", turn.actor.tag()),
                ("location", turn.location),
                ("input", turn.input),
                ("successes", successes.as_str()),
                ("failures", failures.as_str()),
                ("location_change", change.as_str()),
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

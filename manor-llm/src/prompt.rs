//! Prompt templates for MANOR reasoning calls.
//!
//! Every prompt is a versioned, testable artifact. The built-in templates are
//! the `const` strings in this module; a directory of TOML files can override
//! any of them at startup.

/// Director prompt: turns an actor's intent into world mutations.
pub const DIRECTOR_SYSTEM: &str = r#"You are the Director of a text adventure game. Your role is to understand the acting character's intent and generate the specific world mutations needed to make it happen.

AVAILABLE TOOLS:
{tool_catalog}

WORLD STATE CONTEXT:
{world_context}

RULES:
- Parse the {actor_label} and decide what world mutations are needed
- Only use tools from the list above, with the exact argument names shown
- Be conservative: only generate mutations that directly relate to the stated action
- For movement: use move_player (it moves whoever is acting)
- For picking up items: use add_to_inventory
- For dropping items: use remove_from_inventory
- For opening a locked door: use unlock_door with the two connected location ids
- When a character learns an NPC's name: use mark_npc_as_met
- For examining, looking or talking: usually no mutations are needed
- NPCs can only affect items at their current location or their own movement

Return JSON format:
{"mutations": [{"tool": "move_player", "args": {"location": "kitchen"}}]}

If no mutations are needed, return {"mutations": []}."#;

/// Director user message.
pub const DIRECTOR_USER: &str = "{actor_label}: {intent}";

/// Prefix used when the planner is asked to correct a failed plan.
pub const RETRY_INTENT: &str =
    "Previous attempt failed with errors: {failures}. Please try a different approach for: {intent}";

/// Perception filter: selects the event lines an NPC could have perceived.
pub const PERCEPTION_SYSTEM: &str = r#"You decide what an NPC perceives in a text adventure.
Given a world snapshot and a list of canonical event lines from recent turns, select only the lines the NPC could plausibly perceive.
Rules:
- Return a JSON object with an "events" array containing strings strictly chosen from the provided event lines.
- Do not invent or paraphrase; copy the exact lines that would be perceived.
- Event lines may be tagged "Actor@location: ...". Prefer lines whose location matches the NPC's current room.
- Consider location, proximity, and what could be seen or heard (speech may carry to nearby rooms; be conservative).
- If nothing is perceived, return {"events": []}"#;

/// Perception user message.
pub const PERCEPTION_USER: &str = "NPC: {npc_id}

WORLD SNAPSHOT (for reasoning):
{world_context}

EVENT LINES:
{event_lines}";

/// Event summarizer: phrases the turn's canonical events.
pub const EVENT_SUMMARY_SYSTEM: &str = r#"You record what happened during one turn of a text adventure.
Write a short list of present-tense event lines describing the outcome.
Rules:
- Use only the information given: the action attempted, the world changes that succeeded, the ones that failed, and any change of location.
- Do not invent objects, sounds, people or outcomes.
- Tag each line with the acting character and the location where it happened: "Actor@location: text".
- One fact per line, at most five lines.
Return JSON: {"events": ["..."]}"#;

/// Event summarizer user message.
pub const EVENT_SUMMARY_USER: &str = "ACTOR: {actor}
LOCATION: {location}
ATTEMPTED: {input}

SUCCEEDED:
{successes}

FAILED:
{failures}

LOCATION CHANGE: {location_change}";

/// Sensory generator: at most one auditory event for an action.
pub const SENSORY_SYSTEM: &str = r#"You are a sensory event generator for a text adventure game. Generate descriptive auditory events for actions.

Rules:
- Generate only ONE event per action, at the location where it happens
- Use objective third-person descriptions: "someone shouted", "footsteps", "door creaking"
- Capture actual content when relevant: include spoken words, specific sounds
- Volume levels: "quiet", "moderate", "loud"
- Quiet actions like "look around" produce no events

Return JSON only:
{"auditory_events": [{"type": "auditory", "description": "someone shouted 'Elena, I'm here!'", "location": "foyer", "volume": "loud"}]}

If there is no sound, return an empty auditory_events array."#;

/// Sensory generator user message.
pub const SENSORY_USER: &str = "ACTOR: {actor}
LOCATION: {location}
ACTION: {input}
WORLD CHANGES:
{successes}";

/// NPC private thoughts.
pub const NPC_THOUGHTS_SYSTEM: &str = r"You are {npc_id}, an NPC in a text adventure game. You need to generate your internal thoughts based on the current world state and recent events.

Your character:
- Name: {npc_id}
- Personality: {personality}
- Backstory: {backstory}
- You react to sounds, people entering or leaving, and changes in your surroundings

Generate your internal thoughts based on what you observe, hear, or experience. This is your private mental state: no one else can hear these thoughts.

Return only your thoughts, nothing else. Keep it to one line.";

/// NPC thoughts user message.
pub const NPC_THOUGHTS_USER: &str = "{npc_context}";

/// NPC action decision.
pub const NPC_ACTION_SYSTEM: &str = r"You are {npc_id}, an NPC in a text adventure game. Personality: {personality}.
Based on your thoughts and surroundings, decide what you do next.

Rules:
- Answer with one brief first-person action statement, e.g. 'I walk to the foyer' or 'I say: Who is there?'
- Only act on what you have perceived; you cannot know about events you did not witness
- If you would do nothing, return an empty response";

/// NPC action user message.
pub const NPC_ACTION_USER: &str = "{npc_context}

YOUR THOUGHTS: {thoughts}

What do you do?";

/// Fact extraction from narration.
pub const FACT_EXTRACTION_SYSTEM: &str = r"Extract permanent, canonical facts about the location from this narration as directly experienced by the observer.

Write facts as short, precise descriptions WITHOUT repeating the location name:
- GOOD: 'has slanted light', 'smells of old paper', 'doormat is scuffed'

INCLUDE physical and architectural details, inherent properties and atmosphere.
EXCLUDE current actions, positions, temporary conditions and time-specific states.
Do not duplicate existing facts, even with different wording.

Return a JSON object {'facts': [...]} with each detail as a separate fact.";

/// Fact extraction user message.
pub const FACT_EXTRACTION_USER: &str = "Location: {location}

Narration: {narration}

Existing Facts (DO NOT duplicate):
{existing_facts}

Extract permanent canonical facts about this location:";

/// Fact attribution to entities.
pub const FACT_ATTRIBUTION_SYSTEM: &str = r#"You are attributing facts extracted from narration to the correct entities in a text adventure game.

AVAILABLE ENTITIES:
{world_entities}

ATTRIBUTION RULES:
1. Physical or architectural details about the space go to location_facts
2. Object-specific details go to item_facts
3. Character details (appearance, behaviour, traits) go to npc_facts
4. Skip facts that are semantically similar to existing facts
5. Permanent facts only: skip temporary states, emotions and positions

Return JSON with this exact structure:
{"location_facts": {"location_id": ["fact"]}, "item_facts": {"item_id": ["fact"]}, "npc_facts": {"npc_id": ["fact"]}, "skipped": ["fact (reason)"]}"#;

/// Fact attribution user message.
pub const FACT_ATTRIBUTION_USER: &str = "Attribute these extracted facts: {facts}";

/// Narration of a player turn.
pub const NARRATION_SYSTEM: &str = r"You are the narrator for a text adventure game. You have complete knowledge of the world state.

Your job: narrate the consequences and results of the player's action in 2-4 vivid sentences.

Rules:
- Focus on what happens as a RESULT of the action; the player already knows what they did
- Base narration on the world changes and sensory events listed; do not invent new sounds or events
- When NPCs speak, present their words as dialogue using quote marks
- If the action failed, explain why and suggest alternatives
- ALWAYS use present tense";

/// Narration user message.
pub const NARRATION_USER: &str = "{world_context}
ACTION THAT JUST OCCURRED:
{action}

WORLD CHANGES:
{world_changes}

SENSORY EVENTS THAT OCCURRED:
{sensory_events}";

/// Simple template interpolation for prompts.
///
/// Replaces `{key}` with the corresponding value.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{key}}}"), value);
    }
    result
}

// ---------------------------------------------------------------------------
// PromptEngine: Versioned TOML Template Loader
// ---------------------------------------------------------------------------

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::LlmError;
use crate::types::{CompletionRequest, ModelTier};

/// Identifies a prompt template by purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    /// Mutation planning (full model).
    Director,
    /// Per-NPC perception filter (light model).
    Perception,
    /// Canonical event lines for a turn (light model).
    EventSummary,
    /// Auditory events for a turn (light model).
    SensoryEvents,
    /// NPC private thought (light model).
    NpcThoughts,
    /// NPC action decision (full model).
    NpcAction,
    /// Location facts from narration (light model).
    FactExtraction,
    /// Fact to entity attribution (light model).
    FactAttribution,
    /// Player-facing narration (full model).
    Narration,
}

impl PromptId {
    /// Returns the TOML filename (without path) for this prompt.
    #[must_use]
    pub fn filename(self) -> &'static str {
        match self {
            Self::Director => "director.toml",
            Self::Perception => "perception.toml",
            Self::EventSummary => "event_summary.toml",
            Self::SensoryEvents => "sensory_events.toml",
            Self::NpcThoughts => "npc_thoughts.toml",
            Self::NpcAction => "npc_action.toml",
            Self::FactExtraction => "fact_extraction.toml",
            Self::FactAttribution => "fact_attribution.toml",
            Self::Narration => "narration.toml",
        }
    }

    /// All prompt IDs.
    #[must_use]
    pub fn all() -> &'static [PromptId] {
        &[
            Self::Director,
            Self::Perception,
            Self::EventSummary,
            Self::SensoryEvents,
            Self::NpcThoughts,
            Self::NpcAction,
            Self::FactExtraction,
            Self::FactAttribution,
            Self::Narration,
        ]
    }
}

impl fmt::Display for PromptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Director => "director",
            Self::Perception => "perception",
            Self::EventSummary => "event_summary",
            Self::SensoryEvents => "sensory_events",
            Self::NpcThoughts => "npc_thoughts",
            Self::NpcAction => "npc_action",
            Self::FactExtraction => "fact_extraction",
            Self::FactAttribution => "fact_attribution",
            Self::Narration => "narration",
        };
        write!(f, "{name}")
    }
}

impl FromStr for PromptId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PromptId::all()
            .iter()
            .copied()
            .find(|id| id.to_string() == s)
            .ok_or_else(|| format!("unknown prompt id: '{s}'"))
    }
}

/// Metadata and templates parsed from a TOML prompt file.
#[derive(Debug, Clone, Deserialize)]
struct TomlPromptFile {
    prompt: TomlPromptData,
}

/// Inner `[prompt]` section of a TOML file.
#[derive(Debug, Clone, Deserialize)]
struct TomlPromptData {
    version: String,
    tier: ModelTier,
    max_tokens: u32,
    temperature: f32,
    system: String,
    user: String,
}

/// A loaded, ready-to-render prompt template.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// Prompt version string (e.g., "1.0").
    pub version: String,
    /// Model tier the prompt runs on.
    pub tier: ModelTier,
    /// Maximum output tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// System prompt template (contains `{key}` placeholders).
    pub system: String,
    /// User prompt template (contains `{key}` placeholders).
    pub user: String,
}

impl PromptTemplate {
    fn builtin(tier: ModelTier, max_tokens: u32, temperature: f32, system: &str, user: &str) -> Self {
        Self {
            version: "builtin".into(),
            tier,
            max_tokens,
            temperature,
            system: system.into(),
            user: user.into(),
        }
    }
}

/// Engine that holds prompt templates and renders them into requests.
///
/// # Example
///
/// ```
/// use manor_llm::prompt::{PromptEngine, PromptId};
///
/// let engine = PromptEngine::builtin();
/// let request = engine
///     .request(PromptId::Director, &[("actor_label", "Player action"), ("intent", "go north")])
///     .expect("director is built in");
/// assert!(request.user.contains("go north"));
/// ```
#[derive(Debug, Clone)]
pub struct PromptEngine {
    templates: HashMap<PromptId, PromptTemplate>,
}

impl PromptEngine {
    /// Create a `PromptEngine` pre-loaded with the built-in constant templates.
    #[must_use]
    pub fn builtin() -> Self {
        use ModelTier::{Full, Light};

        let templates = HashMap::from([
            (PromptId::Director, PromptTemplate::builtin(Full, 1000, 0.2, DIRECTOR_SYSTEM, DIRECTOR_USER)),
            (PromptId::Perception, PromptTemplate::builtin(Light, 2000, 0.0, PERCEPTION_SYSTEM, PERCEPTION_USER)),
            (PromptId::EventSummary, PromptTemplate::builtin(Light, 400, 0.2, EVENT_SUMMARY_SYSTEM, EVENT_SUMMARY_USER)),
            (PromptId::SensoryEvents, PromptTemplate::builtin(Light, 300, 0.4, SENSORY_SYSTEM, SENSORY_USER)),
            (PromptId::NpcThoughts, PromptTemplate::builtin(Light, 100, 0.8, NPC_THOUGHTS_SYSTEM, NPC_THOUGHTS_USER)),
            (PromptId::NpcAction, PromptTemplate::builtin(Full, 80, 0.7, NPC_ACTION_SYSTEM, NPC_ACTION_USER)),
            (PromptId::FactExtraction, PromptTemplate::builtin(Light, 150, 0.2, FACT_EXTRACTION_SYSTEM, FACT_EXTRACTION_USER)),
            (PromptId::FactAttribution, PromptTemplate::builtin(Light, 2000, 0.0, FACT_ATTRIBUTION_SYSTEM, FACT_ATTRIBUTION_USER)),
            (PromptId::Narration, PromptTemplate::builtin(Full, 300, 0.8, NARRATION_SYSTEM, NARRATION_USER)),
        ]);

        Self { templates }
    }

    /// Load prompt templates from a directory of TOML files.
    ///
    /// Each TOML file must match a known [`PromptId`] filename.
    /// Unknown files are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if a TOML file exists but cannot be parsed, or if the
    /// directory holds no prompt files at all.
    pub fn from_directory(dir: impl AsRef<Path>) -> Result<Self, LlmError> {
        let dir = dir.as_ref();
        let mut templates = HashMap::new();

        for id in PromptId::all() {
            let path: PathBuf = dir.join(id.filename());
            if path.exists() {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    LlmError::PromptOverride(format!("failed to read {}: {e}", path.display()))
                })?;
                let parsed: TomlPromptFile = toml::from_str(&content).map_err(|e| {
                    LlmError::PromptOverride(format!("failed to parse {}: {e}", path.display()))
                })?;

                let d = parsed.prompt;
                templates.insert(*id, PromptTemplate {
                    version: d.version,
                    tier: d.tier,
                    max_tokens: d.max_tokens,
                    temperature: d.temperature,
                    system: d.system,
                    user: d.user,
                });
            }
        }

        if templates.is_empty() {
            return Err(LlmError::PromptOverride(format!(
                "no prompt templates found in directory: {}",
                dir.display()
            )));
        }

        Ok(Self { templates })
    }

    /// Built-in templates with any files in `dir` taking precedence.
    ///
    /// # Errors
    ///
    /// Same as [`PromptEngine::from_directory`].
    pub fn builtin_with_overrides(dir: impl AsRef<Path>) -> Result<Self, LlmError> {
        let mut engine = Self::builtin();
        engine.templates.extend(Self::from_directory(dir)?.templates);
        Ok(engine)
    }

    /// Get a loaded prompt template by ID.
    #[must_use]
    pub fn get(&self, id: PromptId) -> Option<&PromptTemplate> {
        self.templates.get(&id)
    }

    /// Render both system and user prompts for a given ID.
    ///
    /// Returns `(system_prompt, user_prompt)` with all `{key}` placeholders
    /// replaced.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::PromptNotLoaded`] if the prompt ID is not loaded.
    pub fn render(&self, id: PromptId, vars: &[(&str, &str)]) -> Result<(String, String), LlmError> {
        let tpl = self.get(id).ok_or(LlmError::PromptNotLoaded(id))?;
        let system = render_template(&tpl.system, vars);
        let user = render_template(&tpl.user, vars);
        Ok((system, user))
    }

    /// Render a template into a ready-to-send request using its tier and sampling settings.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::PromptNotLoaded`] if the prompt ID is not loaded.
    pub fn request(&self, id: PromptId, vars: &[(&str, &str)]) -> Result<CompletionRequest, LlmError> {
        let tpl = self.get(id).ok_or(LlmError::PromptNotLoaded(id))?;
        let (system, user) = self.render(id, vars)?;
        let base = match tpl.tier {
            ModelTier::Light => CompletionRequest::light(id, system, user),
            ModelTier::Full => CompletionRequest::full(id, system, user),
        };
        Ok(base
            .with_max_tokens(tpl.max_tokens)
            .with_temperature(tpl.temperature))
    }

    /// Number of loaded templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether no templates are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// List all loaded prompt IDs.
    #[must_use]
    pub fn loaded_ids(&self) -> Vec<PromptId> {
        self.templates.keys().copied().collect()
    }
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_rendering_works() {
        let rendered = render_template(
            "Hello {name}, you are in the {room}.",
            &[("name", "Elena"), ("room", "library")],
        );
        assert_eq!(rendered, "Hello Elena, you are in the library.");
    }

    #[test]
    fn template_handles_missing_vars() {
        let rendered = render_template("Hello {name}, {unknown}.", &[("name", "Elena")]);
        assert_eq!(rendered, "Hello Elena, {unknown}.");
    }

    #[test]
    fn json_examples_survive_rendering() {
        let (system, _) = PromptEngine::builtin()
            .render(PromptId::Director, &[("tool_catalog", "- move_player"), ("world_context", "")])
            .expect("render");
        assert!(system.contains(r#"{"mutations": []}"#));
        assert!(system.contains("- move_player"));
    }

    #[test]
    fn prompt_id_from_str_round_trip() {
        for id in PromptId::all() {
            let s = id.to_string();
            let parsed: PromptId = s.parse().expect("should parse");
            assert_eq!(*id, parsed);
        }
    }

    #[test]
    fn prompt_id_unknown_returns_err() {
        assert!("nonexistent".parse::<PromptId>().is_err());
    }

    #[test]
    fn builtin_engine_has_every_template() {
        let engine = PromptEngine::builtin();
        assert_eq!(engine.len(), PromptId::all().len());
        for id in PromptId::all() {
            assert!(engine.get(*id).is_some(), "{id} missing");
        }
    }

    #[test]
    fn request_uses_template_tier() {
        let engine = PromptEngine::builtin();
        let perception = engine.request(PromptId::Perception, &[]).expect("perception");
        assert_eq!(perception.tier, ModelTier::Light);
        assert_eq!(perception.purpose, PromptId::Perception);
        let director = engine.request(PromptId::Director, &[]).expect("director");
        assert_eq!(director.tier, ModelTier::Full);
    }

    #[test]
    fn from_directory_loads_toml_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("narration.toml"),
            r#"
[prompt]
version = "2.0"
tier = "light"
max_tokens = 120
temperature = 0.5
system = "Narrate tersely."
user = "{action}"
"#,
        )
        .expect("write");

        let engine = PromptEngine::from_directory(dir.path()).expect("should load");
        assert_eq!(engine.len(), 1);
        let tpl = engine.get(PromptId::Narration).expect("narration");
        assert_eq!(tpl.version, "2.0");
        assert_eq!(tpl.tier, ModelTier::Light);

        let merged = PromptEngine::builtin_with_overrides(dir.path()).expect("merge");
        assert_eq!(merged.len(), PromptId::all().len());
        assert_eq!(merged.get(PromptId::Narration).map(|t| t.system.as_str()), Some("Narrate tersely."));
    }

    #[test]
    fn from_directory_errors_on_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(PromptEngine::from_directory(dir.path()).is_err());
    }
}

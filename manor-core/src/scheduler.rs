//! # Turn Scheduler
//!
//! Alternates control between the player and every NPC:
//!
//! ```text
//! PlayerTurn ──player_turn──► AwaitingNarration ──narration_completed──► NpcTurn(0)
//!     ▲                                                                      │ npc_turn
//!     └──────────────────────────── after the last NPC ◄─── NpcTurn(i+1) ◄──┘
//! ```
//!
//! [`TurnCycle`] is the bare state machine; [`TurnScheduler`] drives the
//! per-actor pipeline on top of it:
//!
//! Intent → Execution (with retry) → Sync → Summarization → (NPCs) Perception.
//!
//! A broken turn never stalls the cycle: planning failures become a failure
//! line and the attempt event, and control moves on.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use manor_llm::{CompletionBackend, PromptEngine};
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::TurnsConfig;
use crate::context::npc_context;
use crate::error::ManorError;
use crate::events::{EventSummarizer, TurnSummary, attempt_line, ensure_attempt_line};
use crate::executor::{ExecutionResult, MutationExecutor};
use crate::facts::{FactRecorder, FactReport};
use crate::history::History;
use crate::log::{TurnLog, Unseen};
use crate::mutation::MutationRequest;
use crate::npc::NpcMind;
use crate::perception::{HeardSound, PerceptionEngine, SensoryEvent, audible_sounds};
use crate::planner::{PlanRequest, Planner};
use crate::retry::{RetryCoordinator, RetryScope};
use crate::sensory::SensoryGenerator;
use crate::store::WorldStore;
use crate::sync::WorldSync;
use crate::tools::ToolRegistry;
use crate::world::{Actor, NpcInfo, WorldState};

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Whose move it is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum TurnPhase {
    /// Waiting for player input.
    #[default]
    PlayerTurn,
    /// The player's turn ran; its narration has not finished.
    AwaitingNarration,
    /// The i-th NPC of the captured order acts next.
    NpcTurn(usize),
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlayerTurn => f.write_str("player turn"),
            Self::AwaitingNarration => f.write_str("awaiting narration"),
            Self::NpcTurn(i) => write!(f, "NPC turn {i}"),
        }
    }
}

/// The turn state machine, free of any pipeline or UI concern.
#[derive(Debug, Clone, Default)]
pub struct TurnCycle {
    phase: TurnPhase,
    npc_order: Vec<String>,
}

impl TurnCycle {
    /// Cycle waiting for the player.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// NPC order captured at the last narration completion.
    #[must_use]
    pub fn npc_order(&self) -> &[String] {
        &self.npc_order
    }

    /// The NPC whose turn it is.
    #[must_use]
    pub fn current_npc(&self) -> Option<&str> {
        match self.phase {
            TurnPhase::NpcTurn(i) => self.npc_order.get(i).map(String::as_str),
            _ => None,
        }
    }

    fn out_of_turn(&self, action: &'static str) -> ManorError {
        ManorError::OutOfTurn { action, phase: self.phase.to_string() }
    }

    /// The current actor finished its turn.
    ///
    /// # Errors
    ///
    /// [`ManorError::OutOfTurn`] while awaiting narration.
    pub fn on_turn_completed(&mut self) -> Result<TurnPhase, ManorError> {
        self.phase = match self.phase {
            TurnPhase::PlayerTurn => TurnPhase::AwaitingNarration,
            TurnPhase::NpcTurn(i) if i + 1 < self.npc_order.len() => TurnPhase::NpcTurn(i + 1),
            TurnPhase::NpcTurn(_) => {
                self.npc_order.clear();
                TurnPhase::PlayerTurn
            }
            TurnPhase::AwaitingNarration => return Err(self.out_of_turn("complete a turn")),
        };
        Ok(self.phase)
    }

    /// The player's narration finished; start one cycle over `npcs`.
    ///
    /// # Errors
    ///
    /// [`ManorError::OutOfTurn`] unless awaiting narration.
    pub fn on_narration_completed(&mut self, npcs: Vec<String>) -> Result<TurnPhase, ManorError> {
        if self.phase != TurnPhase::AwaitingNarration {
            return Err(self.out_of_turn("complete narration"));
        }
        self.phase = if npcs.is_empty() { TurnPhase::PlayerTurn } else { TurnPhase::NpcTurn(0) };
        self.npc_order = npcs;
        Ok(self.phase)
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Everything one actor-turn produced.
#[derive(Debug, Clone, Serialize)]
pub struct TurnReport {
    /// Unique turn id.
    pub id: Uuid,
    /// When the turn started.
    pub started_at: DateTime<Utc>,
    /// Who acted.
    pub actor: Actor,
    /// What they tried. `None` for an idle NPC turn.
    pub input: Option<String>,
    /// Why planning failed, if it did.
    pub plan_error: Option<String>,
    /// Accumulated successes, last batch's failures.
    pub result: ExecutionResult,
    /// Execution attempts.
    pub attempts: usize,
    /// Re-planning calls.
    pub replans: usize,
    /// Canonical event lines.
    pub events: Vec<String>,
    /// Sounds the turn made.
    pub sounds: Vec<SensoryEvent>,
    /// NPC turns: lines perceived before acting.
    pub perceived: Vec<String>,
    /// NPC turns: sounds heard before acting.
    pub heard: Vec<HeardSound>,
    /// NPC turns: the private thought.
    pub thought: Option<String>,
    /// Whether the post-turn sync succeeded.
    pub synced: bool,
}

impl TurnReport {
    /// An empty report for `actor` trying `input`.
    #[must_use]
    pub fn new(actor: Actor, input: Option<&str>) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            actor,
            input: input.map(str::to_string),
            plan_error: None,
            result: ExecutionResult::default(),
            attempts: 0,
            replans: 0,
            events: Vec::new(),
            sounds: Vec::new(),
            perceived: Vec::new(),
            heard: Vec::new(),
            thought: None,
            synced: false,
        }
    }

    /// Whether the actor did nothing.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.input.is_none()
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// External collaborators the scheduler drives.
#[derive(Clone)]
pub struct SchedulerDeps {
    /// Authoritative world state.
    pub store: Arc<dyn WorldStore>,
    /// Completion service for every non-planning call.
    pub llm: Arc<dyn CompletionBackend>,
    /// Intent interpreter.
    pub planner: Arc<dyn Planner>,
    /// Mutation tools.
    pub registry: Arc<ToolRegistry>,
    /// Prompt templates.
    pub prompts: Arc<PromptEngine>,
}

/// Drives actor turns through the pipeline.
pub struct TurnScheduler {
    deps: SchedulerDeps,
    turns: TurnsConfig,
    cycle: TurnCycle,
    world: WorldState,
    history: History,
    log: TurnLog,
    summarizer: EventSummarizer,
    perception: PerceptionEngine,
    sensory: SensoryGenerator,
    mind: NpcMind,
    facts: FactRecorder,
}

impl TurnScheduler {
    /// Scheduler starting from `world`.
    #[must_use]
    pub fn new(deps: SchedulerDeps, turns: TurnsConfig, world: WorldState) -> Self {
        let llm = &deps.llm;
        let prompts = &deps.prompts;
        Self {
            summarizer: EventSummarizer::new(Arc::clone(llm), Arc::clone(prompts)),
            perception: PerceptionEngine::new(Arc::clone(llm), Arc::clone(prompts))
                .with_semantic(turns.semantic_perception),
            sensory: SensoryGenerator::new(Arc::clone(llm), Arc::clone(prompts)),
            mind: NpcMind::new(Arc::clone(llm), Arc::clone(prompts)),
            facts: FactRecorder::new(Arc::clone(llm), Arc::clone(prompts)),
            history: History::new(turns.history_size),
            log: TurnLog::new(),
            cycle: TurnCycle::new(),
            world,
            turns,
            deps,
        }
    }

    /// Scheduler starting from the store's current snapshot.
    ///
    /// # Errors
    ///
    /// [`ManorError::Sync`] if the initial fetch fails.
    pub async fn connect(
        deps: SchedulerDeps,
        turns: TurnsConfig,
        cancel: &CancellationToken,
    ) -> Result<Self, ManorError> {
        let world = WorldSync::new(deps.store.as_ref()).fetch(cancel).await?;
        Ok(Self::new(deps, turns, world))
    }

    /// Cached snapshot.
    #[must_use]
    pub fn world(&self) -> &WorldState {
        &self.world
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> TurnPhase {
        self.cycle.phase()
    }

    /// History lines, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.history.lines()
    }

    /// The player acts. Only legal in [`TurnPhase::PlayerTurn`].
    ///
    /// # Errors
    ///
    /// [`ManorError::OutOfTurn`] in any other phase.
    pub async fn player_turn(&mut self, input: &str, cancel: &CancellationToken) -> Result<TurnReport, ManorError> {
        if self.cycle.phase() != TurnPhase::PlayerTurn {
            return Err(self.cycle.out_of_turn("take a player turn"));
        }
        let report = self.actor_turn(Actor::Player, input, cancel).await;
        self.cycle.on_turn_completed()?;
        Ok(report)
    }

    /// Record the narration of the player's turn and the facts it establishes.
    pub async fn record_narration(&mut self, narration: &str, cancel: &CancellationToken) -> FactReport {
        self.history.record_narration(narration);
        let report = self.facts.record(narration, &self.world, self.deps.store.as_ref(), cancel).await;
        if report.recorded > 0 {
            self.sync_world(cancel).await;
        }
        report
    }

    /// The player's narration finished; the NPC cycle begins.
    ///
    /// # Errors
    ///
    /// [`ManorError::OutOfTurn`] unless awaiting narration.
    pub fn narration_completed(&mut self) -> Result<TurnPhase, ManorError> {
        let order = self.world.npc_ids();
        let phase = self.cycle.on_narration_completed(order)?;
        info!(npcs = self.cycle.npc_order().len(), "NPC cycle started");
        Ok(phase)
    }

    /// The current NPC acts.
    ///
    /// # Errors
    ///
    /// [`ManorError::OutOfTurn`] outside [`TurnPhase::NpcTurn`].
    pub async fn npc_turn(&mut self, cancel: &CancellationToken) -> Result<TurnReport, ManorError> {
        let Some(npc_id) = self.cycle.current_npc().map(str::to_string) else {
            return Err(self.cycle.out_of_turn("take an NPC turn"));
        };

        let unseen = self.log.unseen_by(&npc_id);
        self.log.mark_seen(&npc_id);

        let report = match self.world.npc(&npc_id).cloned() {
            Some(npc) => self.npc_pipeline(npc, unseen, cancel).await,
            None => {
                warn!(npc = %npc_id, "NPC left the world; skipping turn");
                TurnReport::new(Actor::Npc(npc_id), None)
            }
        };

        let present = self.world.npc_ids();
        self.log.compact(&present);
        self.cycle.on_turn_completed()?;
        Ok(report)
    }

    /// Run every remaining NPC turn of the current cycle.
    ///
    /// # Errors
    ///
    /// [`ManorError::OutOfTurn`] while awaiting narration.
    pub async fn run_npc_cycle(&mut self, cancel: &CancellationToken) -> Result<Vec<TurnReport>, ManorError> {
        if self.cycle.phase() == TurnPhase::AwaitingNarration {
            return Err(self.cycle.out_of_turn("run the NPC cycle"));
        }
        let mut reports = Vec::new();
        while matches!(self.cycle.phase(), TurnPhase::NpcTurn(_)) {
            reports.push(self.npc_turn(cancel).await?);
        }
        Ok(reports)
    }

    async fn sync_world(&mut self, cancel: &CancellationToken) -> bool {
        WorldSync::new(self.deps.store.as_ref())
            .refresh(&mut self.world, cancel)
            .await
            .is_ok()
    }

    async fn npc_pipeline(&mut self, npc: NpcInfo, unseen: Unseen, cancel: &CancellationToken) -> TurnReport {
        let actor = Actor::npc(npc.id.clone());

        let perceived = self.perception.perceive(&npc.id, &self.world, &unseen.events, cancel).await;
        let heard = audible_sounds(&self.world, &npc.location, &unseen.sounds);
        let context = npc_context(&self.world, &npc.id, &perceived, &heard);

        let thought = self.mind.think(&npc, &context, cancel).await;
        let action = match &thought {
            Some(thought) => self.mind.decide(&npc, &context, thought, cancel).await,
            None => None,
        };
        let remembered = self.remember(&actor, thought.as_deref(), action.as_deref(), cancel).await;

        let mut report = match &action {
            Some(action) => self.actor_turn(actor, action, cancel).await,
            None => {
                let mut idle = TurnReport::new(actor, None);
                if remembered {
                    idle.synced = self.sync_world(cancel).await;
                }
                idle
            }
        };
        report.perceived = perceived;
        report.heard = heard;
        report.thought = thought;
        info!(npc = %npc.id, idle = report.is_idle(), events = report.events.len(), "NPC turn finished");
        report
    }

    /// Record `thought` and `action` through the executor. Returns whether anything was written.
    async fn remember(
        &self,
        actor: &Actor,
        thought: Option<&str>,
        action: Option<&str>,
        cancel: &CancellationToken,
    ) -> bool {
        if thought.is_none() && action.is_none() {
            return false;
        }
        let mut args = json!({ "npc_id": actor.id() });
        if let Some(thought) = thought {
            args["thought"] = json!(thought);
        }
        if let Some(action) = action {
            args["action"] = json!(action);
        }
        let request = [MutationRequest::new("update_npc_memory", args)];
        let result = MutationExecutor::new(&self.deps.registry, self.deps.store.as_ref())
            .execute(&request, &self.world, actor, cancel)
            .await;
        for failure in &result.failures {
            warn!(actor = %actor, %failure, "NPC memory not recorded");
        }
        result.is_clean()
    }

    async fn actor_turn(&mut self, actor: Actor, input: &str, cancel: &CancellationToken) -> TurnReport {
        let mut report = TurnReport::new(actor.clone(), Some(input));
        let origin = self.world.actor_location(&actor).unwrap_or("unknown").to_string();
        let history = self.history.lines();
        self.history.record_actor(&actor, input);

        let request = PlanRequest { intent: input, actor: &actor, world: &self.world, history: &history };
        match self.deps.planner.plan(request, cancel).await {
            Ok(plan) => {
                let executor = MutationExecutor::new(&self.deps.registry, self.deps.store.as_ref());
                let coordinator = RetryCoordinator::new(executor, self.deps.planner.as_ref())
                    .with_max_attempts(self.turns.effective_max_attempts());
                let scope = RetryScope { intent: input, actor: &actor, world: &self.world, history: &history };
                let outcome = coordinator.run(scope, plan, cancel).await;
                report.result = outcome.result;
                report.attempts = outcome.attempts;
                report.replans = outcome.replans;
            }
            Err(e) => {
                warn!(actor = %actor, error = %e, "planning failed");
                report.plan_error = Some(e.to_string());
                report.result.failures.push(format!("Failed to process action: {e}"));
            }
        }

        report.synced = self.sync_world(cancel).await;

        if report.plan_error.is_some() {
            report.events = ensure_attempt_line(Vec::new(), &attempt_line(&actor, &origin, input));
        } else {
            let current = self
                .world
                .actor_location(&actor)
                .map_or_else(|| origin.clone(), str::to_string);
            let summary = TurnSummary {
                actor: &actor,
                location: &origin,
                input,
                result: &report.result,
                location_change: (current != origin).then_some((origin.as_str(), current.as_str())),
            };
            report.events = self.summarizer.summarize(&summary, cancel).await;
            if self.turns.sensory_events {
                report.sounds = self
                    .sensory
                    .generate(&actor, &origin, input, &report.result.successes, cancel)
                    .await;
            }
        }

        info!(
            actor = %actor,
            successes = report.result.successes.len(),
            failures = report.result.failures.len(),
            attempts = report.attempts,
            synced = report.synced,
            "turn finished"
        );
        self.log.record(actor, report.events.clone(), report.sounds.clone());
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_walks_every_npc_then_returns_to_player() {
        let mut cycle = TurnCycle::new();
        assert_eq!(cycle.phase(), TurnPhase::PlayerTurn);
        assert_eq!(cycle.on_turn_completed().expect("player done"), TurnPhase::AwaitingNarration);
        assert_eq!(
            cycle.on_narration_completed(vec!["a".into(), "b".into()]).expect("narrated"),
            TurnPhase::NpcTurn(0)
        );
        assert_eq!(cycle.current_npc(), Some("a"));
        assert_eq!(cycle.on_turn_completed().expect("a done"), TurnPhase::NpcTurn(1));
        assert_eq!(cycle.current_npc(), Some("b"));
        assert_eq!(cycle.on_turn_completed().expect("b done"), TurnPhase::PlayerTurn);
        assert!(cycle.npc_order().is_empty());
    }

    #[test]
    fn no_npcs_goes_straight_back_to_player() {
        let mut cycle = TurnCycle::new();
        cycle.on_turn_completed().expect("player done");
        assert_eq!(cycle.on_narration_completed(vec![]).expect("narrated"), TurnPhase::PlayerTurn);
    }

    #[test]
    fn out_of_order_signals_are_rejected() {
        let mut cycle = TurnCycle::new();
        let err = cycle.on_narration_completed(vec!["a".into()]).expect_err("not awaiting narration");
        assert_eq!(err.to_string(), "out of turn: cannot complete narration during player turn");

        cycle.on_turn_completed().expect("player done");
        assert!(cycle.on_turn_completed().is_err());
        assert_eq!(cycle.phase(), TurnPhase::AwaitingNarration);
    }
}

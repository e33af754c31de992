//! # Intent Interpreter
//!
//! Turns an actor's free-text intent into an [`ActionPlan`] by asking the
//! completion service. The tool catalog in the prompt is fetched from the
//! store each time, so the planner only ever sees tools the store serves.

use std::sync::Arc;

use async_trait::async_trait;
use manor_llm::{CompletionBackend, PromptEngine, PromptId};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::context::world_context;
use crate::error::PlanningError;
use crate::mutation::ActionPlan;
use crate::store::{WorldStore, or_cancelled, render_catalog};
use crate::world::{Actor, WorldState};

/// Everything the planner needs for one intent.
#[derive(Debug, Clone, Copy)]
pub struct PlanRequest<'a> {
    /// What the actor wants to do.
    pub intent: &'a str,
    /// Who is acting.
    pub actor: &'a Actor,
    /// Snapshot the plan is made against.
    pub world: &'a WorldState,
    /// Recent history lines.
    pub history: &'a [String],
}

/// Produces action plans.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Plan mutations for `request`.
    ///
    /// # Errors
    ///
    /// [`PlanningError`] if the planner could not be reached or the request
    /// was cancelled. Unparseable replies are an empty plan, not an error.
    async fn plan(&self, request: PlanRequest<'_>, cancel: &CancellationToken) -> Result<ActionPlan, PlanningError>;
}

/// The completion-backed planner.
pub struct IntentInterpreter {
    llm: Arc<dyn CompletionBackend>,
    store: Arc<dyn WorldStore>,
    prompts: Arc<PromptEngine>,
}

impl IntentInterpreter {
    /// Planner over `llm`, listing tools from `store`.
    #[must_use]
    pub fn new(llm: Arc<dyn CompletionBackend>, store: Arc<dyn WorldStore>, prompts: Arc<PromptEngine>) -> Self {
        Self { llm, store, prompts }
    }
}

#[async_trait]
impl Planner for IntentInterpreter {
    async fn plan(&self, request: PlanRequest<'_>, cancel: &CancellationToken) -> Result<ActionPlan, PlanningError> {
        let tools = self
            .store
            .list_tools(cancel)
            .await
            .map_err(PlanningError::Catalog)?;
        let catalog = render_catalog(&tools);
        let context = world_context(request.world, request.actor, request.history);
        let label = request.actor.action_label();

        let completion = self
            .prompts
            .request(PromptId::Director, &[
                ("tool_catalog", catalog.as_str()),
                ("world_context", context.as_str()),
                ("actor_label", label.as_str()),
                ("intent", request.intent),
            ])?
            .json_object();

        let response = or_cancelled(cancel, self.llm.complete(&completion))
            .await
            .ok_or(PlanningError::Cancelled)??;

        let plan = ActionPlan::from_response(&response.text);
        info!(
            actor = %request.actor,
            mutations = plan.len(),
            latency_ms = response.latency_ms,
            "plan received"
        );
        debug!(actor = %request.actor, raw = %response.text, "planner reply");
        Ok(plan)
    }
}

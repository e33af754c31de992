//! # Retry Coordinator
//!
//! One plan, at most one corrected plan. The coordinator is an explicit state
//! machine so the bound is visible in one place:
//!
//! ```text
//! Execute(0, plan) ──clean──────────────────────────────► Done
//!      │ failures, attempts < bound
//!      ▼
//! Replan(failures) ──planner error─► Done (keep attempt 0 failures)
//!      │ new plan
//!      ▼
//! Execute(1, new plan) ─────────────────────────────────► Done
//! ```
//!
//! Successes accumulate across attempts. Failures are those of the last
//! executed batch only; a failed mutation the corrected plan leaves out is
//! not reported again. The corrected plan executes against a working copy
//! that already reflects the first batch's accepted moves.

use manor_llm::prompt::{RETRY_INTENT, render_template};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::executor::{ExecutionResult, MutationExecutor};
use crate::mutation::ActionPlan;
use crate::planner::{PlanRequest, Planner};
use crate::world::{Actor, WorldState};

/// Total execution attempts allowed for one intent.
pub const MAX_ATTEMPTS: usize = 2;

/// What the coordinator did for one intent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetryOutcome {
    /// Accumulated successes, last batch's failures.
    pub result: ExecutionResult,
    /// Execution attempts made.
    pub attempts: usize,
    /// Re-planning calls made.
    pub replans: usize,
}

enum RetryState {
    Execute { plan: ActionPlan },
    Replan { failures: Vec<String> },
    Done { failures: Vec<String> },
}

/// The intent being retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryScope<'a> {
    /// Original intent text.
    pub intent: &'a str,
    /// Who is acting.
    pub actor: &'a Actor,
    /// Pre-turn snapshot.
    pub world: &'a WorldState,
    /// Recent history for re-planning.
    pub history: &'a [String],
}

/// Runs a plan with one bounded re-plan on failure.
pub struct RetryCoordinator<'a> {
    executor: MutationExecutor<'a>,
    planner: &'a dyn Planner,
    max_attempts: usize,
}

impl<'a> RetryCoordinator<'a> {
    /// Coordinator with the default bound of [`MAX_ATTEMPTS`].
    #[must_use]
    pub fn new(executor: MutationExecutor<'a>, planner: &'a dyn Planner) -> Self {
        Self { executor, planner, max_attempts: MAX_ATTEMPTS }
    }

    /// Lower the bound. Values are clamped to `1..=MAX_ATTEMPTS`.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.clamp(1, MAX_ATTEMPTS);
        self
    }

    /// The retry request quoting the original intent and the failures.
    #[must_use]
    pub fn retry_intent(intent: &str, failures: &[String]) -> String {
        let joined = failures.join("; ");
        render_template(RETRY_INTENT, &[("failures", joined.as_str()), ("intent", intent)])
    }

    /// Execute `plan` for `scope`, re-planning once if it fails.
    pub async fn run(&self, scope: RetryScope<'_>, plan: ActionPlan, cancel: &CancellationToken) -> RetryOutcome {
        let mut outcome = RetryOutcome::default();
        let mut state = RetryState::Execute { plan };
        let mut working = scope.world.clone();

        loop {
            state = match state {
                RetryState::Execute { plan } => {
                    outcome.attempts += 1;
                    let batch = self
                        .executor
                        .execute_tracked(&plan.mutations, &mut working, scope.actor, cancel)
                        .await;
                    outcome.result.successes.extend(batch.successes);
                    let failures = batch.failures;

                    if failures.is_empty() || outcome.attempts >= self.max_attempts || cancel.is_cancelled() {
                        RetryState::Done { failures }
                    } else {
                        RetryState::Replan { failures }
                    }
                }
                RetryState::Replan { failures } => {
                    outcome.replans += 1;
                    let intent = Self::retry_intent(scope.intent, &failures);
                    info!(actor = %scope.actor, failed = failures.len(), "re-planning after failures");
                    let request = PlanRequest {
                        intent: &intent,
                        actor: scope.actor,
                        world: scope.world,
                        history: scope.history,
                    };
                    match self.planner.plan(request, cancel).await {
                        Ok(plan) => RetryState::Execute { plan },
                        Err(e) => {
                            warn!(actor = %scope.actor, error = %e, "re-planning failed");
                            RetryState::Done { failures }
                        }
                    }
                }
                RetryState::Done { failures } => {
                    outcome.result.failures = failures;
                    return outcome;
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::InMemoryWorldStore;
    use crate::mutation::MutationRequest;
    use crate::testing::FixedPlanner;
    use crate::tools::ToolRegistry;
    use serde_json::json;

    fn scope<'a>(world: &'a WorldState, actor: &'a Actor) -> RetryScope<'a> {
        RetryScope { intent: "go to the study", actor, world, history: &[] }
    }

    fn plan(location: &str) -> ActionPlan {
        ActionPlan::new(vec![MutationRequest::new("move_player", json!({ "location": location }))])
    }

    #[tokio::test]
    async fn clean_plan_is_not_retried() {
        let store = InMemoryWorldStore::manor();
        let world = store.world();
        let registry = ToolRegistry::standard();
        let planner = FixedPlanner::new(vec![]);
        let coordinator = RetryCoordinator::new(MutationExecutor::new(&registry, &store), &planner);

        let out = coordinator.run(scope(&world, &Actor::Player), plan("kitchen"), &CancellationToken::new()).await;
        assert_eq!(out.attempts, 1);
        assert_eq!(out.replans, 0);
        assert_eq!(out.result.successes, ["Moved to kitchen"]);
        assert_eq!(planner.calls(), 0);
    }

    #[tokio::test]
    async fn always_failing_plan_stops_after_two_attempts() {
        let store = InMemoryWorldStore::manor();
        let world = store.world();
        let registry = ToolRegistry::standard();
        let planner = FixedPlanner::new(vec![Ok(plan("attic")), Ok(plan("attic"))]);
        let coordinator = RetryCoordinator::new(MutationExecutor::new(&registry, &store), &planner);

        let out = coordinator.run(scope(&world, &Actor::Player), plan("study"), &CancellationToken::new()).await;
        assert_eq!(out.attempts, 2);
        assert_eq!(out.replans, 1);
        assert_eq!(planner.calls(), 1);
        assert_eq!(out.result.failures.len(), 1);
        assert!(out.result.failures[0].contains("Cannot move directly from foyer to attic"));
    }

    #[tokio::test]
    async fn corrected_plan_reports_only_last_failures() {
        let store = InMemoryWorldStore::manor();
        let world = store.world();
        let registry = ToolRegistry::standard();
        let planner = FixedPlanner::new(vec![Ok(plan("foyer"))]);
        let coordinator = RetryCoordinator::new(MutationExecutor::new(&registry, &store), &planner);

        let first = ActionPlan::new(vec![
            MutationRequest::new("move_player", json!({"location": "kitchen"})),
            MutationRequest::new("move_player", json!({"location": "garden"})),
        ]);
        let out = coordinator.run(scope(&world, &Actor::Player), first, &CancellationToken::new()).await;
        assert_eq!(out.result.successes, ["Moved to kitchen", "Moved to foyer"]);
        assert!(out.result.failures.is_empty());
        assert!(planner.last_intent().is_some_and(|i| i.starts_with("Previous attempt failed with errors: ")));
    }

    #[tokio::test]
    async fn corrected_plan_acts_where_the_first_batch_left_the_npc() {
        let store = InMemoryWorldStore::manor();
        let world = store.world();
        let registry = ToolRegistry::standard();
        let elena = Actor::npc("elena");
        let drop = ActionPlan::new(vec![MutationRequest::new(
            "remove_from_inventory",
            json!({"item": "silver_key"}),
        )]);
        let planner = FixedPlanner::new(vec![Ok(drop)]);
        let coordinator = RetryCoordinator::new(MutationExecutor::new(&registry, &store), &planner);

        let first = ActionPlan::new(vec![
            MutationRequest::new("add_to_inventory", json!({"item": "silver_key"})),
            MutationRequest::new("move_player", json!({"location": "foyer"})),
            MutationRequest::new("move_player", json!({"location": "garden"})),
        ]);
        let out = coordinator.run(scope(&world, &elena), first, &CancellationToken::new()).await;
        assert_eq!(out.attempts, 2);
        assert_eq!(
            out.result.successes,
            ["elena picked up silver_key", "elena moved to foyer", "elena dropped silver_key"]
        );

        let after = store.world();
        assert_eq!(after.locations["foyer"].items, ["silver_key"]);
        assert!(after.locations["library"].items.is_empty());
        assert_eq!(world.actor_location(&elena), Some("library"));
    }

    #[tokio::test]
    async fn replan_error_keeps_first_failures() {
        let store = InMemoryWorldStore::manor();
        let world = store.world();
        let registry = ToolRegistry::standard();
        let planner = FixedPlanner::new(vec![]);
        let coordinator = RetryCoordinator::new(MutationExecutor::new(&registry, &store), &planner);

        let out = coordinator.run(scope(&world, &Actor::Player), plan("study"), &CancellationToken::new()).await;
        assert_eq!(out.attempts, 1);
        assert_eq!(out.replans, 1);
        assert_eq!(out.result.failures.len(), 1);
        assert!(out.result.failures[0].contains("locked"));
    }

    #[tokio::test]
    async fn bound_of_one_never_replans() {
        let store = InMemoryWorldStore::manor();
        let world = store.world();
        let registry = ToolRegistry::standard();
        let planner = FixedPlanner::new(vec![Ok(plan("kitchen"))]);
        let coordinator =
            RetryCoordinator::new(MutationExecutor::new(&registry, &store), &planner).with_max_attempts(1);

        let out = coordinator.run(scope(&world, &Actor::Player), plan("study"), &CancellationToken::new()).await;
        assert_eq!((out.attempts, out.replans), (1, 0));
        assert_eq!(planner.calls(), 0);
    }

    #[test]
    fn retry_intent_quotes_failures() {
        let intent = RetryCoordinator::retry_intent("open the door", &["a".into(), "b".into()]);
        assert_eq!(
            intent,
            "Previous attempt failed with errors: a; b. Please try a different approach for: open the door"
        );
    }
}

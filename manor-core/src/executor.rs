//! # Mutation Executor
//!
//! Runs a plan's mutations strictly in order against the registry and the
//! store. Later mutations may depend on what earlier ones wrote, so calls are
//! never reordered or overlapped. Every failure becomes a string in the
//! [`ExecutionResult`]; nothing aborts the batch.

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{ExecutionError, MutationFailure, StoreError};
use crate::mutation::MutationRequest;
use crate::store::WorldStore;
use crate::tools::{ToolContext, ToolRegistry};
use crate::world::{Actor, WorldState};

/// Outcome of running one batch of mutations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    /// Success lines, in execution order.
    pub successes: Vec<String>,
    /// Failure lines, in execution order.
    pub failures: Vec<String>,
}

impl ExecutionResult {
    /// Whether every attempted mutation succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of attempted mutations.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.successes.len() + self.failures.len()
    }
}

/// Executes mutation batches.
pub struct MutationExecutor<'a> {
    registry: &'a ToolRegistry,
    store: &'a dyn WorldStore,
}

impl<'a> MutationExecutor<'a> {
    /// Executor over `registry` and `store`.
    #[must_use]
    pub fn new(registry: &'a ToolRegistry, store: &'a dyn WorldStore) -> Self {
        Self { registry, store }
    }

    /// Execute `mutations` in order on behalf of `actor`.
    ///
    /// `world` is the snapshot taken before the batch started. Tools resolve
    /// actor-relative arguments against a working copy of it that follows the
    /// batch's accepted moves.
    pub async fn execute(
        &self,
        mutations: &[MutationRequest],
        world: &WorldState,
        actor: &Actor,
        cancel: &CancellationToken,
    ) -> ExecutionResult {
        let mut working = world.clone();
        self.execute_tracked(mutations, &mut working, actor, cancel).await
    }

    /// Like [`execute`](Self::execute), but the working copy is `world`
    /// itself, so it can be carried into a following batch.
    pub async fn execute_tracked(
        &self,
        mutations: &[MutationRequest],
        world: &mut WorldState,
        actor: &Actor,
        cancel: &CancellationToken,
    ) -> ExecutionResult {
        let mut result = ExecutionResult::default();

        for (index, request) in mutations.iter().enumerate() {
            match self.execute_one(request, world, actor, cancel).await {
                Ok(message) => {
                    debug!(actor = %actor, tool = %request.tool, index, "mutation applied");
                    result.successes.push(message);
                }
                Err(failure) => {
                    warn!(actor = %actor, tool = %request.tool, index, %failure, "mutation failed");
                    result.failures.push(failure.to_string());
                }
            }
        }

        result
    }

    async fn execute_one(
        &self,
        request: &MutationRequest,
        world: &mut WorldState,
        actor: &Actor,
        cancel: &CancellationToken,
    ) -> Result<String, MutationFailure> {
        let tool = self.registry.get(&request.tool)?;

        let mutation = tool
            .validate(&request.args)
            .map_err(|source| MutationFailure::InvalidArgs {
                tool: request.tool.clone(),
                source,
            })?;

        if cancel.is_cancelled() {
            return Err(MutationFailure::Execution {
                tool: request.tool.clone(),
                source: ExecutionError::Store(StoreError::Cancelled),
            });
        }

        let ctx = ToolContext { store: self.store, world: &*world, actor, cancel };
        tool.execute(&mutation, ctx)
            .await
            .map_err(|source| MutationFailure::Execution {
                tool: request.tool.clone(),
                source,
            })?;
        mutation.track(world, actor);

        Ok(tool.success_message(&mutation, actor))
    }
}

//! Hand-written fakes for unit and integration tests.
//!
//! Compiled for this crate's own tests and behind the `testing` feature for
//! everyone else.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use manor_llm::{CompletionBackend, CompletionRequest, LlmError, LlmResponse, PromptId};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::{PlanningError, StoreError};
use crate::memory_store::InMemoryWorldStore;
use crate::mutation::ActionPlan;
use crate::planner::{PlanRequest, Planner};
use crate::store::{GET_WORLD_STATE, ToolCall, ToolDescriptor, WorldStore};
use crate::world::{LocationInfo, WorldState};

/// Completion backend answering from per-purpose scripts.
///
/// Replies for one purpose are consumed in order; the last one repeats.
/// A purpose with no script answers [`LlmError::Unavailable`].
#[derive(Default)]
pub struct ScriptedLlm {
    replies: Mutex<HashMap<PromptId, VecDeque<String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    /// Backend with no scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `text` as the next reply for `id`.
    #[must_use]
    pub fn reply(self, id: PromptId, text: &str) -> Self {
        self.replies.lock().entry(id).or_default().push_back(text.to_string());
        self
    }

    /// Requests received for `id`, oldest first.
    #[must_use]
    pub fn requests_for(&self, id: PromptId) -> Vec<CompletionRequest> {
        self.requests.lock().iter().filter(|r| r.purpose == id).cloned().collect()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedLlm {
    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().push(request.clone());
        let mut replies = self.replies.lock();
        let queue = replies
            .get_mut(&request.purpose)
            .ok_or_else(|| LlmError::Unavailable(format!("no script for {}", request.purpose)))?;
        let text = if queue.len() > 1 { queue.pop_front() } else { queue.front().cloned() };
        text.map(LlmResponse::text_only)
            .ok_or_else(|| LlmError::Unavailable("script exhausted".into()))
    }
}

/// Planner returning pre-built plans in order, then failing.
pub struct FixedPlanner {
    plans: Mutex<VecDeque<Result<ActionPlan, PlanningError>>>,
    intents: Mutex<Vec<String>>,
}

impl FixedPlanner {
    /// Planner answering with `plans` in order.
    #[must_use]
    pub fn new(plans: Vec<Result<ActionPlan, PlanningError>>) -> Self {
        Self { plans: Mutex::new(plans.into()), intents: Mutex::new(Vec::new()) }
    }

    /// Planning calls made so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.intents.lock().len()
    }

    /// Intent of the latest planning call.
    #[must_use]
    pub fn last_intent(&self) -> Option<String> {
        self.intents.lock().last().cloned()
    }
}

#[async_trait]
impl Planner for FixedPlanner {
    async fn plan(&self, request: PlanRequest<'_>, _cancel: &CancellationToken) -> Result<ActionPlan, PlanningError> {
        self.intents.lock().push(request.intent.to_string());
        self.plans
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(PlanningError::Planner(LlmError::Unavailable("no plan scripted".into()))))
    }
}

/// In-memory store whose snapshot fetch can be made to fail.
pub struct FlakyStore {
    /// Store serving every call that is not failed on purpose.
    pub inner: InMemoryWorldStore,
    fail_sync: AtomicBool,
}

impl FlakyStore {
    /// The starting manor, fetches succeeding.
    #[must_use]
    pub fn manor() -> Self {
        Self { inner: InMemoryWorldStore::manor(), fail_sync: AtomicBool::new(false) }
    }

    /// Make snapshot fetches fail with a transport error, or stop doing so.
    pub fn fail_sync(&self, fail: bool) {
        self.fail_sync.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl WorldStore for FlakyStore {
    async fn call_tool(&self, call: &ToolCall, cancel: &CancellationToken) -> Result<String, StoreError> {
        if call.name == GET_WORLD_STATE && self.fail_sync.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("connection reset".into()));
        }
        self.inner.call_tool(call, cancel).await
    }

    async fn list_tools(&self, cancel: &CancellationToken) -> Result<Vec<ToolDescriptor>, StoreError> {
        self.inner.list_tools(cancel).await
    }
}

/// A one-way chain `ids[0] → ids[1] → …`.
#[must_use]
pub fn chain_world(ids: &[&str]) -> WorldState {
    let mut world = WorldState::default();
    for (i, id) in ids.iter().enumerate() {
        let mut location = LocationInfo { id: (*id).to_string(), name: id.to_uppercase(), ..LocationInfo::default() };
        if let Some(next) = ids.get(i + 1) {
            location.exits.insert("forward".into(), (*next).to_string());
        }
        world.locations.insert((*id).to_string(), location);
    }
    world
}

//! Shared fakes for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use manor_core::config::TurnsConfig;
use manor_core::{IntentInterpreter, SchedulerDeps, ToolRegistry, TurnScheduler, WorldStore};
use manor_llm::PromptEngine;
use tokio_util::sync::CancellationToken;

pub use manor_core::testing::{FlakyStore, ScriptedLlm};

pub fn deps(llm: Arc<ScriptedLlm>, store: Arc<dyn WorldStore>) -> SchedulerDeps {
    let prompts = Arc::new(PromptEngine::builtin());
    let planner = IntentInterpreter::new(llm.clone(), Arc::clone(&store), Arc::clone(&prompts));
    SchedulerDeps {
        store,
        llm,
        planner: Arc::new(planner),
        registry: Arc::new(ToolRegistry::standard()),
        prompts,
    }
}

pub fn turns() -> TurnsConfig {
    TurnsConfig { semantic_perception: false, ..TurnsConfig::default() }
}

pub async fn scheduler(llm: Arc<ScriptedLlm>, store: Arc<dyn WorldStore>) -> TurnScheduler {
    TurnScheduler::connect(deps(llm, store), turns(), &CancellationToken::new())
        .await
        .expect("initial snapshot")
}

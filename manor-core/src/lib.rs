//! # MANOR Core Library
//!
//! Turn orchestration for a text adventure where the player speaks free-form
//! language and NPCs take autonomous turns. Language understanding is
//! delegated to a completion service; the world lives in an external store.
//! This crate keeps the two consistent:
//!
//! - **Tool registry / executor**: validated, strictly ordered mutations
//! - **Retry coordinator**: one bounded re-plan on partial failure
//! - **Sync**: the cached [`WorldState`] is only ever replaced, never patched
//! - **Event summarizer**: canonical `Actor@location: text` lines per turn
//! - **Perception**: which lines and sounds each NPC could have noticed
//! - **Scheduler**: `PlayerTurn → NpcTurn(0..n) → PlayerTurn`
//!
//! ## Pipeline
//!
//! ```text
//! TurnScheduler ─► IntentInterpreter ─► RetryCoordinator ─► MutationExecutor ─► WorldStore
//!                                                                  │
//!        PerceptionEngine ◄── EventSummarizer ◄── WorldSync ◄──────┘
//! ```

#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod executor;
pub mod facts;
pub mod history;
pub mod log;
pub mod memory_store;
pub mod mutation;
pub mod npc;
pub mod perception;
pub mod planner;
pub mod retry;
pub mod scheduler;
pub mod sensory;
pub mod snapshot;
pub mod store;
pub mod sync;
pub mod tools;
pub mod world;

pub use config::ManorConfig;
pub use error::{ManorError, Result};
pub use executor::{ExecutionResult, MutationExecutor};
pub use memory_store::InMemoryWorldStore;
pub use mutation::{ActionPlan, Mutation, MutationRequest};
pub use planner::{IntentInterpreter, PlanRequest, Planner};
pub use scheduler::{SchedulerDeps, TurnCycle, TurnPhase, TurnReport, TurnScheduler};
pub use snapshot::StoreSnapshot;
pub use store::{ToolCall, ToolDescriptor, WorldStore};
pub use tools::ToolRegistry;
pub use world::{Actor, WorldState};

#[cfg(any(test, feature = "testing"))]
pub mod testing;

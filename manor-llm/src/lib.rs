//! # manor-llm: Completion-Service Layer for MANOR
//!
//! Every reasoning call the turn pipeline makes goes through this crate:
//!   - **Planning** (director prompt → `{"mutations": [...]}`)
//!   - **Perception** and **event summarization** (`{"events": [...]}`)
//!   - **Sensory events**, **NPC thoughts/actions**, **fact attribution**, **narration**
//!
//! Two HTTP backends are supported:
//!   - **OpenAI-compatible API** (`/v1/chat/completions`, JSON mode and JSON schema)
//!   - **Ollama** (`/api/generate`, `format` constrained output)
//!
//! # Architecture
//!
//! ```text
//! caller ──► CompletionRequest { purpose, tier, format } ──► CompletionBackend
//!                                                               │
//!                 LlmClient (reqwest, retries, timeouts) ◄──────┘
//! ```
//!
//! The [`CompletionBackend`] trait is the seam the core crate depends on, so
//! the pipeline can be driven by a scripted backend in tests.

#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod client;
pub mod error;
pub mod prompt;
pub mod structured;
pub mod types;

pub use backend::CompletionBackend;
pub use client::{LlmClient, LlmProvider};
pub use error::LlmError;
pub use prompt::{PromptEngine, PromptId};
pub use types::{CompletionRequest, LlmResponse, ModelTier, ResponseFormat};

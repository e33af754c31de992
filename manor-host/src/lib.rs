//! # manor-host: Runtime Wiring for MANOR
//!
//! Everything the interactive `manor` binary needs that the libraries leave
//! to the embedder:
//!
//! - `config`: layered configuration (defaults, TOML file, `MANOR__*` env)
//!   and construction of the completion client, prompts and world store
//! - `mcp`: the world-state store as an MCP server spoken to over stdio
//! - `narration`: player-facing prose for a finished turn
//!
//! ```text
//! stdin ─► TurnScheduler ─► McpWorldStore ─► world-state server
//!               │
//!               └─► Narrator ─► stdout
//! ```

#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod mcp;
pub mod narration;

pub use error::HostError;
pub use mcp::McpWorldStore;
pub use narration::Narrator;

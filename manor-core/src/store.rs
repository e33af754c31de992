//! The world-state store seam.
//!
//! The store is the single source of truth. It is driven through named tool
//! calls carrying JSON arguments, and answers with a text payload or an error
//! payload. [`crate::memory_store::InMemoryWorldStore`] implements it in
//! process; the host crate implements it over MCP stdio.

use std::future::Future;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::error::StoreError;
use crate::snapshot::StoreSnapshot;
use crate::world::WorldState;

/// Store tool that returns the full snapshot.
pub const GET_WORLD_STATE: &str = "get_world_state";

/// A named tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool name.
    pub name: String,
    /// JSON argument object.
    pub arguments: Value,
}

impl ToolCall {
    /// Build a call.
    #[must_use]
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// The string argument `key`, if present.
    #[must_use]
    pub fn arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }
}

/// Machine-readable description of one store tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name.
    pub name: String,
    /// Human description.
    #[serde(default)]
    pub description: String,
    /// JSON schema of the arguments.
    #[serde(default, rename = "inputSchema", skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

/// The authoritative world-state store.
#[async_trait]
pub trait WorldStore: Send + Sync {
    /// Invoke a named tool.
    ///
    /// # Errors
    ///
    /// [`StoreError::Rejected`] carries the store's error payload; other
    /// variants describe transport problems or cancellation.
    async fn call_tool(&self, call: &ToolCall, cancel: &CancellationToken) -> Result<String, StoreError>;

    /// List the tools the store serves.
    ///
    /// # Errors
    ///
    /// Transport failure or cancellation.
    async fn list_tools(&self, cancel: &CancellationToken) -> Result<Vec<ToolDescriptor>, StoreError>;
}

/// Fetch and decode the authoritative snapshot.
///
/// # Errors
///
/// Propagates the store error, or [`StoreError::Malformed`] if the payload
/// does not decode.
pub async fn fetch_world_state(
    store: &dyn WorldStore,
    cancel: &CancellationToken,
) -> Result<WorldState, StoreError> {
    let call = ToolCall::new(GET_WORLD_STATE, json!({}));
    let payload = store.call_tool(&call, cancel).await?;
    let snapshot =
        StoreSnapshot::from_json(&payload).map_err(|e| StoreError::Malformed(e.to_string()))?;
    Ok(snapshot.into())
}

/// Render the tool catalog for the director prompt, one `- name: description (Schema: json)` per line.
#[must_use]
pub fn render_catalog(tools: &[ToolDescriptor]) -> String {
    tools
        .iter()
        .map(|tool| match &tool.input_schema {
            Some(schema) => format!("- {}: {} (Schema: {schema})\n", tool.name, tool.description),
            None => format!("- {}: {}\n", tool.name, tool.description),
        })
        .collect()
}

/// Race `fut` against `cancel`. `None` means the token fired first.
pub async fn or_cancelled<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}

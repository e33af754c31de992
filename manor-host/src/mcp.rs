//! # MCP World Store
//!
//! The authoritative world state lives in an MCP server. We spawn it and
//! speak JSON-RPC 2.0 over newline-delimited stdio:
//!
//! ```text
//! → initialize                  ← result (server info, capabilities)
//! → notifications/initialized
//! → tools/list                  ← {"tools": [{name, description, inputSchema}]}
//! → tools/call {name, arguments} ← {"content": [{"type": "text", "text": ...}], "isError": bool}
//! ```
//!
//! One request is in flight at a time. Replies are matched by id, so a reply
//! to a request abandoned on cancellation is skipped when it arrives late.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use manor_core::error::StoreError;
use manor_core::store::{ToolCall, ToolDescriptor, WorldStore, or_cancelled};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// MCP protocol revision we announce.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

type Reader = Lines<BufReader<Box<dyn AsyncRead + Send + Unpin>>>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;

struct Connection {
    reader: Reader,
    writer: Writer,
    /// Held so the server is killed when the store is dropped.
    _child: Option<Child>,
}

impl Connection {
    async fn send(&mut self, message: &Value) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(message).map_err(|e| StoreError::Transport(e.to_string()))?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await.map_err(transport)?;
        self.writer.flush().await.map_err(transport)
    }

    async fn receive(&mut self, id: u64, method: &str) -> Result<Value, StoreError> {
        loop {
            let line = self
                .reader
                .next_line()
                .await
                .map_err(transport)?
                .ok_or_else(|| StoreError::Transport("world-state server closed the connection".into()))?;
            let Ok(reply) = serde_json::from_str::<Value>(line.trim()) else {
                debug!(line = %line, "skipping non-JSON output from server");
                continue;
            };
            if reply.get("id").and_then(Value::as_u64) != Some(id) {
                continue;
            }
            if let Some(error) = reply.get("error") {
                let message = error.get("message").and_then(Value::as_str).unwrap_or("unknown error");
                return Err(StoreError::Transport(format!("{method} failed: {message}")));
            }
            return Ok(reply.get("result").cloned().unwrap_or(Value::Null));
        }
    }
}

fn transport(e: std::io::Error) -> StoreError {
    StoreError::Transport(e.to_string())
}

/// A [`WorldStore`] backed by an MCP server.
pub struct McpWorldStore {
    conn: Mutex<Connection>,
    next_id: AtomicU64,
}

impl McpWorldStore {
    /// Spawn `command args…` and complete the MCP handshake.
    ///
    /// # Errors
    ///
    /// [`StoreError::Transport`] if the process cannot be started or the
    /// handshake fails; [`StoreError::Cancelled`] on cancellation.
    pub async fn spawn(command: &str, args: &[String], cancel: &CancellationToken) -> Result<Self, StoreError> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| StoreError::Transport(format!("failed to start {command}: {e}")))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| StoreError::Transport("server stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| StoreError::Transport("server stdout unavailable".into()))?;

        let store = Self::from_parts(stdout, stdin, Some(child));
        store.initialize(cancel).await?;
        Ok(store)
    }

    /// Complete the handshake over an already-open byte stream.
    ///
    /// # Errors
    ///
    /// Same as [`McpWorldStore::spawn`], minus process start-up.
    pub async fn connect<R, W>(reader: R, writer: W, cancel: &CancellationToken) -> Result<Self, StoreError>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let store = Self::from_parts(reader, writer, None);
        store.initialize(cancel).await?;
        Ok(store)
    }

    fn from_parts<R, W>(reader: R, writer: W, child: Option<Child>) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let reader: Box<dyn AsyncRead + Send + Unpin> = Box::new(reader);
        Self {
            conn: Mutex::new(Connection {
                reader: BufReader::new(reader).lines(),
                writer: Box::new(writer),
                _child: child,
            }),
            next_id: AtomicU64::new(1),
        }
    }

    async fn initialize(&self, cancel: &CancellationToken) -> Result<(), StoreError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": { "name": "manor", "version": env!("CARGO_PKG_VERSION") },
        });
        let result = self.request("initialize", params, cancel).await?;
        debug!(server = %result["serverInfo"]["name"], "MCP session initialized");

        let notice = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
        self.conn.lock().await.send(&notice).await
    }

    async fn request(&self, method: &str, params: Value, cancel: &CancellationToken) -> Result<Value, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let message = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        let exchange = async {
            let mut conn = self.conn.lock().await;
            conn.send(&message).await?;
            conn.receive(id, method).await
        };
        or_cancelled(cancel, exchange).await.ok_or(StoreError::Cancelled)?
    }
}

/// Read a `tools/call` result.
///
/// Text parts are joined with newlines. `isError: true`, or text starting
/// with `Error:`, is a rejection carrying that text.
///
/// # Errors
///
/// [`StoreError::Rejected`] as above.
pub fn tool_result(result: &Value) -> Result<String, StoreError> {
    let text = result
        .get("content")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();
    let is_error = result.get("isError").and_then(Value::as_bool).unwrap_or(false);
    if is_error || text.trim_start().starts_with("Error:") {
        Err(StoreError::Rejected(text))
    } else {
        Ok(text)
    }
}

/// Read a `tools/list` result.
///
/// # Errors
///
/// [`StoreError::Malformed`] if `tools` is missing or not a descriptor list.
pub fn tool_list(result: &Value) -> Result<Vec<ToolDescriptor>, StoreError> {
    let tools = result
        .get("tools")
        .cloned()
        .ok_or_else(|| StoreError::Malformed("tools/list result has no 'tools'".into()))?;
    serde_json::from_value(tools).map_err(|e| StoreError::Malformed(e.to_string()))
}

#[async_trait]
impl WorldStore for McpWorldStore {
    async fn call_tool(&self, call: &ToolCall, cancel: &CancellationToken) -> Result<String, StoreError> {
        let params = json!({ "name": call.name, "arguments": call.arguments });
        let result = self.request("tools/call", params, cancel).await?;
        let outcome = tool_result(&result);
        if let Err(StoreError::Rejected(reason)) = &outcome {
            warn!(tool = %call.name, %reason, "store rejected call");
        }
        outcome
    }

    async fn list_tools(&self, cancel: &CancellationToken) -> Result<Vec<ToolDescriptor>, StoreError> {
        let result = self.request("tools/list", json!({}), cancel).await?;
        tool_list(&result)
    }
}

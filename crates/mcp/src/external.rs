// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External MCP backend: a stdio child process the router proxies to.
//!
//! The router owns the child for its own lifetime. Once a request fails at
//! the transport level the backend is marked dead; its tools disappear
//! from the aggregate and later calls report "backend unavailable" without
//! touching the child again.

use crate::backend::ToolBackend;
use crate::config::ExternalServerConfig;
use crate::protocol::{
    CallToolResult, JsonRpcRequest, JsonRpcResponse, ListToolsResult, Tool, JSONRPC_VERSION,
    MCP_PROTOCOL_VERSION,
};
use crate::{wire, McpError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use tokio::io::BufReader;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

pub struct ExternalBackend {
    name: String,
    // Child handle kept for the router's lifetime; killed on drop.
    _child: Child,
    stdin: Mutex<ChildStdin>,
    stdout: Mutex<BufReader<ChildStdout>>,
    next_id: AtomicI64,
    dead: AtomicBool,
}

impl ExternalBackend {
    /// Spawn the server process and run the MCP initialize handshake.
    pub async fn spawn(config: &ExternalServerConfig) -> Result<Self, McpError> {
        let mut child = Command::new(&config.command)
            .args(&config.args)
            .envs(config.env.iter().map(|(k, v)| (k.clone(), v.clone())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(McpError::Io)?;

        let stdin = child
            .stdin
            .take()
            .ok_or(McpError::BackendUnavailable(config.name.clone()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(McpError::BackendUnavailable(config.name.clone()))?;

        let backend = Self {
            name: config.name.clone(),
            _child: child,
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(BufReader::new(stdout)),
            next_id: AtomicI64::new(1),
            dead: AtomicBool::new(false),
        };

        backend
            .request(
                "initialize",
                json!({
                    "protocolVersion": MCP_PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {"name": "codemachine-router", "version": env!("CARGO_PKG_VERSION")}
                }),
            )
            .await?;
        backend.notify("notifications/initialized").await?;
        Ok(backend)
    }

    pub fn is_dead(&self) -> bool {
        self.dead.load(Ordering::SeqCst)
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, McpError> {
        if self.is_dead() {
            return Err(McpError::BackendUnavailable(self.name.clone()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(id, method, params);

        let result = self.exchange(&request, id).await;
        // RPC-level errors leave the backend alive; transport failures
        // kill it for the rest of the router's lifetime.
        if matches!(
            result,
            Err(McpError::Io(_)) | Err(McpError::ConnectionClosed) | Err(McpError::Json(_))
        ) {
            self.dead.store(true, Ordering::SeqCst);
        }
        result
    }

    async fn exchange(&self, request: &JsonRpcRequest, id: i64) -> Result<Value, McpError> {
        {
            let mut stdin = self.stdin.lock().await;
            wire::write_message(&mut *stdin, request).await?;
        }

        let mut stdout = self.stdout.lock().await;
        loop {
            let Some(response) = wire::read_message::<_, JsonRpcResponse>(&mut stdout).await?
            else {
                return Err(McpError::ConnectionClosed);
            };
            // Skip server-initiated notifications and stale responses.
            if response.id != json!(id) {
                continue;
            }
            if let Some(error) = response.error {
                return Err(McpError::BackendRpc {
                    backend: self.name.clone(),
                    code: error.code,
                    message: error.message,
                });
            }
            return Ok(response.result.unwrap_or(Value::Null));
        }
    }

    async fn notify(&self, method: &str) -> Result<(), McpError> {
        let notification = JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            method: method.to_string(),
            params: Value::Null,
        };
        let mut stdin = self.stdin.lock().await;
        wire::write_message(&mut *stdin, &notification).await
    }
}

#[async_trait]
impl ToolBackend for ExternalBackend {
    fn id(&self) -> &str {
        &self.name
    }

    async fn tools(&self) -> Result<Vec<Tool>, McpError> {
        let result = self.request("tools/list", json!({})).await?;
        let list: ListToolsResult = serde_json::from_value(result)?;
        Ok(list.tools)
    }

    async fn call(&self, tool: &str, args: Value) -> Result<CallToolResult, McpError> {
        let result = self
            .request(
                "tools/call",
                json!({"name": tool, "arguments": args}),
            )
            .await?;
        Ok(serde_json::from_value(result)?)
    }
}

#[cfg(test)]
#[path = "external_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The MCP router.
//!
//! Speaks MCP over stdio to one client (the agent) and aggregates N
//! backends behind a single endpoint. The Active Servers Record is read on
//! every `tools/list` and `tools/call`, so the runner can re-scope the
//! router between steps without restarting it.

use crate::backend::ToolBackend;
use crate::protocol::{
    error_code, CallToolResult, JsonRpcRequest, JsonRpcResponse, ListToolsResult, Tool,
    ALLOWED_TARGETS_ARG, JSONRPC_VERSION, MCP_PROTOCOL_VERSION,
};
use crate::{wire, McpError};
use cm_storage::{ActiveServer, ActiveServersStore};
use indexmap::IndexMap;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// One exposed tool: where it came from and the name the client sees.
#[derive(Debug, Clone)]
struct ExposedTool {
    server: String,
    tool: Tool,
    /// Name after collision renaming (`<serverId>:<toolName>` when needed).
    exposed_name: String,
    targets: Option<Vec<String>>,
}

pub struct McpRouter {
    backends: IndexMap<String, Arc<dyn ToolBackend>>,
    active_servers: ActiveServersStore,
}

impl McpRouter {
    pub fn new(active_servers: ActiveServersStore) -> Self {
        Self {
            backends: IndexMap::new(),
            active_servers,
        }
    }

    /// Register a backend. Registration order is advertisement order.
    pub fn add_backend(&mut self, backend: Arc<dyn ToolBackend>) {
        self.backends.insert(backend.id().to_string(), backend);
    }

    /// The merged tool list according to the Active Servers Record.
    pub async fn list_tools(&self) -> Vec<Tool> {
        self.exposed_tools()
            .await
            .into_iter()
            .map(|exposed| {
                let mut tool = exposed.tool;
                tool.name = exposed.exposed_name;
                tool
            })
            .collect()
    }

    /// Execute a tool call with active-server and tool filtering.
    pub async fn call_tool(&self, name: &str, args: Value) -> CallToolResult {
        let exposed = self.exposed_tools().await;
        let Some(target) = exposed.iter().find(|t| t.exposed_name == name) else {
            return CallToolResult::error(format!(
                "tool '{name}' is not available: its server is not active or the tool is not allowed"
            ));
        };

        let Some(backend) = self.backends.get(&target.server) else {
            return CallToolResult::error(format!("backend unavailable: {}", target.server));
        };

        // Inject the target restriction for backends that spawn agents.
        let mut args = match args {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            other => {
                tracing::warn!(tool = name, args = %other, "non-object tool arguments");
                serde_json::Map::new()
            }
        };
        args.insert(
            ALLOWED_TARGETS_ARG.to_string(),
            match &target.targets {
                Some(targets) => json!(targets),
                None => Value::Null,
            },
        );

        match backend.call(&target.tool.name, Value::Object(args)).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(server = %target.server, tool = name, error = %e, "backend call failed");
                CallToolResult::error(format!("backend unavailable: {}", target.server))
            }
        }
    }

    /// Resolve the Active Servers Record against registered backends.
    async fn exposed_tools(&self) -> Vec<ExposedTool> {
        let record = match self.active_servers.read() {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read active servers record");
                Vec::new()
            }
        };

        let mut seen: HashSet<String> = HashSet::new();
        let mut out = Vec::new();
        for entry in record {
            let Some(backend) = self.backends.get(&entry.server) else {
                tracing::debug!(server = %entry.server, "active server has no backend");
                continue;
            };
            let tools = match backend.tools().await {
                Ok(tools) => tools,
                Err(e) => {
                    // A failed backend only loses its own tools.
                    tracing::warn!(server = %entry.server, error = %e, "backend tools/list failed");
                    continue;
                }
            };
            for tool in tools {
                if !entry.allows_tool(&tool.name) {
                    continue;
                }
                let exposed_name = if seen.contains(&tool.name) {
                    format!("{}:{}", entry.server, tool.name)
                } else {
                    tool.name.clone()
                };
                seen.insert(exposed_name.clone());
                seen.insert(tool.name.clone());
                out.push(ExposedTool {
                    server: entry.server.clone(),
                    exposed_name,
                    targets: entry.targets.clone(),
                    tool,
                });
            }
        }
        out
    }

    /// Serve MCP over the given transport until end-of-stream.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<(), McpError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut reader = BufReader::new(reader);
        loop {
            let request: Option<JsonRpcRequest> = match wire::read_message(&mut reader).await {
                Ok(request) => request,
                Err(McpError::Json(e)) => {
                    tracing::warn!(error = %e, "malformed request");
                    let response = JsonRpcResponse::failure(
                        Value::Null,
                        error_code::PARSE_ERROR,
                        e.to_string(),
                    );
                    wire::write_message(&mut writer, &response).await?;
                    continue;
                }
                Err(e) => return Err(e),
            };
            let Some(request) = request else {
                return Ok(());
            };

            if request.jsonrpc != JSONRPC_VERSION {
                tracing::warn!(version = %request.jsonrpc, "unexpected jsonrpc version");
            }

            let Some(id) = request.id.clone() else {
                // Notifications get no response.
                tracing::debug!(method = %request.method, "notification");
                continue;
            };

            let response = self.respond(id, &request).await;
            wire::write_message(&mut writer, &response).await?;
        }
    }

    async fn respond(&self, id: Value, request: &JsonRpcRequest) -> JsonRpcResponse {
        match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(
                id,
                json!({
                    "protocolVersion": MCP_PROTOCOL_VERSION,
                    "capabilities": {"tools": {}},
                    "serverInfo": {
                        "name": "codemachine-router",
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                }),
            ),

            "ping" => JsonRpcResponse::success(id, json!({})),

            "tools/list" => {
                let tools = self.list_tools().await;
                match serde_json::to_value(ListToolsResult { tools }) {
                    Ok(result) => JsonRpcResponse::success(id, result),
                    Err(e) => JsonRpcResponse::failure(
                        id,
                        error_code::INTERNAL_ERROR,
                        e.to_string(),
                    ),
                }
            }

            "tools/call" => {
                let Some(name) = request.params.get("name").and_then(Value::as_str) else {
                    return JsonRpcResponse::failure(
                        id,
                        error_code::INVALID_PARAMS,
                        "missing tool name",
                    );
                };
                let args = request
                    .params
                    .get("arguments")
                    .cloned()
                    .unwrap_or(Value::Null);
                let result = self.call_tool(name, args).await;
                match serde_json::to_value(result) {
                    Ok(result) => JsonRpcResponse::success(id, result),
                    Err(e) => JsonRpcResponse::failure(
                        id,
                        error_code::INTERNAL_ERROR,
                        e.to_string(),
                    ),
                }
            }

            other => JsonRpcResponse::failure(
                id,
                error_code::METHOD_NOT_FOUND,
                format!("method not found: {other}"),
            ),
        }
    }
}

/// Convenience: the record entry enabling both built-in backends.
pub fn default_active_servers() -> Vec<ActiveServer> {
    vec![
        ActiveServer::all(crate::signals::SERVER_ID),
        ActiveServer::all(crate::coordination::SERVER_ID),
    ]
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;

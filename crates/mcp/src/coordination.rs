// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in `agent-coordination` backend.
//!
//! Lets one agent spawn and query other agents through the mini script
//! grammar. Before anything is spawned, every agent name in the script is
//! checked against the injected `_allowed_targets` restriction.

use crate::backend::ToolBackend;
use crate::protocol::{CallToolResult, Tool, ALLOWED_TARGETS_ARG};
use crate::script::{InputQualifier, Script};
use crate::McpError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

pub const SERVER_ID: &str = "agent-coordination";

/// Status of an agent spawned through this backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentStatus {
    Running,
    Completed,
    Failed(String),
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Running => write!(f, "running"),
            AgentStatus::Completed => write!(f, "completed"),
            AgentStatus::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Port through which the backend launches agents. The engine implements
/// this with the subprocess runner; tests use a scripted fake.
#[async_trait]
pub trait AgentSpawner: Send + Sync {
    /// Run one agent to completion, returning its collected output.
    async fn run_agent(
        &self,
        name: &str,
        prompt: &str,
        working_dir: Option<PathBuf>,
        input: Option<InputQualifier>,
        timeout_ms: Option<u64>,
    ) -> Result<String, String>;

    /// Agent names that exist in the loaded configuration.
    fn available_agents(&self) -> Vec<String>;
}

pub struct AgentCoordinationBackend {
    spawner: Arc<dyn AgentSpawner>,
    statuses: Arc<Mutex<HashMap<String, AgentStatus>>>,
}

impl AgentCoordinationBackend {
    pub fn new(spawner: Arc<dyn AgentSpawner>) -> Self {
        Self {
            spawner,
            statuses: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Targets restriction from the injected argument. `None` (or JSON
    /// null) means unrestricted.
    fn allowed_targets(args: &Value) -> Option<Vec<String>> {
        match args.get(ALLOWED_TARGETS_ARG) {
            None | Some(Value::Null) => None,
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
            ),
            Some(_) => Some(Vec::new()),
        }
    }

    async fn run_agents(&self, args: Value) -> CallToolResult {
        let Some(script_text) = args.get("script").and_then(Value::as_str) else {
            return CallToolResult::error("missing required argument: script");
        };

        let script = match Script::parse(script_text) {
            Ok(script) => script,
            Err(e) => return CallToolResult::error(format!("invalid script: {e}")),
        };

        // Reject before any agent is spawned.
        if let Some(allowed) = Self::allowed_targets(&args) {
            for name in script.agent_names() {
                if !allowed.iter().any(|a| a == name) {
                    return CallToolResult::error(format!(
                        "agent '{name}' is not an allowed target"
                    ));
                }
            }
        }

        let working_dir = args
            .get("working_dir")
            .and_then(Value::as_str)
            .map(PathBuf::from);
        let timeout_ms = args.get("timeout_ms").and_then(Value::as_u64);

        let mut transcript = Vec::new();
        for stage in &script.stages {
            let mut joins = tokio::task::JoinSet::new();
            for invocation in stage.clone() {
                let spawner = Arc::clone(&self.spawner);
                let statuses = Arc::clone(&self.statuses);
                let working_dir = working_dir.clone();
                statuses
                    .lock()
                    .insert(invocation.agent.clone(), AgentStatus::Running);
                joins.spawn(async move {
                    let result = spawner
                        .run_agent(
                            &invocation.agent,
                            &invocation.prompt,
                            working_dir,
                            invocation.input.clone(),
                            timeout_ms,
                        )
                        .await;
                    let status = match &result {
                        Ok(_) => AgentStatus::Completed,
                        Err(reason) => AgentStatus::Failed(reason.clone()),
                    };
                    statuses.lock().insert(invocation.agent.clone(), status);
                    (invocation.agent, result)
                });
            }

            let mut failures = Vec::new();
            while let Some(joined) = joins.join_next().await {
                match joined {
                    Ok((agent, Ok(output))) => {
                        transcript.push(format!("[{agent}]\n{output}"));
                    }
                    Ok((agent, Err(reason))) => {
                        failures.push(format!("{agent}: {reason}"));
                    }
                    Err(e) => failures.push(format!("join error: {e}")),
                }
            }

            // A failed stage stops the sequence.
            if !failures.is_empty() {
                return CallToolResult::error(failures.join("\n"));
            }
        }

        CallToolResult::text(transcript.join("\n\n"))
    }
}

#[async_trait]
impl ToolBackend for AgentCoordinationBackend {
    fn id(&self) -> &str {
        SERVER_ID
    }

    async fn tools(&self) -> Result<Vec<Tool>, McpError> {
        Ok(vec![
            Tool::new(
                "run_agents",
                "Run agents via a script: name 'prompt', & for parallel, && for sequential, \
                 [input:file,tail:N] qualifiers",
                json!({
                    "type": "object",
                    "properties": {
                        "script": {"type": "string"},
                        "working_dir": {"type": "string"},
                        "timeout_ms": {"type": "integer"}
                    },
                    "required": ["script"]
                }),
            ),
            Tool::new(
                "get_agent_status",
                "Status of one agent spawned through run_agents",
                json!({
                    "type": "object",
                    "properties": {"name": {"type": "string"}},
                    "required": ["name"]
                }),
            ),
            Tool::new(
                "list_active_agents",
                "Names of agents currently running",
                json!({"type": "object", "properties": {}}),
            ),
            Tool::new(
                "list_available_agents",
                "Agent names available in the loaded configuration",
                json!({"type": "object", "properties": {}}),
            ),
        ])
    }

    async fn call(&self, tool: &str, args: Value) -> Result<CallToolResult, McpError> {
        match tool {
            "run_agents" => Ok(self.run_agents(args).await),

            "get_agent_status" => {
                let Some(name) = args.get("name").and_then(Value::as_str) else {
                    return Ok(CallToolResult::error("missing required argument: name"));
                };
                match self.statuses.lock().get(name) {
                    Some(status) => Ok(CallToolResult::text(status.to_string())),
                    None => Ok(CallToolResult::error(format!("unknown agent: {name}"))),
                }
            }

            "list_active_agents" => {
                let mut active: Vec<String> = self
                    .statuses
                    .lock()
                    .iter()
                    .filter(|(_, s)| **s == AgentStatus::Running)
                    .map(|(name, _)| name.clone())
                    .collect();
                active.sort();
                Ok(CallToolResult::text(active.join("\n")))
            }

            "list_available_agents" => {
                let mut agents = self.spawner.available_agents();
                agents.sort();
                Ok(CallToolResult::text(agents.join("\n")))
            }

            other => Ok(CallToolResult::error(format!("unknown tool: {other}"))),
        }
    }
}

#[cfg(test)]
#[path = "coordination_tests.rs"]
mod tests;

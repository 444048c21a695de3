// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Codex CLI adapter.
//!
//! Codex streams `--json` events of the shape `{"type": "thread.started",
//! ...}`. Session identity arrives on `thread.started`; usage arrives on
//! `turn.completed`; content arrives as `item.completed` items.

use super::{has_credentials, home_file, remove_credentials, run_login_command};
use crate::engine::{
    model_or_default, EngineAdapter, EngineAdapterError, EngineMetadata, Invocation, McpScope,
    RunRequest,
};
use cm_core::{AgentEvent, SessionId, TokenTelemetry};
use serde_json::Value;
use std::path::{Path, PathBuf};

const METADATA: EngineMetadata = EngineMetadata {
    id: "codex",
    cli_binary: "codex",
    install_command: "npm install -g @openai/codex",
    default_model: "gpt-5-codex",
    default_model_reasoning_effort: Some("medium"),
};

#[derive(Clone, Default)]
pub struct CodexAdapter;

impl CodexAdapter {
    fn auth_file(&self) -> Option<PathBuf> {
        home_file(&[".codex", "auth.json"])
    }
}

impl EngineAdapter for CodexAdapter {
    fn metadata(&self) -> &EngineMetadata {
        &METADATA
    }

    fn is_authenticated(&self) -> bool {
        has_credentials(self.auth_file(), "OPENAI_API_KEY")
    }

    fn ensure_auth(&self, force: bool) -> Result<(), EngineAdapterError> {
        if !force && self.is_authenticated() {
            return Ok(());
        }
        run_login_command("codex", &["login"])
    }

    fn clear_auth(&self) -> Result<(), EngineAdapterError> {
        remove_credentials(self.auth_file())
    }

    fn build_invocation(&self, request: &RunRequest) -> Invocation {
        let mut args = vec!["exec".to_string()];
        if let Some(session) = &request.resume_session_id {
            args.push("resume".to_string());
            args.push(session.to_string());
        }
        args.push("--json".to_string());
        args.push("--model".to_string());
        args.push(model_or_default(request, &METADATA));
        if let Some(effort) = request
            .model_reasoning_effort
            .as_deref()
            .or(METADATA.default_model_reasoning_effort)
        {
            args.push("--config".to_string());
            args.push(format!("model_reasoning_effort={effort}"));
        }
        // "-" reads the prompt from stdin
        args.push("-".to_string());

        Invocation {
            program: METADATA.cli_binary.to_string(),
            args,
            env: Vec::new(),
            stdin_payload: request.effective_prompt().to_string(),
        }
    }

    fn parse_event_line(&self, line: &str) -> Option<AgentEvent> {
        let value: Value = serde_json::from_str(line).ok()?;
        match value.get("type")?.as_str()? {
            "thread.started" => Some(AgentEvent::Session {
                session_id: SessionId::new(value.get("thread_id")?.as_str()?),
            }),
            "turn.started" => Some(AgentEvent::Status {
                text: "turn started".to_string(),
            }),
            "turn.completed" => {
                let usage = value.get("usage")?;
                Some(AgentEvent::Telemetry {
                    usage: TokenTelemetry {
                        input_tokens: usage
                            .get("input_tokens")
                            .and_then(Value::as_u64)
                            .unwrap_or(0),
                        output_tokens: usage
                            .get("output_tokens")
                            .and_then(Value::as_u64)
                            .unwrap_or(0),
                        cached_input_tokens: usage
                            .get("cached_input_tokens")
                            .and_then(Value::as_u64)
                            .unwrap_or(0),
                        cost_usd: None,
                    },
                })
            }
            "item.completed" => {
                let item = value.get("item")?;
                match item.get("type")?.as_str()? {
                    "agent_message" => Some(AgentEvent::Message {
                        text: item.get("text")?.as_str()?.to_string(),
                    }),
                    "command_execution" => Some(AgentEvent::Command {
                        command: item.get("command")?.as_str()?.to_string(),
                    }),
                    "reasoning" => Some(AgentEvent::Status {
                        text: item.get("summary").and_then(Value::as_str)?.to_string(),
                    }),
                    _ => None,
                }
            }
            "error" => Some(AgentEvent::Error {
                message: value
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown codex error")
                    .to_string(),
            }),
            _ => None,
        }
    }

    fn mcp_supported(&self) -> bool {
        true
    }

    fn mcp_settings_path(&self, scope: McpScope, dir: &Path) -> Option<PathBuf> {
        match scope {
            McpScope::Project => Some(dir.join(".codex").join("config.toml")),
            McpScope::User => home_file(&[".codex", "config.toml"]),
        }
    }

    fn mcp_configure(&self, workflow_dir: &Path, scope: McpScope) -> Result<(), EngineAdapterError> {
        let Some(path) = self.mcp_settings_path(scope, workflow_dir) else {
            return Err(EngineAdapterError::McpUnsupported(METADATA.id.to_string()));
        };
        if self.mcp_is_configured(workflow_dir, scope)? {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| EngineAdapterError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let mut config = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(EngineAdapterError::Io { path, source: e }),
        };
        if !config.is_empty() && !config.ends_with('\n') {
            config.push('\n');
        }
        config.push_str(CODEX_MCP_BLOCK);
        std::fs::write(&path, config).map_err(|e| EngineAdapterError::Io { path, source: e })
    }

    fn mcp_cleanup(&self, workflow_dir: &Path, scope: McpScope) -> Result<(), EngineAdapterError> {
        let Some(path) = self.mcp_settings_path(scope, workflow_dir) else {
            return Err(EngineAdapterError::McpUnsupported(METADATA.id.to_string()));
        };
        let config = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(EngineAdapterError::Io { path, source: e }),
        };
        let cleaned = config.replace(CODEX_MCP_BLOCK, "");
        std::fs::write(&path, cleaned).map_err(|e| EngineAdapterError::Io { path, source: e })
    }

    fn mcp_is_configured(
        &self,
        workflow_dir: &Path,
        scope: McpScope,
    ) -> Result<bool, EngineAdapterError> {
        let Some(path) = self.mcp_settings_path(scope, workflow_dir) else {
            return Ok(false);
        };
        match std::fs::read_to_string(&path) {
            Ok(raw) => Ok(raw.contains("[mcp_servers.codemachine]")),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(EngineAdapterError::Io { path, source: e }),
        }
    }
}

const CODEX_MCP_BLOCK: &str = "\n[mcp_servers.codemachine]\ncommand = \"codemachine\"\nargs = [\"mcp\", \"serve\"]\n";

#[cfg(test)]
#[path = "codex_tests.rs"]
mod tests;

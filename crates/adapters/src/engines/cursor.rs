// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cursor agent adapter.
//!
//! `cursor-agent` speaks a stream-json dialect: an init system event with
//! `sessionId`, assistant messages with content blocks, tool calls, and a
//! final `result` event carrying usage.

use super::{has_credentials, home_file, json_settings, remove_credentials, run_login_command};
use crate::engine::{
    model_or_default, EngineAdapter, EngineAdapterError, EngineMetadata, Invocation, McpScope,
    RunRequest,
};
use cm_core::{AgentEvent, SessionId, TokenTelemetry};
use serde_json::Value;
use std::path::{Path, PathBuf};

const METADATA: EngineMetadata = EngineMetadata {
    id: "cursor",
    cli_binary: "cursor-agent",
    install_command: "curl https://cursor.com/install -fsSL | bash",
    default_model: "composer-1",
    default_model_reasoning_effort: None,
};

#[derive(Clone, Default)]
pub struct CursorAdapter;

impl CursorAdapter {
    fn auth_file(&self) -> Option<PathBuf> {
        home_file(&[".cursor", "auth.json"])
    }
}

impl EngineAdapter for CursorAdapter {
    fn metadata(&self) -> &EngineMetadata {
        &METADATA
    }

    fn is_authenticated(&self) -> bool {
        has_credentials(self.auth_file(), "CURSOR_API_KEY")
    }

    fn ensure_auth(&self, force: bool) -> Result<(), EngineAdapterError> {
        if !force && self.is_authenticated() {
            return Ok(());
        }
        run_login_command("cursor-agent", &["login"])
    }

    fn clear_auth(&self) -> Result<(), EngineAdapterError> {
        remove_credentials(self.auth_file())
    }

    fn build_invocation(&self, request: &RunRequest) -> Invocation {
        let mut args = vec![
            "--print".to_string(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--model".to_string(),
            model_or_default(request, &METADATA),
        ];
        if let Some(session) = &request.resume_session_id {
            args.push("--resume".to_string());
            args.push(session.to_string());
        }

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
            "system" => {
                if value.get("subtype").and_then(Value::as_str) == Some("init") {
                    Some(AgentEvent::Session {
                        session_id: SessionId::new(value.get("sessionId")?.as_str()?),
                    })
                } else {
                    None
                }
            }
            "assistant" => {
                let content = value.get("message")?.get("content")?.as_array()?;
                let text = content
                    .iter()
                    .filter_map(|block| {
                        if block.get("type")?.as_str()? != "text" {
                            return None;
                        }
                        Some(block.get("text")?.as_str()?.to_string())
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                (!text.is_empty()).then_some(AgentEvent::Message { text })
            }
            "tool_call" => Some(AgentEvent::Command {
                command: value
                    .get("tool")
                    .and_then(Value::as_str)
                    .unwrap_or("tool")
                    .to_string(),
            }),
            "result" => {
                if let Some(usage) = value.get("usage") {
                    Some(AgentEvent::Telemetry {
                        usage: TokenTelemetry {
                            input_tokens: usage
                                .get("inputTokens")
                                .and_then(Value::as_u64)
                                .unwrap_or(0),
                            output_tokens: usage
                                .get("outputTokens")
                                .and_then(Value::as_u64)
                                .unwrap_or(0),
                            cached_input_tokens: usage
                                .get("cachedInputTokens")
                                .and_then(Value::as_u64)
                                .unwrap_or(0),
                            cost_usd: usage.get("costUsd").and_then(Value::as_f64),
                        },
                    })
                } else {
                    Some(AgentEvent::Status {
                        text: "turn completed".to_string(),
                    })
                }
            }
            "error" => Some(AgentEvent::Error {
                message: value
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown cursor error")
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
            McpScope::Project => Some(dir.join(".cursor").join("mcp.json")),
            McpScope::User => home_file(&[".cursor", "mcp.json"]),
        }
    }

    fn mcp_configure(&self, workflow_dir: &Path, scope: McpScope) -> Result<(), EngineAdapterError> {
        match self.mcp_settings_path(scope, workflow_dir) {
            Some(path) => json_settings::configure(&path),
            None => Err(EngineAdapterError::McpUnsupported(METADATA.id.to_string())),
        }
    }

    fn mcp_cleanup(&self, workflow_dir: &Path, scope: McpScope) -> Result<(), EngineAdapterError> {
        match self.mcp_settings_path(scope, workflow_dir) {
            Some(path) => json_settings::cleanup(&path),
            None => Err(EngineAdapterError::McpUnsupported(METADATA.id.to_string())),
        }
    }

    fn mcp_is_configured(
        &self,
        workflow_dir: &Path,
        scope: McpScope,
    ) -> Result<bool, EngineAdapterError> {
        match self.mcp_settings_path(scope, workflow_dir) {
            Some(path) => json_settings::is_configured(&path),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
#[path = "cursor_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auggie (Augment Code) adapter.

use super::{has_credentials, home_file, json_settings, remove_credentials, run_login_command};
use crate::engine::{
    model_or_default, EngineAdapter, EngineAdapterError, EngineMetadata, Invocation, McpScope,
    RunRequest,
};
use cm_core::{AgentEvent, SessionId, TokenTelemetry};
use serde_json::Value;
use std::path::{Path, PathBuf};

const METADATA: EngineMetadata = EngineMetadata {
    id: "auggie",
    cli_binary: "auggie",
    install_command: "npm install -g @augmentcode/auggie",
    default_model: "claude-sonnet-4-5",
    default_model_reasoning_effort: None,
};

#[derive(Clone, Default)]
pub struct AuggieAdapter;

impl AuggieAdapter {
    fn auth_file(&self) -> Option<PathBuf> {
        home_file(&[".augment", "session.json"])
    }
}

impl EngineAdapter for AuggieAdapter {
    fn metadata(&self) -> &EngineMetadata {
        &METADATA
    }

    fn is_authenticated(&self) -> bool {
        has_credentials(self.auth_file(), "AUGMENT_SESSION_AUTH")
    }

    fn ensure_auth(&self, force: bool) -> Result<(), EngineAdapterError> {
        if !force && self.is_authenticated() {
            return Ok(());
        }
        run_login_command("auggie", &["login"])
    }

    fn clear_auth(&self) -> Result<(), EngineAdapterError> {
        remove_credentials(self.auth_file())
    }

    fn build_invocation(&self, request: &RunRequest) -> Invocation {
        let mut args = vec![
            "--print".to_string(),
            "--output-format".to_string(),
            "json".to_string(),
            "--model".to_string(),
            model_or_default(request, &METADATA),
        ];
        if let Some(session) = &request.resume_session_id {
            args.push("--continue".to_string());
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
            "system.init" => Some(AgentEvent::Session {
                session_id: SessionId::new(value.get("session_id")?.as_str()?),
            }),
            "message" => {
                if value.get("role").and_then(Value::as_str) != Some("assistant") {
                    return None;
                }
                Some(AgentEvent::Message {
                    text: value.get("content")?.as_str()?.to_string(),
                })
            }
            "tool_use" => Some(AgentEvent::Command {
                command: value
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("tool")
                    .to_string(),
            }),
            "usage" => Some(AgentEvent::Telemetry {
                usage: TokenTelemetry {
                    input_tokens: value
                        .get("input_tokens")
                        .and_then(Value::as_u64)
                        .unwrap_or(0),
                    output_tokens: value
                        .get("output_tokens")
                        .and_then(Value::as_u64)
                        .unwrap_or(0),
                    cached_input_tokens: value
                        .get("cache_read_tokens")
                        .and_then(Value::as_u64)
                        .unwrap_or(0),
                    cost_usd: None,
                },
            }),
            "error" => Some(AgentEvent::Error {
                message: value
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown auggie error")
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
            McpScope::Project => Some(dir.join(".augment").join("settings.json")),
            McpScope::User => home_file(&[".augment", "settings.json"]),
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
#[path = "auggie_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OpenCode adapter.
//!
//! `opencode run --format json` streams events keyed by `type`; the session
//! id arrives as `sessionID` on `session.created`. Usage is reported per
//! step on `step.finish`.

use super::{has_credentials, home_file, json_settings, remove_credentials, run_login_command};
use crate::engine::{
    model_or_default, EngineAdapter, EngineAdapterError, EngineMetadata, Invocation, McpScope,
    RunRequest,
};
use cm_core::{AgentEvent, SessionId, TokenTelemetry};
use serde_json::Value;
use std::path::{Path, PathBuf};

const METADATA: EngineMetadata = EngineMetadata {
    id: "opencode",
    cli_binary: "opencode",
    install_command: "npm install -g opencode-ai",
    default_model: "anthropic/claude-sonnet-4-5",
    default_model_reasoning_effort: None,
};

#[derive(Clone, Default)]
pub struct OpencodeAdapter;

impl OpencodeAdapter {
    fn auth_file(&self) -> Option<PathBuf> {
        home_file(&[".local", "share", "opencode", "auth.json"])
    }
}

impl EngineAdapter for OpencodeAdapter {
    fn metadata(&self) -> &EngineMetadata {
        &METADATA
    }

    fn is_authenticated(&self) -> bool {
        has_credentials(self.auth_file(), "OPENCODE_API_KEY")
    }

    fn ensure_auth(&self, force: bool) -> Result<(), EngineAdapterError> {
        if !force && self.is_authenticated() {
            return Ok(());
        }
        run_login_command("opencode", &["auth", "login"])
    }

    fn clear_auth(&self) -> Result<(), EngineAdapterError> {
        remove_credentials(self.auth_file())
    }

    fn build_invocation(&self, request: &RunRequest) -> Invocation {
        let mut args = vec![
            "run".to_string(),
            "--format".to_string(),
            "json".to_string(),
            "--model".to_string(),
            model_or_default(request, &METADATA),
        ];
        if let Some(session) = &request.resume_session_id {
            args.push("--session".to_string());
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
            "session.created" => Some(AgentEvent::Session {
                session_id: SessionId::new(value.get("sessionID")?.as_str()?),
            }),
            "message.text" => Some(AgentEvent::Message {
                text: value.get("text")?.as_str()?.to_string(),
            }),
            "tool.start" => Some(AgentEvent::Command {
                command: value
                    .get("tool")
                    .and_then(Value::as_str)
                    .unwrap_or("tool")
                    .to_string(),
            }),
            "tool.result" => Some(AgentEvent::CommandResult {
                output: value
                    .get("output")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }),
            "step.finish" => {
                let tokens = value.get("tokens")?;
                Some(AgentEvent::Telemetry {
                    usage: TokenTelemetry {
                        input_tokens: tokens.get("input").and_then(Value::as_u64).unwrap_or(0),
                        output_tokens: tokens.get("output").and_then(Value::as_u64).unwrap_or(0),
                        cached_input_tokens: tokens
                            .get("cache")
                            .and_then(|c| c.get("read"))
                            .and_then(Value::as_u64)
                            .unwrap_or(0),
                        cost_usd: value.get("cost").and_then(Value::as_f64),
                    },
                })
            }
            "session.error" => Some(AgentEvent::Error {
                message: value
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown opencode error")
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
            McpScope::Project => Some(dir.join("opencode.json")),
            McpScope::User => home_file(&[".config", "opencode", "opencode.json"]),
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
#[path = "opencode_tests.rs"]
mod tests;

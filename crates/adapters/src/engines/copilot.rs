// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! GitHub Copilot CLI adapter.
//!
//! Copilot keys its events by `event` rather than `type` and does not
//! stream token usage; usage is read from the on-disk session record after
//! the turn completes. MCP registration is not supported.

use super::{has_credentials, home_file, remove_credentials, run_login_command};
use crate::engine::{
    model_or_default, EngineAdapter, EngineAdapterError, EngineMetadata, Invocation, RunRequest,
};
use cm_core::{AgentEvent, SessionId, TokenTelemetry};
use serde_json::Value;
use std::path::{Path, PathBuf};

const METADATA: EngineMetadata = EngineMetadata {
    id: "copilot",
    cli_binary: "copilot",
    install_command: "npm install -g @github/copilot",
    default_model: "claude-sonnet-4-5",
    default_model_reasoning_effort: None,
};

#[derive(Clone, Default)]
pub struct CopilotAdapter;

impl CopilotAdapter {
    fn auth_file(&self) -> Option<PathBuf> {
        home_file(&[".config", "github-copilot", "apps.json"])
    }
}

impl EngineAdapter for CopilotAdapter {
    fn metadata(&self) -> &EngineMetadata {
        &METADATA
    }

    fn is_authenticated(&self) -> bool {
        has_credentials(self.auth_file(), "GH_TOKEN")
    }

    fn ensure_auth(&self, force: bool) -> Result<(), EngineAdapterError> {
        if !force && self.is_authenticated() {
            return Ok(());
        }
        run_login_command("copilot", &["auth", "login"])
    }

    fn clear_auth(&self) -> Result<(), EngineAdapterError> {
        remove_credentials(self.auth_file())
    }

    fn build_invocation(&self, request: &RunRequest) -> Invocation {
        let mut args = vec![
            "--print".to_string(),
            "--log-format".to_string(),
            "json".to_string(),
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
        match value.get("event")?.as_str()? {
            "session_started" => Some(AgentEvent::Session {
                session_id: SessionId::new(value.get("session_id")?.as_str()?),
            }),
            "assistant_message" => Some(AgentEvent::Message {
                text: value.get("content")?.as_str()?.to_string(),
            }),
            "tool_execution" => Some(AgentEvent::Command {
                command: value
                    .get("command")
                    .and_then(Value::as_str)
                    .unwrap_or("tool")
                    .to_string(),
            }),
            "turn_complete" => Some(AgentEvent::Status {
                text: "turn completed".to_string(),
            }),
            "error" => Some(AgentEvent::Error {
                message: value
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown copilot error")
                    .to_string(),
            }),
            _ => None,
        }
    }

    fn scan_session_telemetry(
        &self,
        cwd: &Path,
        session_id: &SessionId,
    ) -> Option<TokenTelemetry> {
        let path = cwd
            .join(".copilot")
            .join("sessions")
            .join(format!("{session_id}.json"));
        let data = std::fs::read(path).ok()?;
        let value: Value = serde_json::from_slice(&data).ok()?;
        let usage = value.get("usage")?;
        Some(TokenTelemetry {
            input_tokens: usage
                .get("input_tokens")
                .and_then(Value::as_u64)
                .unwrap_or(0),
            output_tokens: usage
                .get("output_tokens")
                .and_then(Value::as_u64)
                .unwrap_or(0),
            cached_input_tokens: usage
                .get("cached_tokens")
                .and_then(Value::as_u64)
                .unwrap_or(0),
            cost_usd: None,
        })
    }
}

#[cfg(test)]
#[path = "copilot_tests.rs"]
mod tests;

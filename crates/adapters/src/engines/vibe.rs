// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mistral Vibe adapter. Events are keyed by `kind`; no MCP support.

use super::{has_credentials, home_file, remove_credentials, run_login_command};
use crate::engine::{
    model_or_default, EngineAdapter, EngineAdapterError, EngineMetadata, Invocation, RunRequest,
};
use cm_core::{AgentEvent, SessionId, TokenTelemetry};
use serde_json::Value;
use std::path::PathBuf;

const METADATA: EngineMetadata = EngineMetadata {
    id: "vibe",
    cli_binary: "vibe",
    install_command: "uv tool install mistral-vibe",
    default_model: "devstral-medium-latest",
    default_model_reasoning_effort: None,
};

#[derive(Clone, Default)]
pub struct VibeAdapter;

impl VibeAdapter {
    fn auth_file(&self) -> Option<PathBuf> {
        home_file(&[".vibe", "credentials.json"])
    }
}

impl EngineAdapter for VibeAdapter {
    fn metadata(&self) -> &EngineMetadata {
        &METADATA
    }

    fn is_authenticated(&self) -> bool {
        has_credentials(self.auth_file(), "MISTRAL_API_KEY")
    }

    fn ensure_auth(&self, force: bool) -> Result<(), EngineAdapterError> {
        if !force && self.is_authenticated() {
            return Ok(());
        }
        run_login_command("vibe", &["login"])
    }

    fn clear_auth(&self) -> Result<(), EngineAdapterError> {
        remove_credentials(self.auth_file())
    }

    fn build_invocation(&self, request: &RunRequest) -> Invocation {
        let mut args = vec![
            "run".to_string(),
            "--json".to_string(),
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
        match value.get("kind")?.as_str()? {
            "session" => Some(AgentEvent::Session {
                session_id: SessionId::new(value.get("id")?.as_str()?),
            }),
            "message" => Some(AgentEvent::Message {
                text: value.get("text")?.as_str()?.to_string(),
            }),
            "exec" => Some(AgentEvent::Command {
                command: value
                    .get("cmd")
                    .and_then(Value::as_str)
                    .unwrap_or("tool")
                    .to_string(),
            }),
            "stats" => Some(AgentEvent::Telemetry {
                usage: TokenTelemetry {
                    input_tokens: value
                        .get("prompt_tokens")
                        .and_then(Value::as_u64)
                        .unwrap_or(0),
                    output_tokens: value
                        .get("completion_tokens")
                        .and_then(Value::as_u64)
                        .unwrap_or(0),
                    cached_input_tokens: 0,
                    cost_usd: None,
                },
            }),
            "fatal" => Some(AgentEvent::Error {
                message: value
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown vibe error")
                    .to_string(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "vibe_tests.rs"]
mod tests;

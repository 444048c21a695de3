// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake engine adapter for tests.
//!
//! Runs `sh` with a scripted body instead of a real agent CLI and parses a
//! tiny `{"fake": ...}` event dialect, so engine and runner behavior can be
//! exercised without any external binaries.

use crate::engine::{EngineAdapter, EngineAdapterError, EngineMetadata, Invocation, RunRequest};
use cm_core::{AgentEvent, SessionId, TokenTelemetry};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

const METADATA: EngineMetadata = EngineMetadata {
    id: "fake",
    cli_binary: "sh",
    install_command: "install a POSIX shell",
    default_model: "fake-model",
    default_model_reasoning_effort: None,
};

/// Scripted fake engine.
#[derive(Clone)]
pub struct FakeEngineAdapter {
    script: Arc<Mutex<String>>,
    requests: Arc<Mutex<Vec<RunRequest>>>,
    authenticated: Arc<Mutex<bool>>,
}

impl FakeEngineAdapter {
    /// Fake that emits one session event and one message, then exits 0.
    pub fn new() -> Self {
        Self::with_script(
            r#"printf '%s\n' '{"fake":"session","id":"fake-session-1"}' '{"fake":"message","text":"ok"}'"#,
        )
    }

    /// Fake running `sh -c <script>`.
    pub fn with_script(script: &str) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.to_string())),
            requests: Arc::new(Mutex::new(Vec::new())),
            authenticated: Arc::new(Mutex::new(true)),
        }
    }

    /// Replace the script for subsequent runs.
    pub fn set_script(&self, script: &str) {
        *self.script.lock() = script.to_string();
    }

    pub fn set_authenticated(&self, value: bool) {
        *self.authenticated.lock() = value;
    }

    /// Every request passed to `build_invocation`, in order.
    pub fn requests(&self) -> Vec<RunRequest> {
        self.requests.lock().clone()
    }

    /// Convenience: a script that emits the given JSON lines.
    pub fn script_emitting(lines: &[&str]) -> String {
        let quoted: Vec<String> = lines.iter().map(|l| format!("'{l}'")).collect();
        format!("printf '%s\\n' {}", quoted.join(" "))
    }
}

impl Default for FakeEngineAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineAdapter for FakeEngineAdapter {
    fn metadata(&self) -> &EngineMetadata {
        &METADATA
    }

    fn is_authenticated(&self) -> bool {
        *self.authenticated.lock()
    }

    fn ensure_auth(&self, _force: bool) -> Result<(), EngineAdapterError> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(EngineAdapterError::NotAuthenticated {
                engine: "fake".to_string(),
                login: "fake login".to_string(),
            })
        }
    }

    fn clear_auth(&self) -> Result<(), EngineAdapterError> {
        *self.authenticated.lock() = false;
        Ok(())
    }

    fn build_invocation(&self, request: &RunRequest) -> Invocation {
        self.requests.lock().push(request.clone());
        Invocation {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), self.script.lock().clone()],
            env: Vec::new(),
            stdin_payload: request.effective_prompt().to_string(),
        }
    }

    fn parse_event_line(&self, line: &str) -> Option<AgentEvent> {
        let value: Value = serde_json::from_str(line).ok()?;
        match value.get("fake")?.as_str()? {
            "session" => Some(AgentEvent::Session {
                session_id: SessionId::new(value.get("id")?.as_str()?),
            }),
            "message" => Some(AgentEvent::Message {
                text: value.get("text")?.as_str()?.to_string(),
            }),
            "status" => Some(AgentEvent::Status {
                text: value.get("text")?.as_str()?.to_string(),
            }),
            "usage" => Some(AgentEvent::Telemetry {
                usage: TokenTelemetry {
                    input_tokens: value.get("in").and_then(Value::as_u64).unwrap_or(0),
                    output_tokens: value.get("out").and_then(Value::as_u64).unwrap_or(0),
                    cached_input_tokens: 0,
                    cost_usd: None,
                },
            }),
            "error" => Some(AgentEvent::Error {
                message: value.get("message")?.as_str()?.to_string(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;

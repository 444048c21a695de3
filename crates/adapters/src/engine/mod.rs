// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine adapter contract.
//!
//! One adapter per external agent CLI. Adapters are selected by id from the
//! startup-time registry; there is no dynamic loading. An adapter owns the
//! engine-specific pieces only: argv construction, event-line parsing,
//! authentication checks, and MCP settings. Process lifecycle belongs to
//! the runner.

use cm_core::{AgentEvent, SessionId, TokenTelemetry};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from adapter operations
#[derive(Debug, Error)]
pub enum EngineAdapterError {
    #[error("{engine} is not authenticated. Run `{login}` to log in.")]
    NotAuthenticated { engine: String, login: String },
    #[error("auth command failed: {0}")]
    AuthFailed(String),
    #[error("MCP is not supported by {0}")]
    McpUnsupported(String),
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Static facts about an engine CLI.
#[derive(Debug, Clone)]
pub struct EngineMetadata {
    /// Registry id (`codex`, `cursor`, ...).
    pub id: &'static str,
    /// Binary looked up on PATH.
    pub cli_binary: &'static str,
    /// Shown when the binary is missing.
    pub install_command: &'static str,
    pub default_model: &'static str,
    pub default_model_reasoning_effort: Option<&'static str>,
}

/// Scope for engine MCP settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpScope {
    Project,
    User,
}

/// Everything an adapter needs to build one invocation.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub prompt: String,
    pub cwd: PathBuf,
    pub model: Option<String>,
    pub model_reasoning_effort: Option<String>,
    /// When set, the adapter produces a resume-flavored argv and
    /// `resume_prompt` replaces the primary prompt.
    pub resume_session_id: Option<SessionId>,
    pub resume_prompt: Option<String>,
}

impl RunRequest {
    pub fn is_resume(&self) -> bool {
        self.resume_session_id.is_some()
    }

    /// The prompt actually delivered to the child.
    pub fn effective_prompt(&self) -> &str {
        match (&self.resume_session_id, &self.resume_prompt) {
            (Some(_), Some(resume)) => resume,
            _ => &self.prompt,
        }
    }
}

/// Concrete command produced by an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Adapter-specific environment merged over the inherited one.
    pub env: Vec<(String, String)>,
    /// Payload written to the child's stdin.
    pub stdin_payload: String,
}

/// One external agent CLI.
pub trait EngineAdapter: Send + Sync + 'static {
    fn metadata(&self) -> &EngineMetadata;

    /// Cheap local authentication check (credential files, env vars).
    fn is_authenticated(&self) -> bool;

    /// Run the engine's login flow when needed (`force` re-runs it).
    fn ensure_auth(&self, force: bool) -> Result<(), EngineAdapterError>;

    /// Remove stored credentials.
    fn clear_auth(&self) -> Result<(), EngineAdapterError>;

    /// Build the argv/env/stdin for one run.
    fn build_invocation(&self, request: &RunRequest) -> Invocation;

    /// Parse one stdout line into a canonical event. `None` means the line
    /// is not an event and should pass through verbatim.
    fn parse_event_line(&self, line: &str) -> Option<AgentEvent>;

    /// Render a canonical event as a UI line; `None` swallows it.
    fn render_event(&self, event: &AgentEvent) -> Option<String> {
        render_default(event)
    }

    /// Telemetry for engines that do not stream usage: scan the engine's
    /// on-disk session file after a turn completes.
    fn scan_session_telemetry(
        &self,
        _cwd: &Path,
        _session_id: &SessionId,
    ) -> Option<TokenTelemetry> {
        None
    }

    /// Whether this adapter can register MCP servers.
    fn mcp_supported(&self) -> bool {
        false
    }

    /// Path of the engine's MCP settings file for `scope`.
    fn mcp_settings_path(&self, _scope: McpScope, _dir: &Path) -> Option<PathBuf> {
        None
    }

    /// Register the CodeMachine router in the engine's MCP settings.
    fn mcp_configure(&self, _workflow_dir: &Path, _scope: McpScope) -> Result<(), EngineAdapterError> {
        Err(EngineAdapterError::McpUnsupported(
            self.metadata().id.to_string(),
        ))
    }

    /// Remove the CodeMachine router from the engine's MCP settings.
    fn mcp_cleanup(&self, _workflow_dir: &Path, _scope: McpScope) -> Result<(), EngineAdapterError> {
        Err(EngineAdapterError::McpUnsupported(
            self.metadata().id.to_string(),
        ))
    }

    fn mcp_is_configured(
        &self,
        _workflow_dir: &Path,
        _scope: McpScope,
    ) -> Result<bool, EngineAdapterError> {
        Ok(false)
    }
}

/// Default UI rendering shared by the adapters.
pub fn render_default(event: &AgentEvent) -> Option<String> {
    match event {
        AgentEvent::Status { text } => Some(format!("• {text}")),
        AgentEvent::Command { command } => Some(format!("$ {command}")),
        AgentEvent::CommandResult { output } => Some(output.clone()),
        AgentEvent::Message { text } => Some(text.clone()),
        AgentEvent::Telemetry { .. } | AgentEvent::Session { .. } => None,
        AgentEvent::Error { message } => Some(format!("error: {message}")),
    }
}

/// Model flag resolution shared by the adapters.
pub(crate) fn model_or_default(request: &RunRequest, metadata: &EngineMetadata) -> String {
    request
        .model
        .clone()
        .unwrap_or_else(|| metadata.default_model.to_string())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concrete engine adapters.
//!
//! Each module wraps one agent CLI. They share small helpers for JSON MCP
//! settings and credential-file checks but keep their own event parsers:
//! every CLI speaks a slightly different JSON-line schema.

mod auggie;
mod codex;
mod copilot;
mod cursor;
mod json_settings;
mod opencode;
mod vibe;

pub use auggie::AuggieAdapter;
pub use codex::CodexAdapter;
pub use copilot::CopilotAdapter;
pub use cursor::CursorAdapter;
pub use opencode::OpencodeAdapter;
pub use vibe::VibeAdapter;

use std::path::PathBuf;

/// Resolve a credential path under the user's home directory.
pub(crate) fn home_file(parts: &[&str]) -> Option<PathBuf> {
    let mut path = dirs::home_dir()?;
    for part in parts {
        path.push(part);
    }
    Some(path)
}

/// True when a credential file exists or the given env var is set.
pub(crate) fn has_credentials(file: Option<PathBuf>, env_var: &str) -> bool {
    if std::env::var_os(env_var).is_some_and(|v| !v.is_empty()) {
        return true;
    }
    file.map(|p| p.is_file()).unwrap_or(false)
}

/// Run a login command interactively, mapping failure to an adapter error.
pub(crate) fn run_login_command(
    program: &str,
    args: &[&str],
) -> Result<(), super::engine::EngineAdapterError> {
    let status = std::process::Command::new(program)
        .args(args)
        .status()
        .map_err(|e| super::engine::EngineAdapterError::AuthFailed(e.to_string()))?;
    if status.success() {
        Ok(())
    } else {
        Err(super::engine::EngineAdapterError::AuthFailed(format!(
            "{program} exited with {status}"
        )))
    }
}

/// Remove a credential file if present.
pub(crate) fn remove_credentials(
    file: Option<PathBuf>,
) -> Result<(), super::engine::EngineAdapterError> {
    if let Some(path) = file {
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(super::engine::EngineAdapterError::Io { path, source: e });
            }
        }
    }
    Ok(())
}

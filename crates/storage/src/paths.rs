// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted state layout under `<cwd>/.codemachine/`.

use crate::error::StorageError;
use std::path::{Path, PathBuf};

/// Directory name of the state tree root.
pub const STATE_DIR_NAME: &str = ".codemachine";

/// Resolved paths of the state tree. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLayout {
    root: PathBuf,
}

impl StateLayout {
    /// Layout rooted at `<cwd>/.codemachine`.
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            root: cwd.as_ref().join(STATE_DIR_NAME),
        }
    }

    /// Layout with an explicit root (tests, CODEMACHINE_CWD override).
    pub fn at_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn steps_dir(&self) -> PathBuf {
        self.root.join("steps")
    }

    pub fn step_file(&self, index: usize) -> PathBuf {
        self.steps_dir().join(format!("{index}.json"))
    }

    pub fn mcp_dir(&self) -> PathBuf {
        self.root.join("mcp")
    }

    /// Active Servers Record read by the MCP router on every tool call.
    pub fn mcp_context_file(&self) -> PathBuf {
        self.mcp_dir().join("context.json")
    }

    /// User-defined MCP backend definitions.
    pub fn mcp_servers_file(&self) -> PathBuf {
        self.mcp_dir().join("servers.toml")
    }

    pub fn controller_file(&self) -> PathBuf {
        self.root.join("controller.json")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn log_file(&self, monitoring_id: u64) -> PathBuf {
        self.logs_dir().join(format!("{monitoring_id}.log"))
    }

    /// Opaque agent memory blobs; contents owned by prompts, not the engine.
    pub fn memory_dir(&self) -> PathBuf {
        self.root.join("memory")
    }

    /// Create every directory of the tree.
    pub fn ensure(&self) -> Result<(), StorageError> {
        for dir in [
            self.root.clone(),
            self.steps_dir(),
            self.mcp_dir(),
            self.logs_dir(),
            self.memory_dir(),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;

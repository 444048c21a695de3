// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Active Servers Record (`mcp/context.json`).
//!
//! Written by the runner loop before a step starts; read by the MCP router
//! on every `tools/list` and `tools/call`. Readers tolerate transient
//! absence of the file (an absent record means "nothing active").

use crate::atomic;
use crate::error::StorageError;
use crate::paths::StateLayout;
use serde::{Deserialize, Serialize};

/// One entry of the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveServer {
    /// Backend server id.
    pub server: String,
    /// Allowed tools; `None` means all tools of that server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,
    /// Allowed spawn targets; `None` means no restriction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<String>>,
}

impl ActiveServer {
    /// Entry exposing every tool of `server` with no target restriction.
    pub fn all(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            tools: None,
            targets: None,
        }
    }

    /// Whether `tool` is allowed by this entry.
    pub fn allows_tool(&self, tool: &str) -> bool {
        match &self.tools {
            None => true,
            Some(tools) => tools.iter().any(|t| t == tool),
        }
    }
}

/// Reader/writer for the record file.
#[derive(Clone)]
pub struct ActiveServersStore {
    layout: StateLayout,
}

impl ActiveServersStore {
    pub fn new(layout: StateLayout) -> Self {
        Self { layout }
    }

    /// Read the record; an absent file is an empty record.
    pub fn read(&self) -> Result<Vec<ActiveServer>, StorageError> {
        Ok(atomic::read_json(&self.layout.mcp_context_file())?.unwrap_or_default())
    }

    pub fn write(&self, servers: &[ActiveServer]) -> Result<(), StorageError> {
        atomic::write_json(&self.layout.mcp_context_file(), &servers)
    }

    /// Look up the entry for `server`, if active.
    pub fn entry(&self, server: &str) -> Result<Option<ActiveServer>, StorageError> {
        Ok(self.read()?.into_iter().find(|e| e.server == server))
    }
}

#[cfg(test)]
#[path = "active_servers_tests.rs"]
mod tests;

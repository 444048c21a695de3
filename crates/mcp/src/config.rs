// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-defined external MCP server definitions (`mcp/servers.toml`).

use crate::McpError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One external stdio MCP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalServerConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServersFile {
    #[serde(default)]
    server: Vec<ExternalServerConfig>,
}

/// Load server definitions; a missing file means no external servers.
pub fn load_external_servers(path: &Path) -> Result<Vec<ExternalServerConfig>, McpError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(McpError::Io(e)),
    };
    let file: ServersFile =
        toml::from_str(&raw).map_err(|e| McpError::Config(e.to_string()))?;
    Ok(file.server)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

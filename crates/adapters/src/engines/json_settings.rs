// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared JSON MCP settings editing (`mcpServers` map convention).

use crate::engine::EngineAdapterError;
use serde_json::{json, Map, Value};
use std::path::Path;

/// Entry name the router registers under.
pub const ROUTER_SERVER_NAME: &str = "codemachine";

fn read_settings(path: &Path) -> Result<Map<String, Value>, EngineAdapterError> {
    match std::fs::read(path) {
        Ok(data) => match serde_json::from_slice::<Value>(&data) {
            Ok(Value::Object(map)) => Ok(map),
            _ => Ok(Map::new()),
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
        Err(e) => Err(EngineAdapterError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

fn write_settings(path: &Path, map: &Map<String, Value>) -> Result<(), EngineAdapterError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| EngineAdapterError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let data = serde_json::to_vec_pretty(&Value::Object(map.clone())).unwrap_or_default();
    std::fs::write(path, data).map_err(|e| EngineAdapterError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Register the CodeMachine router under `mcpServers.codemachine`.
pub fn configure(path: &Path) -> Result<(), EngineAdapterError> {
    let mut settings = read_settings(path)?;
    let servers = settings
        .entry("mcpServers")
        .or_insert_with(|| json!({}));
    if let Value::Object(servers) = servers {
        servers.insert(
            ROUTER_SERVER_NAME.to_string(),
            json!({
                "command": "codemachine",
                "args": ["mcp", "serve"],
            }),
        );
    }
    write_settings(path, &settings)
}

/// Remove the router entry; leaves other servers untouched.
pub fn cleanup(path: &Path) -> Result<(), EngineAdapterError> {
    let mut settings = read_settings(path)?;
    if let Some(Value::Object(servers)) = settings.get_mut("mcpServers") {
        servers.remove(ROUTER_SERVER_NAME);
    }
    write_settings(path, &settings)
}

/// Whether the router entry is present.
pub fn is_configured(path: &Path) -> Result<bool, EngineAdapterError> {
    let settings = read_settings(path)?;
    Ok(settings
        .get("mcpServers")
        .and_then(|s| s.get(ROUTER_SERVER_NAME))
        .is_some())
}

#[cfg(test)]
#[path = "json_settings_tests.rs"]
mod tests;

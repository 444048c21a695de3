// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backend contract for the router.
//!
//! In-process backends run on the router's event loop; external backends
//! proxy to MCP stdio child processes. A failing backend must never take
//! the router down: `Err` values translate to missing tools or
//! "backend unavailable" call results.

use crate::protocol::{CallToolResult, Tool};
use crate::McpError;
use async_trait::async_trait;
use serde_json::Value;

/// One tool server behind the router.
#[async_trait]
pub trait ToolBackend: Send + Sync {
    /// Stable server id referenced by the Active Servers Record.
    fn id(&self) -> &str;

    /// Tools this backend currently advertises.
    async fn tools(&self) -> Result<Vec<Tool>, McpError>;

    /// Execute a tool. Tool-level failures belong in the result
    /// (`is_error`); transport-level failures are `Err`.
    async fn call(&self, tool: &str, args: Value) -> Result<CallToolResult, McpError>;
}

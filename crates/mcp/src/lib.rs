// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cm-mcp: MCP router and built-in tool backends.
//!
//! The router speaks MCP (JSON-RPC over stdio, `tools` capability only) to
//! one agent and multiplexes N backend servers behind it: the built-in
//! in-process `workflow-signals` and `agent-coordination` backends plus any
//! user-defined external stdio servers. Per-call filtering comes from the
//! Active Servers Record that the runner writes before each step.

pub mod backend;
pub mod config;
pub mod coordination;
pub mod external;
pub mod protocol;
pub mod router;
pub mod script;
pub mod signals;
pub mod wire;

pub use backend::ToolBackend;
pub use config::ExternalServerConfig;
pub use coordination::{AgentCoordinationBackend, AgentSpawner, AgentStatus};
pub use external::ExternalBackend;
pub use protocol::{
    CallToolResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ListToolsResult, Tool,
    ToolContent, ALLOWED_TARGETS_ARG,
};
pub use router::McpRouter;
pub use script::{InputQualifier, Script, ScriptError, ScriptInvocation};
pub use signals::{
    Approval, ApprovalDecision, DirectiveRecord, Proposal, SignalsHandle, WorkflowSignalsBackend,
};

use thiserror::Error;

/// Errors from router and backend plumbing
#[derive(Debug, Error)]
pub enum McpError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("backend {backend} returned error {code}: {message}")]
    BackendRpc {
        backend: String,
        code: i64,
        message: String,
    },

    #[error("connection closed")]
    ConnectionClosed,

    #[error("failed to load MCP server config: {0}")]
    Config(String),
}

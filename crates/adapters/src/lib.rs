// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cm-adapters: Engine adapters and the subprocess runner.
//!
//! Each external coding-agent CLI (Codex, Cursor, OpenCode, Auggie, Copilot,
//! Mistral Vibe) is wrapped by one compiled-in adapter that knows how to
//! build its argv, parse its JSON event stream into canonical
//! [`cm_core::AgentEvent`]s, check authentication, and configure MCP. The
//! runner spawns one child per prompt and streams normalized output back to
//! the engine.

pub mod engine;
pub mod engines;
pub mod normalize;
pub mod registry;
pub mod runner;

pub use engine::{
    EngineAdapter, EngineAdapterError, EngineMetadata, Invocation, McpScope, RunRequest,
};
pub use normalize::{normalize_chunk, LineAssembler};
pub use registry::EngineRegistry;
pub use runner::{RunOutput, RunOptions, RunnerError, RunnerUpdate, DEFAULT_RUN_TIMEOUT};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeEngineAdapter;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical engine stream events.
//!
//! Every engine adapter parses its own JSON-line schema into this small set
//! of variants; the subprocess runner and the UI operate on these only.

use crate::id::SessionId;
use serde::{Deserialize, Serialize};

/// Token usage and cost reported by an engine, accumulated across turns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct TokenTelemetry {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cached_input_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
}

impl TokenTelemetry {
    /// Fold another turn's usage into this accumulator.
    pub fn accumulate(&mut self, other: &TokenTelemetry) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cached_input_tokens += other.cached_input_tokens;
        if let Some(cost) = other.cost_usd {
            *self.cost_usd.get_or_insert(0.0) += cost;
        }
    }
}

/// One canonical event parsed from an engine's output stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Lifecycle status line (started, thinking, turn completed).
    Status { text: String },
    /// The agent ran a command or tool.
    Command { command: String },
    /// Output of a command or tool run.
    CommandResult { output: String },
    /// Assistant message content.
    Message { text: String },
    /// Token usage for the current turn.
    Telemetry { usage: TokenTelemetry },
    /// The engine announced its conversation session id.
    Session { session_id: SessionId },
    /// Error surfaced inside the stream.
    Error { message: String },
}

impl AgentEvent {
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            AgentEvent::Session { session_id } => Some(session_id),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, AgentEvent::Error { .. })
    }
}

#[cfg(test)]
#[path = "agent_event_tests.rs"]
mod tests;

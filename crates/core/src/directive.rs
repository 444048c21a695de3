// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted step directives.
//!
//! A directive is an instruction attached to a step telling the next-step
//! logic what to do once the step's queue is exhausted. Agents set it via
//! MCP tools; the engine consults it in directive processing and resets it
//! to `continue` when the step completes.

use crate::id::StepId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What to do when the owning step finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveAction {
    #[default]
    Continue,
    Pause,
    Loop,
    Stop,
}

impl fmt::Display for DirectiveAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectiveAction::Continue => write!(f, "continue"),
            DirectiveAction::Pause => write!(f, "pause"),
            DirectiveAction::Loop => write!(f, "loop"),
            DirectiveAction::Stop => write!(f, "stop"),
        }
    }
}

/// Directive record persisted inside a step session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Directive {
    pub action: DirectiveAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Explicit loop target; when absent, the step's loop behavior decides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_step_id: Option<StepId>,
}

impl Directive {
    pub fn continue_() -> Self {
        Self::default()
    }

    pub fn stop(reason: impl Into<String>) -> Self {
        Self {
            action: DirectiveAction::Stop,
            reason: Some(reason.into()),
            target_step_id: None,
        }
    }

    pub fn pause(reason: impl Into<String>) -> Self {
        Self {
            action: DirectiveAction::Pause,
            reason: Some(reason.into()),
            target_step_id: None,
        }
    }

    pub fn loop_() -> Self {
        Self {
            action: DirectiveAction::Loop,
            reason: None,
            target_step_id: None,
        }
    }
}

#[cfg(test)]
#[path = "directive_tests.rs"]
mod tests;

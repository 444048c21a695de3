// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mutable workflow context carried through execution.
//!
//! The context holds only hints synchronized from persisted step sessions;
//! the step index manager owns the durable queue state.

use crate::id::{MonitoringId, SessionId};
use crate::step::ModuleStep;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Output captured from the most recently completed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StepOutput {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring_id: Option<MonitoringId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

/// Workflow context mutated by FSM transitions and the runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowContext {
    pub current_step_index: usize,
    pub total_steps: usize,
    pub steps: Vec<ModuleStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_output: Option<StepOutput>,
    pub auto_mode: bool,
    pub paused: bool,
    pub continuation_prompt_sent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub cwd: PathBuf,
    /// Root of the persisted state tree (`<cwd>/.codemachine`).
    pub state_root: PathBuf,
}

impl WorkflowContext {
    pub fn new(steps: Vec<ModuleStep>, cwd: PathBuf, state_root: PathBuf) -> Self {
        Self {
            current_step_index: 0,
            total_steps: steps.len(),
            steps,
            current_output: None,
            auto_mode: false,
            paused: false,
            continuation_prompt_sent: false,
            last_error: None,
            cwd,
            state_root,
        }
    }

    pub fn current_step(&self) -> Option<&ModuleStep> {
        self.steps.get(self.current_step_index)
    }

    pub fn is_last_step(&self) -> bool {
        self.total_steps == 0 || self.current_step_index >= self.total_steps - 1
    }

    /// Move to the next step. Callers must check `is_last_step` first.
    pub(crate) fn advance(&mut self) {
        self.current_step_index += 1;
        self.current_output = None;
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Module step definitions carried through workflow execution.
//!
//! A `ModuleStep` is one unit of work: one agent invocation plus any
//! follow-up prompts delivered on the same engine session. The template
//! loader builds these from the workflow template and agent config files.

use crate::id::{AgentId, StepId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Behavior attached to a module step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModuleBehavior {
    /// Step back `steps` positions when the step's directive says loop.
    Loop(LoopBehavior),
    /// Run another agent after this step's queue is exhausted.
    Trigger(TriggerBehavior),
    /// Hold for operator confirmation before advancing.
    Checkpoint,
}

/// Loop behavior parameters (`action: step_back`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopBehavior {
    /// How many steps to go back.
    pub steps: usize,
    /// Iteration ceiling; unbounded when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,
    /// Step ids skipped while the loop is in progress.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skip: Vec<StepId>,
}

/// Trigger behavior parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerBehavior {
    pub trigger_agent_id: AgentId,
}

/// One executable step of a workflow template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleStep {
    /// Step identity, used by directives and loop skip lists.
    pub id: StepId,
    /// Agent definition this step runs.
    pub agent_id: AgentId,
    /// Human-readable agent name for logs and the UI.
    pub agent_name: String,
    /// Prompt file(s); more than one entry means concatenation.
    pub prompt_paths: Vec<PathBuf>,
    /// Engine override (registry id). None means the default engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    /// Model override passed through to the engine adapter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_reasoning_effort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<ModuleBehavior>,
    /// Completed execute-once steps are skipped on later runs of the same
    /// template revision.
    #[serde(default)]
    pub execute_once: bool,
    /// `Some(false)` blocks delegation to the controller on step completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interactive: Option<bool>,
    /// Track labels gating inclusion of this step.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tracks: Vec<String>,
    /// Condition flags that must all be enabled for inclusion.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<String>,
}

impl ModuleStep {
    /// Minimal step for construction sites that fill fields incrementally.
    pub fn new(id: impl Into<StepId>, agent_id: impl Into<AgentId>) -> Self {
        let agent_id = agent_id.into();
        Self {
            id: id.into(),
            agent_name: agent_id.as_str().to_string(),
            agent_id,
            prompt_paths: Vec::new(),
            engine: None,
            model: None,
            model_reasoning_effort: None,
            behavior: None,
            execute_once: false,
            interactive: None,
            tracks: Vec::new(),
            conditions: Vec::new(),
        }
    }

    /// Whether completion of this step may hand control to the controller.
    pub fn delegation_allowed(&self) -> bool {
        self.interactive != Some(false)
    }

    pub fn loop_behavior(&self) -> Option<&LoopBehavior> {
        match &self.behavior {
            Some(ModuleBehavior::Loop(l)) => Some(l),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;

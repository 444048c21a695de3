// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-step scenario classification.
//!
//! Three flags (auto mode, paused, and a step that opted out of
//! interaction via `interactive = false`) combine into eight numbered
//! scenarios. Each scenario maps to one of three mode handlers. Pause
//! always takes precedence, so every paused scenario is handled
//! interactively.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Flags a scenario is classified from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioFlags {
    pub auto_mode: bool,
    pub paused: bool,
    /// The current step carries `interactive = false`.
    pub noninteractive_step: bool,
}

/// Handler family a scenario resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerMode {
    /// Wait on an input provider, then apply the returned action.
    Interactive,
    /// Pump queued prompts, then process directives (controller approves).
    Autonomous,
    /// Process directives and auto-advance; no input box.
    Continuous,
}

/// One of the eight numbered scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scenario(pub u8);

impl Scenario {
    /// Classify flags into a scenario number.
    ///
    /// Numbering: 1 + auto*4 + paused*2 + noninteractive*1.
    pub fn classify(flags: ScenarioFlags) -> Self {
        let n = 1
            + u8::from(flags.auto_mode) * 4
            + u8::from(flags.paused) * 2
            + u8::from(flags.noninteractive_step);
        Scenario(n)
    }

    /// Which handler family services this scenario.
    pub fn mode(&self) -> HandlerMode {
        match self.0 {
            5 => HandlerMode::Autonomous,
            6 => HandlerMode::Continuous,
            _ => HandlerMode::Interactive,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scenario {}", self.0)
    }
}

#[cfg(test)]
#[path = "scenario_tests.rs"]
mod tests;

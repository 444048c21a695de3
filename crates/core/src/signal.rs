// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator signals and the autonomous-mode flag.
//!
//! Signals travel on a single typed channel owned by the runner; the signal
//! manager is the only publisher external input code talks to.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel returned by the user provider when the operator switches the
/// workflow to manual mode mid-input.
pub const SWITCH_TO_MANUAL: &str = "__SWITCH_TO_MANUAL__";

/// Sentinel returned by the user provider when the operator switches the
/// workflow back to autonomous mode.
pub const SWITCH_TO_AUTO: &str = "__SWITCH_TO_AUTO__";

/// Persisted autonomous-mode flag.
///
/// `Never` is transient: it blocks automatic re-entry into autonomous mode
/// while a returned-to-controller conversation is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutonomousMode {
    True,
    #[default]
    False,
    Never,
}

impl AutonomousMode {
    pub fn is_auto(&self) -> bool {
        matches!(self, AutonomousMode::True)
    }
}

// Persisted as the strings "true" | "false" | "never".
impl Serialize for AutonomousMode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(match self {
            AutonomousMode::True => "true",
            AutonomousMode::False => "false",
            AutonomousMode::Never => "never",
        })
    }
}

impl<'de> Deserialize<'de> for AutonomousMode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "true" => Ok(AutonomousMode::True),
            "false" => Ok(AutonomousMode::False),
            "never" => Ok(AutonomousMode::Never),
            other => Err(serde::de::Error::unknown_variant(
                other,
                &["true", "false", "never"],
            )),
        }
    }
}

impl fmt::Display for AutonomousMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutonomousMode::True => write!(f, "true"),
            AutonomousMode::False => write!(f, "false"),
            AutonomousMode::Never => write!(f, "never"),
        }
    }
}

/// Operator key events surfaced as named signals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Pause,
    Skip,
    Stop,
    ReturnToController,
    ModeChange { autonomous_mode: AutonomousMode },
    /// Text submitted (or skip pressed) in the input-active UI state.
    Input { prompt: Option<String>, skip: bool },
    /// Operator asked the controller conversation to end and execution to resume.
    ControllerContinue,
}

impl Signal {
    /// Stable name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Signal::Pause => "pause",
            Signal::Skip => "skip",
            Signal::Stop => "stop",
            Signal::ReturnToController => "return-to-controller",
            Signal::ModeChange { .. } => "mode-change",
            Signal::Input { .. } => "input",
            Signal::ControllerContinue => "controller-continue",
        }
    }
}

#[cfg(test)]
#[path = "signal_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Input provider contract.
//!
//! Both the user provider (terminal input) and the controller provider
//! (controller agent output) resolve to one of these outcomes.

use serde::{Deserialize, Serialize};

/// Who produced an input outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    User,
    Controller,
}

/// Result of one `get_input` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputOutcome {
    /// Text input. An empty `value` means "advance".
    Input { value: String, source: InputSource },
    Skip,
    Stop,
}

impl InputOutcome {
    pub fn advance(source: InputSource) -> Self {
        InputOutcome::Input {
            value: String::new(),
            source,
        }
    }

    /// Whether this outcome is an empty-input advance request.
    pub fn is_advance(&self) -> bool {
        matches!(self, InputOutcome::Input { value, .. } if value.is_empty())
    }
}

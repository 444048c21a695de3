// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queued (chained) prompts delivered by resuming a step's session.

use serde::{Deserialize, Serialize};

/// A follow-up prompt queued behind a step's primary prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedPrompt {
    /// Stable name (usually the source file stem).
    pub name: String,
    /// Label shown in the input-active UI state.
    pub label: String,
    /// Full prompt text.
    pub content: String,
}

impl QueuedPrompt {
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            content: content.into(),
        }
    }
}

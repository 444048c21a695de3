// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for template and agent config loading

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced while loading or validating workflow configuration.
/// All of these refuse the workflow before the first step starts.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },

    #[error("prompt file not found: {0}")]
    MissingPromptFile(PathBuf),

    #[error("unknown agent id: {0}")]
    UnknownAgent(String),

    #[error("template validation failed: {0}")]
    Validation(String),
}

impl TemplateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TemplateError::Io {
            path: path.into(),
            source,
        }
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for state persistence

use std::path::PathBuf;
use thiserror::Error;

/// Errors from state file operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("queue already exhausted for step {step_index} (index {queue_index} of {queue_len})")]
    QueueExhausted {
        step_index: usize,
        queue_index: usize,
        queue_len: usize,
    },

    #[error("step {step_index} session already initialized with different values: {detail}")]
    SessionMismatch { step_index: usize, detail: String },

    #[error("log file for monitoring id {0} is locked by another process")]
    LogLocked(u64),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        StorageError::Json {
            path: path.into(),
            source,
        }
    }
}

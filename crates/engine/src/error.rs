// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the workflow engine

use thiserror::Error;

/// Errors that abort the workflow (configuration and plumbing). Runtime
/// child failures do not surface here; they become STEP_ERROR transitions.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Template(#[from] cm_template::TemplateError),

    #[error(transparent)]
    Storage(#[from] cm_storage::StorageError),

    #[error(transparent)]
    Adapter(#[from] cm_adapters::engine::EngineAdapterError),

    #[error("unknown engine: {0}")]
    UnknownEngine(String),

    #[error("{engine} is not authenticated; run `codemachine auth {engine}` first")]
    NotAuthenticated { engine: String },

    #[error("signal channel closed")]
    SignalChannelClosed,
}

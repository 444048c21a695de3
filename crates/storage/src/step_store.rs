// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step index manager: per-step persisted queue and session state.
//!
//! Exactly one `StepSession` exists per step index, in cache and on disk;
//! every mutation goes through this store and is written atomically before
//! returning. Only the runner loop writes, so concurrent writers cannot
//! occur.

use crate::atomic;
use crate::error::StorageError;
use crate::paths::StateLayout;
use cm_core::{Directive, MonitoringId, QueuedPrompt, SessionId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Persisted state of one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StepSession {
    #[serde(default)]
    pub queue: Vec<QueuedPrompt>,
    #[serde(default)]
    pub queue_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring_id: Option<MonitoringId>,
    #[serde(default)]
    pub directive: Directive,
    #[serde(default)]
    pub loop_iteration_count: u32,
    #[serde(default)]
    pub completed: bool,
    /// Template content hash recorded when an execute-once step completes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execute_once_hash: Option<String>,
}

impl StepSession {
    /// A step is queue-exhausted iff the index has reached the queue length.
    pub fn queue_exhausted(&self) -> bool {
        self.queue_index >= self.queue.len()
    }

    pub fn current_queued_prompt(&self) -> Option<&QueuedPrompt> {
        self.queue.get(self.queue_index)
    }
}

/// Store of step sessions, cache plus disk.
pub struct StepStore {
    layout: StateLayout,
    cache: Mutex<HashMap<usize, StepSession>>,
}

impl StepStore {
    pub fn new(layout: StateLayout) -> Self {
        Self {
            layout,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Load a step session, creating a fresh one (and its file) if missing.
    pub fn load_step(&self, index: usize) -> Result<StepSession, StorageError> {
        if let Some(session) = self.cache.lock().get(&index) {
            return Ok(session.clone());
        }

        let path = self.layout.step_file(index);
        let session = match atomic::read_json::<StepSession>(&path)? {
            Some(session) => session,
            None => {
                let fresh = StepSession::default();
                atomic::write_json(&path, &fresh)?;
                fresh
            }
        };
        self.cache.lock().insert(index, session.clone());
        Ok(session)
    }

    /// Replace the queue when the step first runs. The primary prompt is
    /// never enqueued; it travels separately through `run_step_fresh`.
    pub fn enqueue_prompts(
        &self,
        index: usize,
        prompts: Vec<QueuedPrompt>,
    ) -> Result<(), StorageError> {
        self.mutate(index, |session| {
            session.queue = prompts;
            session.queue_index = 0;
            Ok(())
        })
    }

    /// The prompt at the current queue position, if any.
    pub fn current_queued_prompt(
        &self,
        index: usize,
    ) -> Result<Option<QueuedPrompt>, StorageError> {
        Ok(self.load_step(index)?.current_queued_prompt().cloned())
    }

    /// Advance the queue position. Fails loudly when already past the end.
    pub fn advance_queue(&self, index: usize) -> Result<(), StorageError> {
        self.mutate(index, |session| {
            if session.queue_exhausted() {
                return Err(StorageError::QueueExhausted {
                    step_index: index,
                    queue_index: session.queue_index,
                    queue_len: session.queue.len(),
                });
            }
            session.queue_index += 1;
            Ok(())
        })
    }

    /// Persist the session identity assigned on first spawn. Idempotent for
    /// identical values; mismatched values are an error.
    pub fn step_session_initialized(
        &self,
        index: usize,
        session_id: SessionId,
        monitoring_id: MonitoringId,
    ) -> Result<(), StorageError> {
        self.mutate(index, |session| {
            match (&session.session_id, &session.monitoring_id) {
                (None, None) => {
                    session.session_id = Some(session_id.clone());
                    session.monitoring_id = Some(monitoring_id);
                    Ok(())
                }
                (Some(sid), Some(mid)) if *sid == session_id && *mid == monitoring_id => Ok(()),
                (sid, mid) => Err(StorageError::SessionMismatch {
                    step_index: index,
                    detail: format!(
                        "have ({:?}, {:?}), got ({}, {})",
                        sid, mid, session_id, monitoring_id
                    ),
                }),
            }
        })
    }

    /// Mark the step completed and reset its directive to `continue`.
    pub fn step_completed(&self, index: usize) -> Result<(), StorageError> {
        self.mutate(index, |session| {
            session.completed = true;
            session.directive = Directive::continue_();
            Ok(())
        })
    }

    /// Rewind the queue to the front (skip and loop paths).
    pub fn reset_queue(&self, index: usize) -> Result<(), StorageError> {
        self.mutate(index, |session| {
            session.queue_index = 0;
            Ok(())
        })
    }

    /// Clear session identity and completion so a looped-back step re-runs
    /// with a fresh engine conversation.
    pub fn reset_session(&self, index: usize) -> Result<(), StorageError> {
        self.mutate(index, |session| {
            session.session_id = None;
            session.monitoring_id = None;
            session.completed = false;
            Ok(())
        })
    }

    /// Overwrite the step's directive.
    pub fn set_directive(&self, index: usize, directive: Directive) -> Result<(), StorageError> {
        self.mutate(index, |session| {
            session.directive = directive;
            Ok(())
        })
    }

    /// Capture the session identity observed at pause time.
    pub fn capture_session(
        &self,
        index: usize,
        session_id: Option<SessionId>,
        monitoring_id: Option<MonitoringId>,
    ) -> Result<(), StorageError> {
        self.mutate(index, |session| {
            if session.session_id.is_none() {
                session.session_id = session_id.clone();
            }
            if session.monitoring_id.is_none() {
                session.monitoring_id = monitoring_id;
            }
            Ok(())
        })
    }

    /// Record the template hash alongside a completed execute-once step.
    pub fn record_execute_once(&self, index: usize, hash: &str) -> Result<(), StorageError> {
        self.mutate(index, |session| {
            session.execute_once_hash = Some(hash.to_string());
            Ok(())
        })
    }

    /// Bump and return the loop iteration counter.
    pub fn increment_loop_count(&self, index: usize) -> Result<u32, StorageError> {
        let mut count = 0;
        self.mutate(index, |session| {
            session.loop_iteration_count += 1;
            count = session.loop_iteration_count;
            Ok(())
        })?;
        Ok(count)
    }

    fn mutate(
        &self,
        index: usize,
        f: impl FnOnce(&mut StepSession) -> Result<(), StorageError>,
    ) -> Result<(), StorageError> {
        let mut session = self.load_step(index)?;
        f(&mut session)?;
        atomic::write_json(&self.layout.step_file(index), &session)?;
        self.cache.lock().insert(index, session);
        Ok(())
    }
}

#[cfg(test)]
#[path = "step_store_tests.rs"]
mod tests;

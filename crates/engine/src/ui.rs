// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! UI collaborator contract.
//!
//! The terminal renderer lives outside the engine; this trait is the
//! engine's entire view of it. The CLI installs a line-printing
//! implementation, tests install a recorder, and `TracingUi` serves
//! headless runs.

use cm_core::{MonitoringId, QueuedPrompt, TokenTelemetry, WorkflowState};

/// Sink for everything the engine wants rendered.
pub trait WorkflowUi: Send + Sync + 'static {
    /// Already-rendered agent output line (trailing newline included).
    fn agent_line(&self, monitoring_id: Option<MonitoringId>, chunk: &str);

    /// Normalized stderr chunk.
    fn agent_error_line(&self, monitoring_id: Option<MonitoringId>, chunk: &str);

    /// Accumulated token usage for the active child.
    fn telemetry(&self, usage: TokenTelemetry);

    fn state_changed(&self, state: WorkflowState);

    /// The input box opened with the queued prompts and current index.
    fn input_active(&self, queue: &[QueuedPrompt], queue_index: usize);

    /// Controller conversation view toggled.
    fn controller_view(&self, active: bool);

    /// Workflow-level error with a short reason.
    fn workflow_error(&self, reason: &str);
}

/// Headless implementation that logs through `tracing`.
#[derive(Default, Clone)]
pub struct TracingUi;

impl WorkflowUi for TracingUi {
    fn agent_line(&self, monitoring_id: Option<MonitoringId>, chunk: &str) {
        tracing::info!(?monitoring_id, chunk = chunk.trim_end(), "agent");
    }

    fn agent_error_line(&self, monitoring_id: Option<MonitoringId>, chunk: &str) {
        tracing::warn!(?monitoring_id, chunk = chunk.trim_end(), "agent stderr");
    }

    fn telemetry(&self, usage: TokenTelemetry) {
        tracing::debug!(
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "telemetry"
        );
    }

    fn state_changed(&self, state: WorkflowState) {
        tracing::info!(%state, "workflow state");
    }

    fn input_active(&self, queue: &[QueuedPrompt], queue_index: usize) {
        tracing::info!(queued = queue.len(), queue_index, "awaiting input");
    }

    fn controller_view(&self, active: bool) {
        tracing::info!(active, "controller view");
    }

    fn workflow_error(&self, reason: &str) {
        tracing::error!(reason, "workflow error");
    }
}

/// Recording implementation for tests.
#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
pub struct RecordingUi {
    pub events: parking_lot::Mutex<Vec<UiEvent>>,
}

#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    AgentLine(String),
    AgentErrorLine(String),
    Telemetry(TokenTelemetry),
    State(WorkflowState),
    InputActive { queued: usize, queue_index: usize },
    ControllerView(bool),
    WorkflowError(String),
}

#[cfg(any(test, feature = "test-support"))]
impl RecordingUi {
    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().clone()
    }

    pub fn states(&self) -> Vec<WorkflowState> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::State(s) => Some(s),
                _ => None,
            })
            .collect()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl WorkflowUi for RecordingUi {
    fn agent_line(&self, _monitoring_id: Option<MonitoringId>, chunk: &str) {
        self.events
            .lock()
            .push(UiEvent::AgentLine(chunk.to_string()));
    }

    fn agent_error_line(&self, _monitoring_id: Option<MonitoringId>, chunk: &str) {
        self.events
            .lock()
            .push(UiEvent::AgentErrorLine(chunk.to_string()));
    }

    fn telemetry(&self, usage: TokenTelemetry) {
        self.events.lock().push(UiEvent::Telemetry(usage));
    }

    fn state_changed(&self, state: WorkflowState) {
        self.events.lock().push(UiEvent::State(state));
    }

    fn input_active(&self, queue: &[QueuedPrompt], queue_index: usize) {
        self.events.lock().push(UiEvent::InputActive {
            queued: queue.len(),
            queue_index,
        });
    }

    fn controller_view(&self, active: bool) {
        self.events.lock().push(UiEvent::ControllerView(active));
    }

    fn workflow_error(&self, reason: &str) {
        self.events
            .lock()
            .push(UiEvent::WorkflowError(reason.to_string()));
    }
}

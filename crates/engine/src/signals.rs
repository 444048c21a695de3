// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signal manager.
//!
//! The sole translator from operator signals to FSM effects. Handlers are
//! idempotent with respect to the FSM: re-delivering a signal the machine
//! already absorbed is harmless because the machine drops it.

use crate::error::EngineError;
use crate::runner::WorkflowRunner;
use crate::ui::WorkflowUi;
use cm_adapters::runner::{run, RunOptions, RunnerError, RunnerUpdate};
use cm_adapters::RunRequest;
use cm_core::{
    AbortHandle, AutonomousMode, Signal, StepOutput, WorkflowEvent, WorkflowState,
    SWITCH_TO_AUTO, SWITCH_TO_MANUAL,
};
use std::sync::Arc;
use tokio::sync::mpsc;

/// What came out of one controller conversation turn besides its output.
#[derive(Default)]
struct TurnOutcome {
    /// Signal that cancelled the turn, if any.
    interrupting: Option<Signal>,
    /// Non-cancelling signals that arrived during the turn, in order.
    deferred: Vec<Signal>,
}

impl<U: WorkflowUi> WorkflowRunner<U> {
    /// Apply one operator signal.
    pub(crate) async fn apply_signal(
        &mut self,
        signals: &mut mpsc::Receiver<Signal>,
        signal: Signal,
    ) -> Result<(), EngineError> {
        let state = self.machine.state();
        tracing::debug!(signal = signal.name(), %state, "signal");

        match signal {
            Signal::Pause => self.on_pause(),
            Signal::Skip => self.on_skip(),
            Signal::Stop => {
                self.abort_step_child();
                self.machine.send(WorkflowEvent::Stop);
                self.notify_state();
                Ok(())
            }
            Signal::ReturnToController => {
                if matches!(
                    state,
                    WorkflowState::Running | WorkflowState::Awaiting | WorkflowState::Delegated
                ) {
                    self.controller_conversation(signals).await
                } else {
                    tracing::debug!(%state, "return-to-controller ignored");
                    Ok(())
                }
            }
            Signal::ModeChange { autonomous_mode } => {
                self.controller_store.set_autonomous_mode(autonomous_mode)?;
                Ok(())
            }
            Signal::Input { .. } | Signal::ControllerContinue => {
                // Only meaningful inside an input wait or conversation.
                tracing::debug!(signal = signal.name(), "dropped outside input context");
                Ok(())
            }
        }
    }

    fn on_pause(&mut self) -> Result<(), EngineError> {
        match self.machine.state() {
            WorkflowState::Running | WorkflowState::Delegated => {
                let was_auto = self.machine.context.auto_mode;
                self.capture_active_session()?;
                self.abort_step_child();
                self.machine.send(WorkflowEvent::Pause);
                if was_auto {
                    self.controller_store
                        .set_autonomous_mode(AutonomousMode::False)?;
                }
                self.notify_state();
            }
            _ => {
                tracing::debug!("pause is a no-op here");
            }
        }
        Ok(())
    }

    fn on_skip(&mut self) -> Result<(), EngineError> {
        match self.machine.state() {
            WorkflowState::Running | WorkflowState::Awaiting | WorkflowState::Delegated => {
                let outgoing = self.machine.context.current_step_index;
                self.abort_step_child();
                self.step_store.reset_queue(outgoing)?;
                self.machine.send(WorkflowEvent::Skip);
                self.notify_state();
            }
            _ => {}
        }
        Ok(())
    }

    /// Capture the active child's session identity into both the FSM
    /// context and the step session.
    pub(crate) fn capture_active_session(&mut self) -> Result<(), EngineError> {
        let index = self.machine.context.current_step_index;
        let Some(active) = self.active_child.as_ref() else {
            return Ok(());
        };
        let session_id = active.session_id.clone();
        let monitoring_id = active.monitoring_id;

        self.step_store
            .capture_session(index, session_id.clone(), Some(monitoring_id))?;

        let output = self
            .machine
            .context
            .current_output
            .get_or_insert_with(StepOutput::default);
        output.monitoring_id = Some(monitoring_id);
        if output.session_id.is_none() {
            output.session_id = session_id;
        }
        Ok(())
    }

    pub(crate) fn abort_step_child(&mut self) {
        if let Some(handle) = &self.step_abort {
            handle.abort();
        }
    }

    /// In-line conversation with the controller agent.
    ///
    /// Blocks autonomous re-entry (`autonomousMode = "never"`) for the
    /// duration, resumes the controller session for each operator message,
    /// and restores autonomous mode plus RESUME on an empty submission.
    /// Pause wins over the conversation: it ends it without re-arming
    /// autonomous mode.
    pub(crate) async fn controller_conversation(
        &mut self,
        signals: &mut mpsc::Receiver<Signal>,
    ) -> Result<(), EngineError> {
        self.controller_store
            .set_autonomous_mode(AutonomousMode::Never)?;
        self.capture_active_session()?;
        self.abort_step_child();
        self.ui.controller_view(true);

        // Signals arriving while a controller turn is running are replayed
        // here in arrival order.
        let mut pending: std::collections::VecDeque<Signal> = std::collections::VecDeque::new();
        loop {
            let signal = match pending.pop_front() {
                Some(signal) => signal,
                None => signals
                    .recv()
                    .await
                    .ok_or(EngineError::SignalChannelClosed)?,
            };

            match signal {
                Signal::Input {
                    prompt: Some(text),
                    skip: false,
                } if !text.is_empty() && text != SWITCH_TO_MANUAL && text != SWITCH_TO_AUTO => {
                    let turn = self.controller_turn(signals, &text).await?;
                    if let Some(interrupting) = turn.interrupting {
                        pending.push_back(interrupting);
                    }
                    pending.extend(turn.deferred);
                }
                Signal::Input { .. } | Signal::ControllerContinue => break,
                Signal::Stop => {
                    self.ui.controller_view(false);
                    self.machine.send(WorkflowEvent::Stop);
                    self.notify_state();
                    return Ok(());
                }
                // Pause wins over the conversation: end it without
                // re-arming autonomous mode.
                Signal::Pause => {
                    self.controller_store
                        .set_autonomous_mode(AutonomousMode::False)?;
                    self.ui.controller_view(false);
                    return Ok(());
                }
                Signal::ModeChange { autonomous_mode } => {
                    self.controller_store.set_autonomous_mode(autonomous_mode)?;
                }
                other => {
                    tracing::debug!(
                        signal = other.name(),
                        "ignored during controller conversation"
                    );
                }
            }
        }

        self.controller_store
            .set_autonomous_mode(AutonomousMode::True)?;
        self.ui.controller_view(false);
        self.machine.send(WorkflowEvent::Resume);
        self.notify_state();
        Ok(())
    }

    /// One operator message to the controller, resuming its saved session.
    ///
    /// A cancelling signal aborts the turn's child and comes back as
    /// `interrupting`; everything else that arrived meanwhile is returned
    /// in `deferred` for the conversation loop to replay.
    async fn controller_turn(
        &mut self,
        signals: &mut mpsc::Receiver<Signal>,
        text: &str,
    ) -> Result<TurnOutcome, EngineError> {
        let config = self.controller_store.load()?;
        let Some(controller) = config.controller_config else {
            tracing::warn!("no controller configured for conversation");
            return Ok(TurnOutcome::default());
        };
        let Some(adapter) = self.registry.get(&controller.engine) else {
            tracing::warn!(engine = %controller.engine, "controller engine missing");
            return Ok(TurnOutcome::default());
        };

        let request = RunRequest {
            prompt: text.to_string(),
            cwd: self.machine.context.cwd.clone(),
            model: controller.model.clone(),
            model_reasoning_effort: None,
            resume_session_id: controller.session_id.clone(),
            resume_prompt: controller
                .session_id
                .is_some()
                .then(|| text.to_string()),
        };

        let (abort_handle, abort_signal) = AbortHandle::new();

        let (updates_tx, mut updates_rx) = mpsc::channel(64);
        let mut options = RunOptions::new(Arc::clone(&adapter), request);
        options.updates = Some(updates_tx);
        options.abort = abort_signal;
        options.timeout = self.timeout;

        let mut outcome = TurnOutcome::default();
        let mut signals_open = true;
        let mut run_future = Box::pin(run(options));
        let result = loop {
            tokio::select! {
                result = &mut run_future => break result,
                Some(update) = updates_rx.recv() => {
                    self.forward_controller_update(controller.monitoring_id, update)?;
                }
                signal = signals.recv(), if signals_open && outcome.interrupting.is_none() => {
                    match signal {
                        Some(signal) => {
                            let cancels = match &signal {
                                Signal::Stop | Signal::Pause => true,
                                Signal::ModeChange { autonomous_mode } => {
                                    !autonomous_mode.is_auto()
                                }
                                _ => false,
                            };
                            if cancels {
                                abort_handle.abort();
                                outcome.interrupting = Some(signal);
                            } else {
                                outcome.deferred.push(signal);
                            }
                        }
                        None => signals_open = false,
                    }
                }
            }
        };
        while let Ok(update) = updates_rx.try_recv() {
            self.forward_controller_update(controller.monitoring_id, update)?;
        }

        match result {
            Ok(_) | Err(RunnerError::Aborted) => Ok(outcome),
            Err(e) => {
                tracing::warn!(error = %e, "controller turn failed");
                Ok(outcome)
            }
        }
    }

    fn forward_controller_update(
        &self,
        monitoring_id: Option<cm_core::MonitoringId>,
        update: RunnerUpdate,
    ) -> Result<(), EngineError> {
        match update {
            RunnerUpdate::Data { chunk } => self.ui.agent_line(monitoring_id, &chunk),
            RunnerUpdate::ErrorData { chunk } => self.ui.agent_error_line(monitoring_id, &chunk),
            RunnerUpdate::Telemetry { usage } => self.ui.telemetry(usage),
            RunnerUpdate::SessionId { session_id } => {
                self.controller_store
                    .set_controller_session(session_id, monitoring_id)?;
            }
        }
        Ok(())
    }
}

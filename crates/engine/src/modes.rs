// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mode handlers.
//!
//! Whenever the FSM is awaiting or delegated, the current flags classify
//! into one of eight scenarios and one of three handlers runs: interactive
//! waits on a provider, autonomous pumps the queue and consults the
//! controller, continuous processes directives with no input box.

use crate::directives::{next_index, process_directive, DirectiveOutcome};
use crate::error::EngineError;
use crate::providers::controller::{ControllerAction, ControllerProvider};
use crate::providers::user::{UserInputEvent, UserProvider};
use crate::runner::WorkflowRunner;
use crate::ui::WorkflowUi;
use cm_core::{
    AbortHandle, AutonomousMode, HandlerMode, InputOutcome, Scenario, ScenarioFlags, Signal,
    StepOutput, WorkflowEvent,
};
use tokio::sync::mpsc;

impl<U: WorkflowUi> WorkflowRunner<U> {
    /// Classify the current scenario and dispatch its handler.
    pub(crate) async fn handle_waiting(
        &mut self,
        signals: &mut mpsc::Receiver<Signal>,
    ) -> Result<(), EngineError> {
        let ctx = &self.machine.context;
        let flags = ScenarioFlags {
            auto_mode: ctx.auto_mode,
            paused: ctx.paused,
            noninteractive_step: ctx
                .current_step()
                .map(|s| s.interactive == Some(false))
                .unwrap_or(false),
        };
        let scenario = Scenario::classify(flags);
        tracing::debug!(%scenario, state = %self.machine.state(), "dispatching mode handler");

        match scenario.mode() {
            HandlerMode::Interactive => self.handle_interactive(signals).await,
            HandlerMode::Autonomous => self.handle_autonomous(signals, true).await,
            HandlerMode::Continuous => self.handle_autonomous(signals, false).await,
        }
    }

    /// Interactive: wait on the user provider and apply the action.
    async fn handle_interactive(
        &mut self,
        signals: &mut mpsc::Receiver<Signal>,
    ) -> Result<(), EngineError> {
        let index = self.machine.context.current_step_index;
        let session = self.step_store.load_step(index)?;

        let event = {
            let ui: &dyn WorkflowUi = &*self.ui;
            UserProvider::get_input(signals, ui, &session.queue, session.queue_index).await?
        };

        match event {
            UserInputEvent::Outcome(InputOutcome::Input { value, .. }) if value.is_empty() => {
                self.advance_after_directive(signals, true).await
            }
            UserInputEvent::Outcome(InputOutcome::Input { value, .. }) => {
                self.pending_resume = Some(value);
                self.machine.send(WorkflowEvent::Resume);
                self.notify_state();
                Ok(())
            }
            UserInputEvent::Outcome(InputOutcome::Skip) => self.skip_step(),
            UserInputEvent::Outcome(InputOutcome::Stop) => {
                self.machine.send(WorkflowEvent::Stop);
                self.notify_state();
                Ok(())
            }
            UserInputEvent::SwitchToAuto => {
                self.controller_store
                    .set_autonomous_mode(AutonomousMode::True)?;
                self.machine.send(WorkflowEvent::Delegate);
                self.notify_state();
                Ok(())
            }
            UserInputEvent::Bubbled(signal) => self.apply_signal(signals, signal).await,
        }
    }

    /// Autonomous (and continuous, with the controller consult disabled):
    /// pump queued prompts, then process the step's directive.
    async fn handle_autonomous(
        &mut self,
        signals: &mut mpsc::Receiver<Signal>,
        consult_controller: bool,
    ) -> Result<(), EngineError> {
        let index = self.machine.context.current_step_index;

        // Pop one queued prompt per pass; the main loop brings us back
        // here until the queue is exhausted.
        if let Some(prompt) = self.step_store.current_queued_prompt(index)? {
            self.send_queued_prompt(signals, index, prompt).await?;
            return Ok(());
        }

        self.maybe_run_trigger(signals, index).await?;
        if self.machine.is_final() || self.machine.state() == cm_core::WorkflowState::Running {
            return Ok(());
        }

        self.sync_mcp_directive(index)?;
        match process_directive(
            &self.step_store,
            &mut self.loops,
            &self.machine.context.steps,
            index,
        )? {
            DirectiveOutcome::Advance => {
                if consult_controller && self.controller_available()? {
                    self.consult_controller(signals, index).await
                } else {
                    self.complete_and_advance(index)
                }
            }
            DirectiveOutcome::Checkpoint => {
                tracing::info!(index, "checkpoint reached, pausing for the operator");
                self.pause_in_place();
                Ok(())
            }
            DirectiveOutcome::Stop { reason } => {
                if let Some(reason) = reason {
                    tracing::info!(index, reason, "stop directive");
                }
                self.machine.send(WorkflowEvent::Stop);
                self.notify_state();
                Ok(())
            }
            DirectiveOutcome::Pause { reason } => {
                if let Some(reason) = reason {
                    tracing::info!(index, reason, "pause directive");
                }
                self.pause_in_place();
                Ok(())
            }
            DirectiveOutcome::Loop { target_index } => self.loop_back_to(index, target_index),
        }
    }

    /// Pause whether delegated (listed transition) or already awaiting
    /// (the PAUSE event would be a no-op there; set the flags directly).
    fn pause_in_place(&mut self) {
        self.machine.send(WorkflowEvent::Pause);
        self.machine.context.paused = true;
        self.machine.context.auto_mode = false;
        self.notify_state();
    }

    /// Process the finished step's directive and advance on its say-so.
    /// `operator_confirmed` treats a checkpoint as already confirmed.
    pub(crate) async fn advance_after_directive(
        &mut self,
        signals: &mut mpsc::Receiver<Signal>,
        operator_confirmed: bool,
    ) -> Result<(), EngineError> {
        let index = self.machine.context.current_step_index;
        self.maybe_run_trigger(signals, index).await?;
        if self.machine.is_final() || self.machine.state() == cm_core::WorkflowState::Running {
            return Ok(());
        }

        self.sync_mcp_directive(index)?;
        match process_directive(
            &self.step_store,
            &mut self.loops,
            &self.machine.context.steps,
            index,
        )? {
            DirectiveOutcome::Advance => self.complete_and_advance(index),
            DirectiveOutcome::Checkpoint if operator_confirmed => {
                self.complete_and_advance(index)
            }
            DirectiveOutcome::Checkpoint => {
                self.pause_in_place();
                Ok(())
            }
            DirectiveOutcome::Stop { .. } => {
                self.machine.send(WorkflowEvent::Stop);
                self.notify_state();
                Ok(())
            }
            DirectiveOutcome::Pause { reason } => {
                if let Some(reason) = reason {
                    tracing::info!(index, reason, "pause directive");
                }
                self.pause_in_place();
                Ok(())
            }
            DirectiveOutcome::Loop { target_index } => self.loop_back_to(index, target_index),
        }
    }

    /// Pull a directive an agent set through the `workflow-signals`
    /// backend into the step session. The step store stays the only
    /// writer of `steps/*.json`; the MCP side only hands the record over.
    fn sync_mcp_directive(&mut self, index: usize) -> Result<(), EngineError> {
        let Some(step) = self.machine.context.steps.get(index) else {
            return Ok(());
        };
        if let Some(directive) = self.signals_handle.try_take_directive_for(&step.id) {
            tracing::info!(index, step_id = %step.id, action = %directive.action, "directive set via MCP");
            self.step_store.set_directive(index, directive)?;
        }
        Ok(())
    }

    /// Whether a controller can currently act as the operator.
    fn controller_available(&self) -> Result<bool, EngineError> {
        let config = self.controller_store.load()?;
        Ok(config.controller_config.is_some()
            && config.autonomous_mode != AutonomousMode::Never)
    }

    /// Hand the advance decision to the controller agent.
    async fn consult_controller(
        &mut self,
        signals: &mut mpsc::Receiver<Signal>,
        index: usize,
    ) -> Result<(), EngineError> {
        let output = self
            .machine
            .context
            .current_output
            .clone()
            .unwrap_or_else(|| StepOutput {
                text: "(no output captured)".to_string(),
                ..Default::default()
            });
        let session = self.step_store.load_step(index)?;
        let remaining = session.queue[session.queue_index.min(session.queue.len())..].to_vec();

        // The controller runs under its own abort scope so a mode change
        // can cancel it without touching the step.
        let (abort_handle, abort_signal) = AbortHandle::new();
        let mut deferred = Vec::new();

        let action = {
            let provider = ControllerProvider {
                registry: &self.registry,
                controller_store: &self.controller_store,
                signals_handle: &self.signals_handle,
                ui: &*self.ui,
                cwd: self.machine.context.cwd.clone(),
                abort: abort_signal,
                timeout: self.timeout,
            };
            let mut consultation = Box::pin(provider.get_input(&output, &remaining));
            let mut signals_open = true;
            loop {
                tokio::select! {
                    action = &mut consultation => break action?,
                    signal = signals.recv(), if signals_open => match signal {
                        Some(signal) => {
                            let cancels_controller = match &signal {
                                Signal::Stop | Signal::Pause => true,
                                Signal::ModeChange { autonomous_mode } => {
                                    !autonomous_mode.is_auto()
                                }
                                _ => false,
                            };
                            if cancels_controller {
                                abort_handle.abort();
                            }
                            deferred.push(signal);
                        }
                        None => signals_open = false,
                    }
                }
            }
        };

        // Signals observed during the consultation take effect now.
        for signal in deferred {
            self.apply_signal(signals, signal).await?;
        }
        if self.machine.is_final() {
            return Ok(());
        }

        match action {
            ControllerAction::Outcome(InputOutcome::Input { value, .. }) if value.is_empty() => {
                self.complete_and_advance(index)
            }
            ControllerAction::Outcome(InputOutcome::Input { value, .. }) => {
                self.pending_resume = Some(value);
                self.machine.loop_back(index);
                self.notify_state();
                Ok(())
            }
            ControllerAction::Outcome(InputOutcome::Skip) => self.skip_step(),
            ControllerAction::Outcome(InputOutcome::Stop) => {
                self.machine.send(WorkflowEvent::Stop);
                self.notify_state();
                Ok(())
            }
            ControllerAction::Stay { notes: Some(notes) } => {
                // Revision requested: feed the controller's notes back into
                // the step session.
                self.pending_resume = Some(notes);
                self.machine.loop_back(index);
                self.notify_state();
                Ok(())
            }
            ControllerAction::Stay { notes: None } => {
                // Nothing actionable; hand control to the operator.
                self.machine.send(WorkflowEvent::Await);
                self.notify_state();
                Ok(())
            }
            ControllerAction::SwitchToManual => {
                self.machine.send(WorkflowEvent::Await);
                self.notify_state();
                Ok(())
            }
            ControllerAction::Fallback => self.complete_and_advance(index),
        }
    }

    /// Mark the step completed and advance, honoring loop skip lists.
    pub(crate) fn complete_and_advance(&mut self, index: usize) -> Result<(), EngineError> {
        self.step_store.step_completed(index)?;
        if let Some(step) = self.machine.context.steps.get(index) {
            if step.execute_once {
                let hash = self.template_hash.clone();
                self.step_store.record_execute_once(index, &hash)?;
            }
        }
        self.loops.step_passed(index);
        self.signals_handle.set_current_step(None);

        match next_index(&self.loops, &self.machine.context.steps, index) {
            Some(next) => {
                // advance() moves one forward; pre-position for skips.
                self.machine.context.current_step_index = next - 1;
                self.machine.send(WorkflowEvent::InputReceived);
            }
            None => {
                // No executable step remains: complete.
                if self.machine.context.total_steps > 0 {
                    self.machine.context.current_step_index =
                        self.machine.context.total_steps - 1;
                }
                self.machine.send(WorkflowEvent::InputReceived);
            }
        }
        self.notify_state();
        Ok(())
    }

    /// Skip the current step: rewind its queue and advance.
    pub(crate) fn skip_step(&mut self) -> Result<(), EngineError> {
        let index = self.machine.context.current_step_index;
        self.step_store.reset_queue(index)?;
        self.machine.send(WorkflowEvent::Skip);
        self.notify_state();
        Ok(())
    }

    /// Re-enter an earlier step, resetting its queue and session.
    pub(crate) fn loop_back_to(&mut self, from: usize, target: usize) -> Result<(), EngineError> {
        tracing::info!(from, target, "looping back");
        self.step_store.reset_queue(target)?;
        self.step_store.reset_session(target)?;
        self.triggered_steps.remove(&target);
        self.machine.loop_back(target);
        self.notify_state();
        Ok(())
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step execution: the only code that spawns step children.
//!
//! `run_step_fresh` sends the primary prompt; queued and resume prompts go
//! through `send_queued_prompt` and `resume_with_input`. Prompt submissions
//! for a step are strictly serialized: the next child is not spawned until
//! the previous one exits.

use crate::error::EngineError;
use crate::runner::{ActiveChild, WorkflowRunner};
use crate::ui::WorkflowUi;
use cm_adapters::runner::{run, RunOptions, RunnerError, RunnerUpdate};
use cm_adapters::RunRequest;
use cm_core::{
    AbortHandle, ModuleStep, MonitoringId, SessionId, Signal, StepId, StepOutput, WorkflowEvent,
};
use cm_storage::{allocate_monitoring_id, ActiveServer, AgentLogWriter};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Prompt used when a paused session is resumed without operator text.
pub(crate) const CONTINUATION_PROMPT: &str = "Continue with the current task.";

/// How one child run ended, from the engine's point of view.
pub(crate) enum ChildResult {
    Completed(StepOutput),
    /// Cancelled by a signal handler which already owns the FSM effect.
    Aborted,
    Failed(String),
}

impl<U: WorkflowUi> WorkflowRunner<U> {
    /// Execute the current step from its primary prompt.
    pub(crate) async fn run_step_fresh(
        &mut self,
        signals: &mut mpsc::Receiver<Signal>,
    ) -> Result<(), EngineError> {
        let index = self.machine.context.current_step_index;
        let Some(step) = self.machine.context.current_step().cloned() else {
            self.machine.send(WorkflowEvent::StepError {
                message: format!("no step at index {index}"),
            });
            self.notify_state();
            return Ok(());
        };

        let session = self.step_store.load_step(index)?;

        // Execute-once steps completed under this template revision are
        // skipped with a fresh-run semantics left to the operator.
        if step.execute_once
            && session.completed
            && session.execute_once_hash.as_deref() == Some(self.template_hash.as_str())
        {
            tracing::info!(index, step_id = %step.id, "execute-once step already completed, skipping");
            self.machine.send(WorkflowEvent::Skip);
            self.notify_state();
            return Ok(());
        }

        // A completed step being visited again starts a fresh conversation.
        if session.completed {
            self.step_store.reset_session(index)?;
            self.step_store.reset_queue(index)?;
        }
        let session = self.step_store.load_step(index)?;

        // First run of this step: populate the queue from the agent config.
        if session.queue.is_empty() {
            if let Some(def) = self.agents.get(&step.agent_id) {
                let prompts = def.queued_prompts(
                    &self.machine.context.cwd,
                    &self.enabled_conditions,
                )?;
                if !prompts.is_empty() {
                    self.step_store.enqueue_prompts(index, prompts)?;
                }
            }
        }

        self.prepare_step_scope(&step)?;

        // A session captured at pause time is resumed; otherwise this is
        // the one place the primary prompt is sent.
        let resume_session = session.session_id.clone();
        let primary = resume_session.is_none();
        let prompt = if primary {
            cm_template::merge_prompt_files(&self.machine.context.cwd, &step.prompt_paths)?
        } else {
            CONTINUATION_PROMPT.to_string()
        };

        match self
            .run_step_child(signals, &step, prompt, resume_session, primary)
            .await?
        {
            ChildResult::Completed(output) => {
                self.machine
                    .send(WorkflowEvent::StepComplete { output });
                self.notify_state();
            }
            ChildResult::Aborted => {
                tracing::debug!(index, "primary run aborted by signal");
            }
            ChildResult::Failed(message) => {
                self.machine.send(WorkflowEvent::StepError { message });
                self.notify_state();
            }
        }
        Ok(())
    }

    /// Re-invoke the current step with operator text on the existing session.
    pub(crate) async fn resume_with_input(
        &mut self,
        signals: &mut mpsc::Receiver<Signal>,
        text: String,
    ) -> Result<(), EngineError> {
        let index = self.machine.context.current_step_index;
        let Some(step) = self.machine.context.current_step().cloned() else {
            return Ok(());
        };
        let session_id = self.step_store.load_step(index)?.session_id;

        match self
            .run_step_child(signals, &step, text, session_id, false)
            .await?
        {
            ChildResult::Completed(output) => {
                self.machine
                    .send(WorkflowEvent::StepComplete { output });
                self.notify_state();
            }
            ChildResult::Aborted => {}
            ChildResult::Failed(message) => {
                self.machine.send(WorkflowEvent::StepError { message });
                self.notify_state();
            }
        }
        Ok(())
    }

    /// Deliver the next queued prompt on the step's session. Returns true
    /// when the prompt ran to completion and the queue advanced.
    pub(crate) async fn send_queued_prompt(
        &mut self,
        signals: &mut mpsc::Receiver<Signal>,
        index: usize,
        prompt: cm_core::QueuedPrompt,
    ) -> Result<bool, EngineError> {
        let Some(step) = self.machine.context.steps.get(index).cloned() else {
            return Ok(false);
        };
        let session_id = self.step_store.load_step(index)?.session_id;

        match self
            .run_step_child(signals, &step, prompt.content, session_id, false)
            .await?
        {
            ChildResult::Completed(output) => {
                self.step_store.advance_queue(index)?;
                self.machine.context.current_output = Some(output);
                Ok(true)
            }
            ChildResult::Aborted => Ok(false),
            ChildResult::Failed(message) => {
                self.machine.send(WorkflowEvent::StepError { message });
                self.notify_state();
                Ok(false)
            }
        }
    }

    /// Run the trigger agent attached to a step, once per visit.
    pub(crate) async fn maybe_run_trigger(
        &mut self,
        signals: &mut mpsc::Receiver<Signal>,
        index: usize,
    ) -> Result<(), EngineError> {
        let Some(step) = self.machine.context.steps.get(index).cloned() else {
            return Ok(());
        };
        let Some(cm_core::ModuleBehavior::Trigger(trigger)) = step.behavior.clone() else {
            return Ok(());
        };
        if !self.triggered_steps.insert(index) {
            return Ok(());
        }

        let Some(def) = self.agents.get(&trigger.trigger_agent_id).cloned() else {
            tracing::warn!(agent = %trigger.trigger_agent_id, "trigger agent not found");
            return Ok(());
        };

        tracing::info!(index, agent = %def.id, "running trigger agent");
        let prompt = cm_template::merge_prompt_files(
            &self.machine.context.cwd,
            &def.prompt_path.as_vec(),
        )?;
        let mut trigger_step = ModuleStep::new(StepId::new(def.id.as_str()), def.id.clone());
        trigger_step.agent_name = def.name.clone();
        trigger_step.engine = def.engine.clone();
        trigger_step.model = def.model.clone();

        match self
            .run_step_child(signals, &trigger_step, prompt, None, false)
            .await?
        {
            ChildResult::Completed(_) | ChildResult::Aborted => Ok(()),
            ChildResult::Failed(message) => {
                self.machine.send(WorkflowEvent::StepError { message });
                self.notify_state();
                Ok(())
            }
        }
    }

    /// Write the Active Servers Record for a step and gate the signals
    /// backend on its step id.
    pub(crate) fn prepare_step_scope(&mut self, step: &ModuleStep) -> Result<(), EngineError> {
        let targets = if self.sub_agent_ids.is_empty() {
            None
        } else {
            Some(
                self.sub_agent_ids
                    .iter()
                    .map(|a| a.to_string())
                    .collect::<Vec<_>>(),
            )
        };

        let mut record = vec![
            ActiveServer::all(cm_mcp::signals::SERVER_ID),
            ActiveServer {
                server: cm_mcp::coordination::SERVER_ID.to_string(),
                tools: None,
                targets,
            },
        ];
        record.extend(self.external_servers.iter().cloned().map(ActiveServer::all));
        self.active_servers.write(&record)?;

        self.signals_handle.set_current_step(Some(step.id.clone()));
        Ok(())
    }

    /// Spawn one child and stream it to the UI and its log, servicing
    /// signals concurrently. `primary` runs persist the session identity.
    pub(crate) async fn run_step_child(
        &mut self,
        signals: &mut mpsc::Receiver<Signal>,
        step: &ModuleStep,
        prompt: String,
        resume_session_id: Option<SessionId>,
        primary: bool,
    ) -> Result<ChildResult, EngineError> {
        let index = self.machine.context.current_step_index;

        let Some(adapter) = self.registry.resolve(step.engine.as_deref()) else {
            return Ok(ChildResult::Failed(format!(
                "unknown engine: {}",
                step.engine.as_deref().unwrap_or("(default)")
            )));
        };

        let monitoring_id = MonitoringId(allocate_monitoring_id(&self.layout)?);
        let mut log = AgentLogWriter::open(&self.layout, monitoring_id.as_u64())?;
        log.append(&format!(
            "spawn agent={} engine={} resume={}",
            step.agent_name,
            adapter.metadata().id,
            resume_session_id.is_some()
        ))?;

        let request = RunRequest {
            prompt: prompt.clone(),
            cwd: self.machine.context.cwd.clone(),
            model: step.model.clone(),
            model_reasoning_effort: step.model_reasoning_effort.clone(),
            resume_session_id: resume_session_id.clone(),
            resume_prompt: resume_session_id.is_some().then_some(prompt),
        };

        let (abort_handle, abort_signal) = AbortHandle::new();
        self.step_abort = Some(abort_handle);
        self.active_child = Some(ActiveChild {
            monitoring_id,
            session_id: resume_session_id.clone(),
        });

        let (updates_tx, mut updates_rx) = mpsc::channel(256);
        let mut options = RunOptions::new(Arc::clone(&adapter), request);
        options.updates = Some(updates_tx);
        options.abort = abort_signal;
        options.timeout = self.timeout;

        let mut run_future = Box::pin(run(options));
        // A closed signal channel means "no operator": the child still
        // runs to completion.
        let mut signals_open = true;
        let outcome = loop {
            tokio::select! {
                result = &mut run_future => break result,
                Some(update) = updates_rx.recv() => {
                    self.forward_update(&mut log, index, monitoring_id, primary, update)?;
                }
                signal = signals.recv(), if signals_open => {
                    match signal {
                        Some(signal) => self.apply_signal(signals, signal).await?,
                        None => signals_open = false,
                    }
                }
            }
        };

        // Drain whatever the reader tasks flushed before exit.
        while let Ok(update) = updates_rx.try_recv() {
            self.forward_update(&mut log, index, monitoring_id, primary, update)?;
        }

        self.step_abort = None;
        let active = self.active_child.take();

        match outcome {
            Ok(output) => {
                log.append("agent completed")?;
                log.flush()?;
                Ok(ChildResult::Completed(StepOutput {
                    text: output.stdout,
                    monitoring_id: Some(monitoring_id),
                    session_id: output
                        .session_id
                        .or(active.and_then(|a| a.session_id)),
                }))
            }
            Err(RunnerError::Aborted) => {
                log.mark_aborted()?;
                Ok(ChildResult::Aborted)
            }
            Err(e) => {
                let message = e.to_string();
                log.append(&format!("agent failed: {message}"))?;
                log.flush()?;
                Ok(ChildResult::Failed(message))
            }
        }
    }

    fn forward_update(
        &mut self,
        log: &mut AgentLogWriter,
        index: usize,
        monitoring_id: MonitoringId,
        primary: bool,
        update: RunnerUpdate,
    ) -> Result<(), EngineError> {
        match update {
            RunnerUpdate::Data { chunk } => {
                log.append_raw(&chunk)?;
                self.ui.agent_line(Some(monitoring_id), &chunk);
            }
            RunnerUpdate::ErrorData { chunk } => {
                log.append_raw(&chunk)?;
                self.ui.agent_error_line(Some(monitoring_id), &chunk);
            }
            RunnerUpdate::Telemetry { usage } => {
                self.ui.telemetry(usage);
            }
            RunnerUpdate::SessionId { session_id } => {
                if primary {
                    self.step_store
                        .step_session_initialized(index, session_id.clone(), monitoring_id)?;
                }
                if let Some(active) = self.active_child.as_mut() {
                    active.session_id = Some(session_id);
                }
            }
        }
        Ok(())
    }
}

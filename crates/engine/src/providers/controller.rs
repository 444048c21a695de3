// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Controller input provider.
//!
//! Resumes the controller agent with the finished step's output and the
//! remaining queue, then parses the controller's answer with this
//! precedence: structured MCP decision, literal `ACTION:` marker, fallback
//! JSON `{"decision": ...}`, then tool-invoked-but-unparsed defaulting to
//! NEXT.

use crate::error::EngineError;
use crate::ui::WorkflowUi;
use cm_adapters::runner::{run, RunOptions, RunnerError, RunnerUpdate};
use cm_adapters::{EngineRegistry, RunRequest};
use cm_core::{AbortSignal, InputOutcome, InputSource, QueuedPrompt, StepOutput};
use cm_mcp::{ApprovalDecision, SignalsHandle};
use cm_storage::ControllerStore;
use regex::Regex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Result of one controller consultation.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerAction {
    Outcome(InputOutcome),
    /// Revision requested (or nothing parseable): stay in the step.
    Stay { notes: Option<String> },
    /// The controller run was externally aborted by a mode change.
    SwitchToManual,
    /// No usable controller configuration; fall back to the user provider.
    Fallback,
}

/// Action token parsed from controller output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedAction {
    Next,
    Skip,
    Stop,
    Revise,
}

pub struct ControllerProvider<'a> {
    pub registry: &'a EngineRegistry,
    pub controller_store: &'a ControllerStore,
    pub signals_handle: &'a SignalsHandle,
    pub ui: &'a dyn WorkflowUi,
    pub cwd: PathBuf,
    pub abort: AbortSignal,
    pub timeout: Duration,
}

impl ControllerProvider<'_> {
    /// Consult the controller about the step that just produced `output`.
    pub async fn get_input(
        &self,
        output: &StepOutput,
        remaining: &[QueuedPrompt],
    ) -> Result<ControllerAction, EngineError> {
        let config = self.controller_store.load()?;
        let Some(controller) = config.controller_config else {
            tracing::debug!("no controller configured, falling back to user input");
            return Ok(ControllerAction::Fallback);
        };
        let Some(adapter) = self.registry.get(&controller.engine) else {
            tracing::warn!(engine = %controller.engine, "controller engine not in registry");
            return Ok(ControllerAction::Fallback);
        };

        let prompt = compose_prompt(output, remaining);
        let request = RunRequest {
            prompt: prompt.clone(),
            cwd: self.cwd.clone(),
            model: controller.model.clone(),
            model_reasoning_effort: None,
            resume_session_id: controller.session_id.clone(),
            resume_prompt: controller.session_id.is_some().then_some(prompt),
        };

        let (updates_tx, mut updates_rx) = mpsc::channel(64);
        let monitoring_id = controller.monitoring_id;
        let mut options = RunOptions::new(Arc::clone(&adapter), request);
        options.updates = Some(updates_tx);
        options.abort = self.abort.clone();
        options.timeout = self.timeout;

        let mut run_future = Box::pin(run(options));
        let run_output = loop {
            tokio::select! {
                result = &mut run_future => break result,
                Some(update) = updates_rx.recv() => {
                    self.forward_update(monitoring_id, update)?;
                }
            }
        };
        // Updates flushed right before child exit are still in the channel.
        while let Ok(update) = updates_rx.try_recv() {
            self.forward_update(monitoring_id, update)?;
        }

        let run_output = match run_output {
            Ok(output) => output,
            Err(RunnerError::Aborted) => return Ok(ControllerAction::SwitchToManual),
            Err(e) => {
                tracing::warn!(error = %e, "controller run failed, falling back to user input");
                return Ok(ControllerAction::Fallback);
            }
        };

        // 1. Structured MCP decision wins.
        if let Some(approval) = self.signals_handle.try_take_decision().await {
            return Ok(match approval.decision {
                ApprovalDecision::Approve => {
                    ControllerAction::Outcome(InputOutcome::advance(InputSource::Controller))
                }
                ApprovalDecision::Reject => ControllerAction::Outcome(InputOutcome::Stop),
                ApprovalDecision::Revise => ControllerAction::Stay {
                    notes: approval.notes,
                },
            });
        }

        // 2-4. Text markers, fallback JSON, tool-invocation default.
        match parse_action(&run_output.stdout) {
            Some(ParsedAction::Next) => Ok(ControllerAction::Outcome(InputOutcome::advance(
                InputSource::Controller,
            ))),
            Some(ParsedAction::Skip) => Ok(ControllerAction::Outcome(InputOutcome::Skip)),
            Some(ParsedAction::Stop) => Ok(ControllerAction::Outcome(InputOutcome::Stop)),
            Some(ParsedAction::Revise) => Ok(ControllerAction::Stay { notes: None }),
            None => Ok(ControllerAction::Stay { notes: None }),
        }
    }

    fn forward_update(
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

/// Parse an action token from plain controller output (precedence rules
/// 2-4; rule 1 is the MCP decision channel).
pub fn parse_action(stdout: &str) -> Option<ParsedAction> {
    // 2. Literal markers anywhere in the output.
    #[allow(clippy::unwrap_used)]
    let marker = Regex::new(r"ACTION:\s*(NEXT|SKIP|STOP)").unwrap();
    if let Some(captures) = marker.captures(stdout) {
        return Some(match &captures[1] {
            "NEXT" => ParsedAction::Next,
            "SKIP" => ParsedAction::Skip,
            _ => ParsedAction::Stop,
        });
    }

    // 3. Fallback JSON: a line shaped {"decision": "approve|reject|revise"}.
    for line in stdout.lines() {
        let trimmed = line.trim();
        if !trimmed.starts_with('{') {
            continue;
        }
        let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) else {
            continue;
        };
        match value.get("decision").and_then(serde_json::Value::as_str) {
            Some("approve") => return Some(ParsedAction::Next),
            Some("reject") => return Some(ParsedAction::Stop),
            Some("revise") => return Some(ParsedAction::Revise),
            _ => {}
        }
    }

    // 4. The approval tool was invoked but nothing was parseable.
    if stdout.contains("approve_step_transition") {
        return Some(ParsedAction::Next);
    }

    None
}

/// The composed controller prompt: finished output, remaining queue, and
/// the action vocabulary.
fn compose_prompt(output: &StepOutput, remaining: &[QueuedPrompt]) -> String {
    let queue = if remaining.is_empty() {
        "(none)".to_string()
    } else {
        remaining
            .iter()
            .map(|p| format!("- {}", p.label))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "A workflow step has finished.\n\n\
         ## Step output\n{}\n\n\
         ## Remaining queued prompts\n{}\n\n\
         ## Available actions\n\
         Reply with `ACTION: NEXT` to advance, `ACTION: SKIP` to skip the \
         step, or `ACTION: STOP` to stop the workflow. Alternatively call \
         the `approve_step_transition` tool with decision approve, reject, \
         or revise.",
        output.text, queue
    )
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;

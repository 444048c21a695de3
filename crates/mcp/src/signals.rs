// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in `workflow-signals` backend.
//!
//! The structured alternative to the legacy text markers
//! `ACTION: NEXT|SKIP|STOP`: agents propose step completion and the
//! controller approves, rejects, or asks for revision. Decisions flow to
//! the engine over a channel; approval maps to NEXT, rejection to STOP,
//! revision stays in the step.

use crate::backend::ToolBackend;
use crate::protocol::{CallToolResult, Tool};
use crate::McpError;
use async_trait::async_trait;
use cm_core::{Directive, DirectiveAction, StepId};
use cm_storage::{atomic, StateLayout};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;

pub const SERVER_ID: &str = "workflow-signals";

/// Step gate record persisted under `mcp/step.json`. When the router runs
/// as its own process, this file is how the engine scopes proposals and
/// approvals to the active step.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StepGate {
    step_id: StepId,
}

fn step_gate_file(layout: &StateLayout) -> std::path::PathBuf {
    layout.mcp_dir().join("step.json")
}

fn decision_file(layout: &StateLayout) -> std::path::PathBuf {
    layout.mcp_dir().join("decision.json")
}

fn directive_file(layout: &StateLayout) -> std::path::PathBuf {
    layout.mcp_dir().join("directive.json")
}

/// A directive an agent set for a step, waiting for the engine to pick it
/// up. The engine is the sole writer of `steps/*.json`, so the record
/// travels through this side channel instead of the step session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectiveRecord {
    pub step_id: StepId,
    pub directive: Directive,
}

/// A pending completion proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub step_id: StepId,
    pub artifact_path: String,
    pub checklist: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_questions: Option<Vec<String>>,
    pub confidence: f64,
}

/// Decision kinds for `approve_step_transition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approve,
    Reject,
    Revise,
}

/// One resolved approval, delivered to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    pub step_id: StepId,
    pub decision: ApprovalDecision,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blockers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Engine-side handle: the current step gate, the pending proposal, and
/// the decision stream.
#[derive(Clone)]
pub struct SignalsHandle {
    current_step: Arc<Mutex<Option<StepId>>>,
    pending: Arc<Mutex<Option<Proposal>>>,
    decisions: Arc<tokio::sync::Mutex<mpsc::Receiver<Approval>>>,
    pending_directive: Arc<Mutex<Option<DirectiveRecord>>>,
    layout: Option<StateLayout>,
}

impl SignalsHandle {
    /// Set the step id that proposals and approvals must name. With a
    /// layout attached the gate is also persisted for out-of-process
    /// routers.
    pub fn set_current_step(&self, step_id: Option<StepId>) {
        if let Some(layout) = &self.layout {
            let path = step_gate_file(layout);
            let result = match &step_id {
                Some(step_id) => atomic::write_json(
                    &path,
                    &StepGate {
                        step_id: step_id.clone(),
                    },
                ),
                None => {
                    let _ = std::fs::remove_file(&path);
                    Ok(())
                }
            };
            if let Err(e) = result {
                tracing::warn!(error = %e, "failed to persist step gate");
            }
        }
        *self.current_step.lock() = step_id;
    }

    pub fn pending_proposal(&self) -> Option<Proposal> {
        self.pending.lock().clone()
    }

    /// Drain the most recent decision: the in-process channel first, then
    /// the decision file an out-of-process router may have written.
    pub async fn try_take_decision(&self) -> Option<Approval> {
        let mut latest = None;
        {
            let mut rx = self.decisions.lock().await;
            while let Ok(approval) = rx.try_recv() {
                latest = Some(approval);
            }
        }
        if latest.is_none() {
            if let Some(layout) = &self.layout {
                let path = decision_file(layout);
                if let Ok(Some(approval)) = atomic::read_json::<Approval>(&path) {
                    let _ = std::fs::remove_file(&path);
                    latest = Some(approval);
                }
            }
        }
        latest
    }

    /// Consume the pending directive when it names `step_id`. A directive
    /// for some other step stays put until that step's turn comes.
    pub fn try_take_directive_for(&self, step_id: &StepId) -> Option<Directive> {
        {
            let mut slot = self.pending_directive.lock();
            if slot.as_ref().map(|r| &r.step_id == step_id).unwrap_or(false) {
                return slot.take().map(|r| r.directive);
            }
        }
        if let Some(layout) = &self.layout {
            let path = directive_file(layout);
            if let Ok(Some(record)) = atomic::read_json::<DirectiveRecord>(&path) {
                if &record.step_id == step_id {
                    let _ = std::fs::remove_file(&path);
                    return Some(record.directive);
                }
            }
        }
        None
    }
}

/// The backend served to agents through the router.
pub struct WorkflowSignalsBackend {
    current_step: Arc<Mutex<Option<StepId>>>,
    pending: Arc<Mutex<Option<Proposal>>>,
    decisions_tx: mpsc::Sender<Approval>,
    pending_directive: Arc<Mutex<Option<DirectiveRecord>>>,
    layout: Option<StateLayout>,
}

impl WorkflowSignalsBackend {
    /// Build the backend plus its engine-side handle (in-process only).
    pub fn new() -> (Self, SignalsHandle) {
        Self::with_layout(None)
    }

    /// Build the backend with a state layout so the step gate and
    /// decisions also cross process boundaries.
    pub fn with_layout(layout: Option<StateLayout>) -> (Self, SignalsHandle) {
        let current_step = Arc::new(Mutex::new(None));
        let pending = Arc::new(Mutex::new(None));
        let pending_directive = Arc::new(Mutex::new(None));
        let (decisions_tx, decisions_rx) = mpsc::channel(16);
        let handle = SignalsHandle {
            current_step: Arc::clone(&current_step),
            pending: Arc::clone(&pending),
            decisions: Arc::new(tokio::sync::Mutex::new(decisions_rx)),
            pending_directive: Arc::clone(&pending_directive),
            layout: layout.clone(),
        };
        (
            Self {
                current_step,
                pending,
                decisions_tx,
                pending_directive,
                layout,
            },
            handle,
        )
    }

    /// The gate to validate against: the in-memory step, or the persisted
    /// one when this backend serves an out-of-process router.
    fn expected_step(&self) -> Option<StepId> {
        if let Some(step_id) = self.current_step.lock().clone() {
            return Some(step_id);
        }
        let layout = self.layout.as_ref()?;
        atomic::read_json::<StepGate>(&step_gate_file(layout))
            .ok()
            .flatten()
            .map(|gate| gate.step_id)
    }

    fn check_step_id(&self, step_id: &str) -> Result<(), CallToolResult> {
        match self.expected_step() {
            Some(expected) if expected.as_str() != step_id => Err(CallToolResult::error(format!(
                "wrong step_id: expected {expected}, got {step_id}"
            ))),
            _ => Ok(()),
        }
    }

    fn persist_decision(&self, approval: &Approval) {
        if let Some(layout) = &self.layout {
            if let Err(e) = atomic::write_json(&decision_file(layout), approval) {
                tracing::warn!(error = %e, "failed to persist decision");
            }
        }
    }

    fn store_directive(&self, record: DirectiveRecord) {
        if let Some(layout) = &self.layout {
            if let Err(e) = atomic::write_json(&directive_file(layout), &record) {
                tracing::warn!(error = %e, "failed to persist directive");
            }
        }
        *self.pending_directive.lock() = Some(record);
    }
}

fn require_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, CallToolResult> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| CallToolResult::error(format!("missing required argument: {key}")))
}

#[async_trait]
impl ToolBackend for WorkflowSignalsBackend {
    fn id(&self) -> &str {
        SERVER_ID
    }

    async fn tools(&self) -> Result<Vec<Tool>, McpError> {
        Ok(vec![
            Tool::new(
                "propose_step_completion",
                "Propose that the current step is complete and ready for review",
                json!({
                    "type": "object",
                    "properties": {
                        "step_id": {"type": "string"},
                        "artifact_path": {"type": "string"},
                        "checklist": {"type": "array", "items": {"type": "string"}},
                        "open_questions": {"type": "array", "items": {"type": "string"}},
                        "confidence": {"type": "number"}
                    },
                    "required": ["step_id", "artifact_path", "checklist", "confidence"]
                }),
            ),
            Tool::new(
                "approve_step_transition",
                "Approve, reject, or request revision of a proposed step completion",
                json!({
                    "type": "object",
                    "properties": {
                        "step_id": {"type": "string"},
                        "decision": {"type": "string", "enum": ["approve", "reject", "revise"]},
                        "blockers": {"type": "array", "items": {"type": "string"}},
                        "notes": {"type": "string"}
                    },
                    "required": ["step_id", "decision"]
                }),
            ),
            Tool::new(
                "get_pending_proposal",
                "Fetch the proposal currently awaiting a decision",
                json!({"type": "object", "properties": {}}),
            ),
            Tool::new(
                "set_step_directive",
                "Attach a directive to the current step telling the \
                 workflow what to do once the step finishes: continue, \
                 pause, loop back, or stop",
                json!({
                    "type": "object",
                    "properties": {
                        "step_id": {"type": "string"},
                        "action": {
                            "type": "string",
                            "enum": ["continue", "pause", "loop", "stop"]
                        },
                        "reason": {"type": "string"},
                        "target_step_id": {"type": "string"}
                    },
                    "required": ["step_id", "action"]
                }),
            ),
        ])
    }

    async fn call(&self, tool: &str, args: Value) -> Result<CallToolResult, McpError> {
        match tool {
            "propose_step_completion" => {
                let step_id = match require_str(&args, "step_id") {
                    Ok(s) => s,
                    Err(e) => return Ok(e),
                };
                if let Err(e) = self.check_step_id(step_id) {
                    return Ok(e);
                }
                let proposal = Proposal {
                    step_id: StepId::new(step_id),
                    artifact_path: match require_str(&args, "artifact_path") {
                        Ok(s) => s.to_string(),
                        Err(e) => return Ok(e),
                    },
                    checklist: args
                        .get("checklist")
                        .and_then(Value::as_array)
                        .map(|items| {
                            items
                                .iter()
                                .filter_map(Value::as_str)
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default(),
                    open_questions: args.get("open_questions").and_then(Value::as_array).map(
                        |items| {
                            items
                                .iter()
                                .filter_map(Value::as_str)
                                .map(str::to_string)
                                .collect()
                        },
                    ),
                    confidence: args
                        .get("confidence")
                        .and_then(Value::as_f64)
                        .unwrap_or(0.0),
                };
                *self.pending.lock() = Some(proposal);
                Ok(CallToolResult::text("proposal recorded, awaiting decision"))
            }

            "approve_step_transition" => {
                let step_id = match require_str(&args, "step_id") {
                    Ok(s) => s,
                    Err(e) => return Ok(e),
                };
                if let Err(e) = self.check_step_id(step_id) {
                    return Ok(e);
                }
                let decision = match require_str(&args, "decision") {
                    Ok("approve") => ApprovalDecision::Approve,
                    Ok("reject") => ApprovalDecision::Reject,
                    Ok("revise") => ApprovalDecision::Revise,
                    Ok(other) => {
                        return Ok(CallToolResult::error(format!(
                            "unknown decision: {other}"
                        )));
                    }
                    Err(e) => return Ok(e),
                };
                let approval = Approval {
                    step_id: StepId::new(step_id),
                    decision,
                    blockers: args
                        .get("blockers")
                        .and_then(Value::as_array)
                        .map(|items| {
                            items
                                .iter()
                                .filter_map(Value::as_str)
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default(),
                    notes: args
                        .get("notes")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                };

                // A resolved proposal is no longer pending unless revision
                // was requested.
                if decision != ApprovalDecision::Revise {
                    *self.pending.lock() = None;
                }
                self.persist_decision(&approval);
                let _ = self.decisions_tx.send(approval).await;
                Ok(CallToolResult::text(format!(
                    "decision recorded: {}",
                    match decision {
                        ApprovalDecision::Approve => "approve",
                        ApprovalDecision::Reject => "reject",
                        ApprovalDecision::Revise => "revise",
                    }
                )))
            }

            "get_pending_proposal" => {
                let pending = self.pending.lock().clone();
                match pending {
                    Some(proposal) => Ok(CallToolResult::text(
                        serde_json::to_string(&proposal).unwrap_or_default(),
                    )),
                    None => Ok(CallToolResult::text("no pending proposal")),
                }
            }

            "set_step_directive" => {
                let step_id = match require_str(&args, "step_id") {
                    Ok(s) => s,
                    Err(e) => return Ok(e),
                };
                if let Err(e) = self.check_step_id(step_id) {
                    return Ok(e);
                }
                let action = match require_str(&args, "action") {
                    Ok("continue") => DirectiveAction::Continue,
                    Ok("pause") => DirectiveAction::Pause,
                    Ok("loop") => DirectiveAction::Loop,
                    Ok("stop") => DirectiveAction::Stop,
                    Ok(other) => {
                        return Ok(CallToolResult::error(format!("unknown action: {other}")));
                    }
                    Err(e) => return Ok(e),
                };
                let directive = Directive {
                    action,
                    reason: args
                        .get("reason")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    target_step_id: args
                        .get("target_step_id")
                        .and_then(Value::as_str)
                        .map(StepId::new),
                };
                self.store_directive(DirectiveRecord {
                    step_id: StepId::new(step_id),
                    directive,
                });
                Ok(CallToolResult::text(format!(
                    "directive recorded: {action}"
                )))
            }

            other => Ok(CallToolResult::error(format!("unknown tool: {other}"))),
        }
    }
}

#[cfg(test)]
#[path = "signals_tests.rs"]
mod tests;

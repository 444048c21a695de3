// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow finite-state machine.
//!
//! The transition function is pure over `(state, context, event)`; all side
//! effects (spawning children, persisting sessions, UI updates) live in the
//! callers. Unlisted `(state, event)` pairs are no-ops that log. Final states
//! silently drop every further event.

use crate::context::{StepOutput, WorkflowContext};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Workflow execution states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Idle,
    Running,
    /// A step finished (or was paused) and the workflow waits for input.
    Awaiting,
    /// A step finished under auto mode; control is with the controller.
    Delegated,
    Completed,
    Stopped,
    Error,
}

impl WorkflowState {
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            WorkflowState::Completed | WorkflowState::Stopped | WorkflowState::Error
        )
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Running => "running",
            WorkflowState::Awaiting => "awaiting",
            WorkflowState::Delegated => "delegated",
            WorkflowState::Completed => "completed",
            WorkflowState::Stopped => "stopped",
            WorkflowState::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// Events driving FSM transitions.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    Start,
    StepComplete { output: StepOutput },
    StepError { message: String },
    InputReceived,
    Resume,
    Skip,
    Pause,
    Stop,
    Delegate,
    Await,
}

impl WorkflowEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowEvent::Start => "START",
            WorkflowEvent::StepComplete { .. } => "STEP_COMPLETE",
            WorkflowEvent::StepError { .. } => "STEP_ERROR",
            WorkflowEvent::InputReceived => "INPUT_RECEIVED",
            WorkflowEvent::Resume => "RESUME",
            WorkflowEvent::Skip => "SKIP",
            WorkflowEvent::Pause => "PAUSE",
            WorkflowEvent::Stop => "STOP",
            WorkflowEvent::Delegate => "DELEGATE",
            WorkflowEvent::Await => "AWAIT",
        }
    }
}

/// The workflow state machine: current state plus execution context.
#[derive(Debug, Clone)]
pub struct Machine {
    state: WorkflowState,
    pub context: WorkflowContext,
}

impl Machine {
    pub fn new(context: WorkflowContext) -> Self {
        Self {
            state: WorkflowState::Idle,
            context,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn is_final(&self) -> bool {
        self.state.is_final()
    }

    /// Mode-handler loop-back: re-enter `Running` at an earlier step.
    /// Loops are driven by directive processing, not by an FSM event; this
    /// is only meaningful while awaiting or delegated and is a no-op
    /// otherwise.
    pub fn loop_back(&mut self, target_index: usize) -> WorkflowState {
        if matches!(self.state, WorkflowState::Awaiting | WorkflowState::Delegated)
            && target_index < self.context.total_steps
        {
            tracing::debug!(target_index, "loop back");
            self.context.current_step_index = target_index;
            self.context.current_output = None;
            self.context.continuation_prompt_sent = false;
            self.state = WorkflowState::Running;
        }
        self.state
    }

    /// Apply one event. Returns the (possibly unchanged) resulting state.
    pub fn send(&mut self, event: WorkflowEvent) -> WorkflowState {
        let from = self.state;
        let to = transition(from, &mut self.context, event.clone());
        if to == from {
            tracing::debug!(state = %from, event = event.name(), "event was a no-op");
        } else {
            tracing::debug!(from = %from, to = %to, event = event.name(), "transition");
        }
        self.state = to;
        to
    }
}

/// Advance the step index, or complete when on the last step.
fn advance_or_complete(ctx: &mut WorkflowContext) -> WorkflowState {
    if ctx.is_last_step() {
        WorkflowState::Completed
    } else {
        ctx.advance();
        WorkflowState::Running
    }
}

/// Pure transition function. Mutates only the context, per the listed table.
pub fn transition(
    state: WorkflowState,
    ctx: &mut WorkflowContext,
    event: WorkflowEvent,
) -> WorkflowState {
    use WorkflowEvent as E;
    use WorkflowState as S;

    if state.is_final() {
        tracing::trace!(state = %state, event = event.name(), "dropped in final state");
        return state;
    }

    match (state, event) {
        (S::Idle, E::Start) => S::Running,

        (S::Running, E::StepComplete { output }) => {
            let delegation_allowed = ctx
                .current_step()
                .map(|s| s.delegation_allowed())
                .unwrap_or(true);
            ctx.current_output = Some(output);
            if ctx.auto_mode && !ctx.paused && delegation_allowed {
                ctx.continuation_prompt_sent = true;
                S::Delegated
            } else {
                S::Awaiting
            }
        }
        (S::Running, E::StepError { message }) => {
            ctx.last_error = Some(message);
            S::Error
        }
        (S::Running, E::Skip) => {
            ctx.continuation_prompt_sent = false;
            advance_or_complete(ctx)
        }
        (S::Running, E::Pause) => {
            ctx.auto_mode = false;
            ctx.paused = true;
            S::Awaiting
        }
        (S::Running, E::Stop) => S::Stopped,

        (S::Awaiting, E::Delegate) => {
            ctx.auto_mode = true;
            S::Delegated
        }
        (S::Awaiting, E::Resume) => S::Running,
        (S::Awaiting, E::InputReceived) => advance_or_complete(ctx),
        (S::Awaiting, E::Skip) => {
            ctx.continuation_prompt_sent = false;
            advance_or_complete(ctx)
        }
        (S::Awaiting, E::Stop) => S::Stopped,

        (S::Delegated, E::Await) => {
            ctx.auto_mode = false;
            ctx.continuation_prompt_sent = false;
            S::Awaiting
        }
        (S::Delegated, E::InputReceived) => {
            ctx.continuation_prompt_sent = false;
            advance_or_complete(ctx)
        }
        (S::Delegated, E::Pause) => {
            ctx.auto_mode = false;
            ctx.paused = true;
            ctx.continuation_prompt_sent = false;
            S::Awaiting
        }
        (S::Delegated, E::Skip) => {
            ctx.continuation_prompt_sent = false;
            advance_or_complete(ctx)
        }
        (S::Delegated, E::Stop) => S::Stopped,

        // Everything else is a logged no-op.
        (state, _) => state,
    }
}

#[cfg(test)]
#[path = "machine_tests.rs"]
mod tests;

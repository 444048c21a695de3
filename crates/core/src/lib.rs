// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cm-core: Core library for the CodeMachine workflow engine

pub mod abort;
pub mod agent_event;
pub mod clock;
pub mod context;
pub mod directive;
pub mod id;
pub mod input;
pub mod machine;
pub mod prompt;
pub mod scenario;
pub mod signal;
pub mod step;

pub use abort::{AbortHandle, AbortSignal};
pub use agent_event::{AgentEvent, TokenTelemetry};
pub use clock::{Clock, SystemClock};
pub use context::{StepOutput, WorkflowContext};
pub use directive::{Directive, DirectiveAction};
pub use id::{AgentId, IdGen, MonitoringId, SessionId, ShortId, StepId, UuidIdGen};
pub use input::{InputOutcome, InputSource};
pub use machine::{Machine, WorkflowEvent, WorkflowState};
pub use prompt::QueuedPrompt;
pub use scenario::{HandlerMode, Scenario, ScenarioFlags};
pub use signal::{AutonomousMode, Signal, SWITCH_TO_AUTO, SWITCH_TO_MANUAL};
pub use step::{LoopBehavior, ModuleBehavior, ModuleStep, TriggerBehavior};

#[cfg(any(test, feature = "test-support"))]
pub use clock::FakeClock;

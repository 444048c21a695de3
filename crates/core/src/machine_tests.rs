// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::step::ModuleStep;
use proptest::prelude::*;
use std::path::PathBuf;

fn ctx(n: usize) -> WorkflowContext {
    let steps = (0..n)
        .map(|i| ModuleStep::new(format!("s{i}"), format!("agent-{i}")))
        .collect();
    WorkflowContext::new(
        steps,
        PathBuf::from("/project"),
        PathBuf::from("/project/.codemachine"),
    )
}

fn output(text: &str) -> StepOutput {
    StepOutput {
        text: text.to_string(),
        ..Default::default()
    }
}

#[test]
fn start_transitions_idle_to_running() {
    let mut m = Machine::new(ctx(2));
    assert_eq!(m.state(), WorkflowState::Idle);
    assert_eq!(m.send(WorkflowEvent::Start), WorkflowState::Running);
}

#[test]
fn second_start_is_noop() {
    let mut m = Machine::new(ctx(2));
    m.send(WorkflowEvent::Start);
    assert_eq!(m.send(WorkflowEvent::Start), WorkflowState::Running);
    assert_eq!(m.context.current_step_index, 0);
}

#[test]
fn step_complete_awaits_in_manual_mode() {
    let mut m = Machine::new(ctx(2));
    m.send(WorkflowEvent::Start);
    let state = m.send(WorkflowEvent::StepComplete {
        output: output("done"),
    });
    assert_eq!(state, WorkflowState::Awaiting);
    assert_eq!(m.context.current_output.as_ref().unwrap().text, "done");
    assert!(!m.context.continuation_prompt_sent);
}

#[test]
fn step_complete_delegates_in_auto_mode() {
    let mut m = Machine::new(ctx(2));
    m.context.auto_mode = true;
    m.send(WorkflowEvent::Start);
    let state = m.send(WorkflowEvent::StepComplete {
        output: output("done"),
    });
    assert_eq!(state, WorkflowState::Delegated);
    assert!(m.context.continuation_prompt_sent);
}

#[test]
fn paused_auto_mode_awaits_instead_of_delegating() {
    let mut m = Machine::new(ctx(2));
    m.context.auto_mode = true;
    m.context.paused = true;
    m.send(WorkflowEvent::Start);
    let state = m.send(WorkflowEvent::StepComplete {
        output: output("done"),
    });
    assert_eq!(state, WorkflowState::Awaiting);
}

#[test]
fn noninteractive_step_blocks_delegation() {
    let mut m = Machine::new(ctx(2));
    m.context.steps[0].interactive = Some(false);
    m.context.auto_mode = true;
    m.send(WorkflowEvent::Start);
    let state = m.send(WorkflowEvent::StepComplete {
        output: output("done"),
    });
    assert_eq!(state, WorkflowState::Awaiting);
}

#[test]
fn step_error_is_fatal() {
    let mut m = Machine::new(ctx(2));
    m.send(WorkflowEvent::Start);
    let state = m.send(WorkflowEvent::StepError {
        message: "exit code 1".to_string(),
    });
    assert_eq!(state, WorkflowState::Error);
    assert_eq!(m.context.last_error.as_deref(), Some("exit code 1"));
    assert!(m.is_final());
}

#[test]
fn skip_advances_and_clears_continuation_flag() {
    let mut m = Machine::new(ctx(3));
    m.send(WorkflowEvent::Start);
    m.context.continuation_prompt_sent = true;
    assert_eq!(m.send(WorkflowEvent::Skip), WorkflowState::Running);
    assert_eq!(m.context.current_step_index, 1);
    assert!(!m.context.continuation_prompt_sent);
}

#[test]
fn skip_on_last_step_completes() {
    let mut m = Machine::new(ctx(1));
    m.send(WorkflowEvent::Start);
    assert_eq!(m.send(WorkflowEvent::Skip), WorkflowState::Completed);
}

#[test]
fn pause_disables_auto_mode() {
    let mut m = Machine::new(ctx(2));
    m.context.auto_mode = true;
    m.send(WorkflowEvent::Start);
    assert_eq!(m.send(WorkflowEvent::Pause), WorkflowState::Awaiting);
    assert!(!m.context.auto_mode);
    assert!(m.context.paused);
}

#[test]
fn pause_twice_same_observable_state() {
    let mut m = Machine::new(ctx(2));
    m.send(WorkflowEvent::Start);
    m.send(WorkflowEvent::Pause);
    let snapshot = (m.state(), m.context.clone());
    m.send(WorkflowEvent::Pause);
    assert_eq!((m.state(), m.context.clone()), snapshot);
}

#[test]
fn input_received_advances_from_awaiting() {
    let mut m = Machine::new(ctx(2));
    m.send(WorkflowEvent::Start);
    m.send(WorkflowEvent::StepComplete {
        output: output("a"),
    });
    assert_eq!(m.send(WorkflowEvent::InputReceived), WorkflowState::Running);
    assert_eq!(m.context.current_step_index, 1);
}

#[test]
fn input_received_on_last_step_completes() {
    let mut m = Machine::new(ctx(1));
    m.send(WorkflowEvent::Start);
    m.send(WorkflowEvent::StepComplete {
        output: output("a"),
    });
    assert_eq!(
        m.send(WorkflowEvent::InputReceived),
        WorkflowState::Completed
    );
}

#[test]
fn delegate_from_awaiting_enables_auto() {
    let mut m = Machine::new(ctx(2));
    m.send(WorkflowEvent::Start);
    m.send(WorkflowEvent::StepComplete {
        output: output("a"),
    });
    assert_eq!(m.send(WorkflowEvent::Delegate), WorkflowState::Delegated);
    assert!(m.context.auto_mode);
}

#[test]
fn await_from_delegated_disables_auto() {
    let mut m = Machine::new(ctx(2));
    m.context.auto_mode = true;
    m.send(WorkflowEvent::Start);
    m.send(WorkflowEvent::StepComplete {
        output: output("a"),
    });
    assert_eq!(m.state(), WorkflowState::Delegated);
    assert_eq!(m.send(WorkflowEvent::Await), WorkflowState::Awaiting);
    assert!(!m.context.auto_mode);
    assert!(!m.context.continuation_prompt_sent);
}

#[test]
fn delegated_input_received_advances_and_clears_flag() {
    let mut m = Machine::new(ctx(3));
    m.context.auto_mode = true;
    m.send(WorkflowEvent::Start);
    m.send(WorkflowEvent::StepComplete {
        output: output("a"),
    });
    assert_eq!(m.send(WorkflowEvent::InputReceived), WorkflowState::Running);
    assert_eq!(m.context.current_step_index, 1);
    assert!(!m.context.continuation_prompt_sent);
}

#[test]
fn delegated_pause_captures_and_awaits() {
    let mut m = Machine::new(ctx(2));
    m.context.auto_mode = true;
    m.send(WorkflowEvent::Start);
    m.send(WorkflowEvent::StepComplete {
        output: output("a"),
    });
    assert_eq!(m.send(WorkflowEvent::Pause), WorkflowState::Awaiting);
    assert!(!m.context.auto_mode);
    assert!(m.context.paused);
    assert!(!m.context.continuation_prompt_sent);
}

#[test]
fn stop_from_any_active_state() {
    for setup in [
        vec![WorkflowEvent::Start],
        vec![
            WorkflowEvent::Start,
            WorkflowEvent::StepComplete {
                output: output("a"),
            },
        ],
    ] {
        let mut m = Machine::new(ctx(2));
        for e in setup {
            m.send(e);
        }
        assert_eq!(m.send(WorkflowEvent::Stop), WorkflowState::Stopped);
    }
}

#[test]
fn resume_returns_to_running() {
    let mut m = Machine::new(ctx(2));
    m.send(WorkflowEvent::Start);
    m.send(WorkflowEvent::Pause);
    assert_eq!(m.send(WorkflowEvent::Resume), WorkflowState::Running);
}

#[test]
fn unlisted_pairs_are_noops() {
    let mut m = Machine::new(ctx(2));
    // InputReceived in idle
    assert_eq!(m.send(WorkflowEvent::InputReceived), WorkflowState::Idle);
    m.send(WorkflowEvent::Start);
    // Resume in running
    assert_eq!(m.send(WorkflowEvent::Resume), WorkflowState::Running);
    // Delegate in running
    assert_eq!(m.send(WorkflowEvent::Delegate), WorkflowState::Running);
}

fn arb_event() -> impl Strategy<Value = WorkflowEvent> {
    prop_oneof![
        Just(WorkflowEvent::Start),
        Just(WorkflowEvent::StepComplete {
            output: StepOutput::default()
        }),
        Just(WorkflowEvent::StepError {
            message: "e".to_string()
        }),
        Just(WorkflowEvent::InputReceived),
        Just(WorkflowEvent::Resume),
        Just(WorkflowEvent::Skip),
        Just(WorkflowEvent::Pause),
        Just(WorkflowEvent::Stop),
        Just(WorkflowEvent::Delegate),
        Just(WorkflowEvent::Await),
    ]
}

proptest! {
    // Once final, the machine never leaves its final state.
    #[test]
    fn final_states_absorb_all_events(events in proptest::collection::vec(arb_event(), 0..64)) {
        let mut m = Machine::new(ctx(3));
        let mut final_state = None;
        for event in events {
            let state = m.send(event);
            if let Some(f) = final_state {
                prop_assert_eq!(state, f);
            } else if state.is_final() {
                final_state = Some(state);
            }
        }
    }

    // The step index never exceeds the step count.
    #[test]
    fn index_stays_in_bounds(events in proptest::collection::vec(arb_event(), 0..64)) {
        let mut m = Machine::new(ctx(3));
        for event in events {
            m.send(event);
            prop_assert!(m.context.current_step_index < 3 || m.is_final());
        }
    }
}

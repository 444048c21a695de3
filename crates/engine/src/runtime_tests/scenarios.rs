// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario coverage: manual advance, autonomous chained prompts, loops,
//! controller decisions, execute-once.

use super::*;
use cm_core::{AgentId, SessionId};

#[tokio::test]
async fn happy_manual_advance() {
    let f = Fixture::new();
    let config = f.config(vec![f.step("s0"), f.step("s1")]);
    let runner = f.runner(config);
    let (tx, rx) = mpsc::channel(16);

    let ui = Arc::clone(&f.ui);
    let (runner, state) = drive(runner, tx.clone(), rx, move |tx| async move {
        // Operator submits empty input after each step completes.
        for n in 1..=2 {
            for _ in 0..500 {
                let count = ui
                    .events()
                    .iter()
                    .filter(|e| matches!(e, UiEvent::InputActive { .. }))
                    .count();
                if count >= n {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            tx.send(Signal::Input {
                prompt: None,
                skip: false,
            })
            .await
            .unwrap();
        }
    })
    .await;

    assert_eq!(state, WorkflowState::Completed);
    assert_eq!(runner.context().current_step_index, 1);

    // Both steps ran exactly one child, fresh sessions each.
    let requests = f.fake.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.resume_session_id.is_none()));

    let s0 = step_session_on_disk(f.dir.path(), 0);
    assert!(s0.completed);
    assert_eq!(s0.session_id, Some(SessionId::new("fake-session-1")));
    let s1 = step_session_on_disk(f.dir.path(), 1);
    assert!(s1.completed);

    // FSM visited running -> awaiting -> running -> ... -> completed.
    let states = f.ui.states();
    assert!(states.contains(&WorkflowState::Running));
    assert!(states.contains(&WorkflowState::Awaiting));
    assert_eq!(states.last(), Some(&WorkflowState::Completed));
}

#[tokio::test]
async fn autonomous_with_chained_prompts() {
    let f = Fixture::new();
    let agent = f.agent_with_chained("s0", &[("s0-a", "do A"), ("s0-b", "do B")]);
    let mut config = f.config(vec![f.step("s0"), f.step("s1")]);
    config.agents = AgentRegistry::from_defs(vec![agent]);
    config.auto_mode = true;

    let runner = f.runner(config);
    let (tx, rx) = mpsc::channel(16);
    let (_runner, state) = drive(runner, tx, rx, |_tx| async {}).await;

    assert_eq!(state, WorkflowState::Completed);

    // Four spawns: s0 primary, two resumes on the captured session, s1.
    let requests = f.fake.requests();
    assert_eq!(requests.len(), 4);
    assert!(requests[0].resume_session_id.is_none());
    assert_eq!(
        requests[1].resume_session_id,
        Some(SessionId::new("fake-session-1"))
    );
    assert_eq!(requests[1].effective_prompt(), "do A");
    assert_eq!(requests[2].effective_prompt(), "do B");
    assert!(requests[3].resume_session_id.is_none());

    let s0 = step_session_on_disk(f.dir.path(), 0);
    assert_eq!(s0.queue_index, 2);
    assert!(s0.completed);
}

#[tokio::test]
async fn loop_back_reruns_earlier_step() {
    let f = Fixture::new();
    let mut s1 = f.step("s1");
    s1.behavior = Some(cm_core::ModuleBehavior::Loop(cm_core::LoopBehavior {
        steps: 1,
        max_iterations: Some(2),
        skip: Vec::new(),
    }));
    let mut config = f.config(vec![f.step("s0"), s1]);
    config.auto_mode = true;

    let runner = f.runner(config);
    // The agent sets the loop directive through the workflow-signals tool.
    f.backend
        .call(
            "set_step_directive",
            serde_json::json!({"step_id": "s1", "action": "loop"}),
        )
        .await
        .unwrap();

    let (tx, rx) = mpsc::channel(16);
    let (_runner, state) = drive(runner, tx, rx, |_tx| async {}).await;

    assert_eq!(state, WorkflowState::Completed);

    // s0, s1, loop back, s0 again, s1 again, then advance.
    assert_eq!(f.fake.requests().len(), 4);

    let s1 = step_session_on_disk(f.dir.path(), 1);
    assert_eq!(s1.loop_iteration_count, 2);
    assert!(s1.completed);
}

#[tokio::test]
async fn controller_approval_advances() {
    let f = Fixture::with_script("echo 'ACTION: NEXT'");
    let mut config = f.config(vec![f.step("s0")]);
    config.auto_mode = true;
    config.controller = Some(ControllerSpec {
        agent_id: AgentId::new("controller"),
        engine: "fake".into(),
        model: None,
    });

    let runner = f.runner(config);
    let (tx, rx) = mpsc::channel(16);
    let (_runner, state) = drive(runner, tx, rx, |_tx| async {}).await;

    assert_eq!(state, WorkflowState::Completed);
    // One step child plus one controller consultation.
    assert_eq!(f.fake.requests().len(), 2);
}

#[tokio::test]
async fn controller_rejection_stops() {
    let f = Fixture::with_script("echo '{\"decision\":\"reject\"}'");
    let mut config = f.config(vec![f.step("s0"), f.step("s1")]);
    config.auto_mode = true;
    config.controller = Some(ControllerSpec {
        agent_id: AgentId::new("controller"),
        engine: "fake".into(),
        model: None,
    });

    let runner = f.runner(config);
    let (tx, rx) = mpsc::channel(16);
    let (_runner, state) = drive(runner, tx, rx, |_tx| async {}).await;

    assert_eq!(state, WorkflowState::Stopped);
    // s1 never ran.
    assert_eq!(f.fake.requests().len(), 2);
}

#[tokio::test]
async fn controller_mcp_decision_beats_text_output() {
    // Controller output alone would stop the workflow; the structured MCP
    // approval takes precedence and advances instead.
    let f = Fixture::with_script("echo 'ACTION: STOP'");
    f.backend
        .call(
            "approve_step_transition",
            serde_json::json!({"step_id": "s0", "decision": "approve"}),
        )
        .await
        .unwrap();

    let mut config = f.config(vec![f.step("s0")]);
    config.auto_mode = true;
    config.controller = Some(ControllerSpec {
        agent_id: AgentId::new("controller"),
        engine: "fake".into(),
        model: None,
    });

    let runner = f.runner(config);
    let (tx, rx) = mpsc::channel(16);
    let (_runner, state) = drive(runner, tx, rx, |_tx| async {}).await;
    assert_eq!(state, WorkflowState::Completed);
}

#[tokio::test]
async fn execute_once_step_skipped_on_second_run() {
    let f = Fixture::new();
    let mut s0 = f.step("s0");
    s0.execute_once = true;
    let steps = vec![s0.clone(), f.step("s1")];

    let mut config = f.config(steps.clone());
    config.auto_mode = true;
    let runner = f.runner(config);
    let (tx, rx) = mpsc::channel(16);
    let (_runner, state) = drive(runner, tx, rx, |_tx| async {}).await;
    assert_eq!(state, WorkflowState::Completed);
    assert_eq!(f.fake.requests().len(), 2);

    let s0_session = step_session_on_disk(f.dir.path(), 0);
    assert_eq!(s0_session.execute_once_hash.as_deref(), Some("hash-1"));

    // Second run of the same template revision: s0 is skipped.
    let mut config = f.config(steps);
    config.auto_mode = true;
    let runner = f.runner(config);
    let (tx, rx) = mpsc::channel(16);
    let (_runner, state) = drive(runner, tx, rx, |_tx| async {}).await;
    assert_eq!(state, WorkflowState::Completed);
    assert_eq!(f.fake.requests().len(), 3, "only s1 ran again");
}

#[tokio::test]
async fn noninteractive_steps_run_continuous() {
    let f = Fixture::new();
    let mut s0 = f.step("s0");
    s0.interactive = Some(false);
    let mut s1 = f.step("s1");
    s1.interactive = Some(false);
    let mut config = f.config(vec![s0, s1]);
    config.auto_mode = true;
    // A controller is configured but scenario 6 must not consult it.
    config.controller = Some(ControllerSpec {
        agent_id: AgentId::new("controller"),
        engine: "fake".into(),
        model: None,
    });

    let runner = f.runner(config);
    let (tx, rx) = mpsc::channel(16);
    let (_runner, state) = drive(runner, tx, rx, |_tx| async {}).await;

    assert_eq!(state, WorkflowState::Completed);
    // Two step children, zero controller consultations.
    assert_eq!(f.fake.requests().len(), 2);
    assert!(!f
        .ui
        .events()
        .iter()
        .any(|e| matches!(e, UiEvent::ControllerView(_))));
}

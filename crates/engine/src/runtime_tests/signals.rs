// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signal handling and failure-path scenarios.

use super::*;
use cm_core::SessionId;

/// Script that announces its session then works for a long time.
fn slow_script() -> String {
    format!(
        "{}; sleep 30",
        FakeEngineAdapter::script_emitting(&[r#"{"fake":"session","id":"fake-session-1"}"#])
    )
}

#[tokio::test]
async fn pause_aborts_child_and_captures_session() {
    let f = Fixture::with_script(&slow_script());
    let config = f.config(vec![f.step("s0"), f.step("s1")]);
    let runner = f.runner(config);
    let (tx, rx) = mpsc::channel(16);

    let ui = Arc::clone(&f.ui);
    let started = std::time::Instant::now();
    let (_runner, state) = drive(runner, tx.clone(), rx, move |tx| async move {
        // Wait for the child to announce its session, then pause.
        for _ in 0..500 {
            if ui
                .events()
                .iter()
                .any(|e| matches!(e, UiEvent::AgentLine(_)) || matches!(e, UiEvent::State(WorkflowState::Running)))
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send(Signal::Pause).await.unwrap();

        // Paused and awaiting: stop to end the test.
        for _ in 0..500 {
            if ui.states().contains(&WorkflowState::Awaiting) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tx.send(Signal::Stop).await.unwrap();
    })
    .await;

    assert_eq!(state, WorkflowState::Stopped);
    // The child did not run its full 30 seconds.
    assert!(started.elapsed() < Duration::from_secs(25));

    // Session captured into the step session at pause time.
    let s0 = step_session_on_disk(f.dir.path(), 0);
    assert_eq!(s0.session_id, Some(SessionId::new("fake-session-1")));
    assert!(s0.monitoring_id.is_some());
    assert!(!s0.completed);
}

#[tokio::test]
async fn post_pause_resume_reuses_captured_session() {
    // First run announces its session then works long enough to be paused;
    // the resumed child must be spawned on that same session.
    let f = Fixture::with_script(&format!(
        "{}; sleep 2",
        FakeEngineAdapter::script_emitting(&[r#"{"fake":"session","id":"fake-session-1"}"#])
    ));
    let config = f.config(vec![f.step("s0")]);
    let runner = f.runner(config);
    let (tx, rx) = mpsc::channel(16);

    let ui = Arc::clone(&f.ui);
    let (_runner, state) = drive(runner, tx.clone(), rx, move |tx| async move {
        for _ in 0..500 {
            if ui.states().contains(&WorkflowState::Running) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
        tx.send(Signal::Pause).await.unwrap();

        for _ in 0..500 {
            if ui.states().contains(&WorkflowState::Awaiting) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        // Operator text resumes the step on the captured session.
        tx.send(Signal::Input {
            prompt: Some("keep going".into()),
            skip: false,
        })
        .await
        .unwrap();

        // The resumed child finishes; stop at the next input wait.
        for _ in 0..500 {
            let inputs = ui
                .events()
                .iter()
                .filter(|e| matches!(e, UiEvent::InputActive { .. }))
                .count();
            if inputs >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tx.send(Signal::Stop).await.unwrap();
    })
    .await;

    assert_eq!(state, WorkflowState::Stopped);
    let requests = f.fake.requests();
    assert!(requests.len() >= 2);
    assert!(requests[0].resume_session_id.is_none());
    assert_eq!(
        requests[1].resume_session_id,
        Some(SessionId::new("fake-session-1"))
    );
    assert_eq!(requests[1].effective_prompt(), "keep going");

    // The captured session equals what the post-RESUME spawn received.
    let s0 = step_session_on_disk(f.dir.path(), 0);
    assert_eq!(s0.session_id, requests[1].resume_session_id);
}

#[tokio::test]
async fn return_to_controller_conversation_round_trip() {
    let f = Fixture::new();
    let mut config = f.config(vec![f.step("s0")]);
    config.controller = Some(cm_template::ControllerSpec {
        agent_id: cm_core::AgentId::new("controller"),
        engine: "fake".into(),
        model: None,
    });
    let runner = f.runner(config);
    let (tx, rx) = mpsc::channel(16);

    let ui = Arc::clone(&f.ui);
    let (runner, state) = drive(runner, tx.clone(), rx, move |tx| async move {
        // Step finishes, workflow awaits input.
        for _ in 0..500 {
            if ui
                .events()
                .iter()
                .any(|e| matches!(e, UiEvent::InputActive { .. }))
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tx.send(Signal::ReturnToController).await.unwrap();

        for _ in 0..500 {
            if ui.events().contains(&UiEvent::ControllerView(true)) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        // One operator message to the controller, then an empty submission
        // to end the conversation and resume.
        tx.send(Signal::Input {
            prompt: Some("status report please".into()),
            skip: false,
        })
        .await
        .unwrap();
        tx.send(Signal::Input {
            prompt: None,
            skip: false,
        })
        .await
        .unwrap();

        // The resumed step completes again; advance to finish.
        for _ in 0..500 {
            let inputs = ui
                .events()
                .iter()
                .filter(|e| matches!(e, UiEvent::InputActive { .. }))
                .count();
            if inputs >= 2 {
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
    })
    .await;

    assert_eq!(state, WorkflowState::Completed);

    // Conversation view toggled on and back off.
    let events = f.ui.events();
    assert!(events.contains(&UiEvent::ControllerView(true)));
    assert!(events.contains(&UiEvent::ControllerView(false)));

    // Autonomous mode was restored to "true" when the conversation ended.
    let persisted = runner.controller_store.load().unwrap();
    assert_eq!(persisted.autonomous_mode, cm_core::AutonomousMode::True);

    // Step child, controller turn, resumed step child.
    let requests = f.fake.requests();
    assert!(requests.len() >= 3);
    assert_eq!(requests[1].prompt, "status report please");
    assert!(requests[2].resume_session_id.is_some());
}

#[tokio::test]
async fn skip_signal_advances_past_running_step() {
    let f = Fixture::with_script(&slow_script());
    let config = f.config(vec![f.step("s0")]);
    let runner = f.runner(config);
    let (tx, rx) = mpsc::channel(16);

    let ui = Arc::clone(&f.ui);
    let (_runner, state) = drive(runner, tx.clone(), rx, move |tx| async move {
        for _ in 0..500 {
            if ui.states().contains(&WorkflowState::Running) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send(Signal::Skip).await.unwrap();
    })
    .await;

    // Only step of the workflow skipped: completed.
    assert_eq!(state, WorkflowState::Completed);
    assert_eq!(f.fake.requests().len(), 1);
}

#[tokio::test]
async fn stop_signal_is_final() {
    let f = Fixture::with_script(&slow_script());
    let config = f.config(vec![f.step("s0"), f.step("s1")]);
    let runner = f.runner(config);
    let (tx, rx) = mpsc::channel(16);

    let ui = Arc::clone(&f.ui);
    let (_runner, state) = drive(runner, tx.clone(), rx, move |tx| async move {
        for _ in 0..500 {
            if ui.states().contains(&WorkflowState::Running) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(Signal::Stop).await.unwrap();
    })
    .await;

    assert_eq!(state, WorkflowState::Stopped);
    assert_eq!(f.fake.requests().len(), 1);
}

#[tokio::test]
async fn child_failure_is_fatal() {
    let f = Fixture::with_script("echo 'engine blew up' >&2; exit 7");
    let config = f.config(vec![f.step("s0"), f.step("s1")]);
    let runner = f.runner(config);
    let (tx, rx) = mpsc::channel(16);
    let (runner, state) = drive(runner, tx, rx, |_tx| async {}).await;

    assert_eq!(state, WorkflowState::Error);
    assert!(runner
        .context()
        .last_error
        .as_deref()
        .unwrap()
        .contains("engine blew up"));
    assert!(f
        .ui
        .events()
        .iter()
        .any(|e| matches!(e, UiEvent::WorkflowError(_))));
    // The second step never ran.
    assert_eq!(f.fake.requests().len(), 1);
}

#[tokio::test]
async fn timeout_produces_step_error() {
    let f = Fixture::with_script("sleep 30");
    let mut config = f.config(vec![f.step("s0")]);
    config.timeout = Duration::from_millis(200);
    let runner = f.runner(config);

    let (tx, rx) = mpsc::channel(16);
    let started = std::time::Instant::now();
    let (runner, state) = drive(runner, tx, rx, |_tx| async {}).await;

    assert_eq!(state, WorkflowState::Error);
    assert!(started.elapsed() < Duration::from_secs(20));
    assert!(runner
        .context()
        .last_error
        .as_deref()
        .unwrap()
        .contains("timed out"));
}

#[tokio::test]
async fn mode_change_to_manual_is_recorded() {
    let f = Fixture::new();
    let config = f.config(vec![f.step("s0")]);
    let runner = f.runner(config);
    let (tx, rx) = mpsc::channel(16);

    let ui = Arc::clone(&f.ui);
    let (runner, state) = drive(runner, tx.clone(), rx, move |tx| async move {
        for _ in 0..500 {
            let has_input = ui
                .events()
                .iter()
                .any(|e| matches!(e, UiEvent::InputActive { .. }));
            if has_input {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tx.send(Signal::ModeChange {
            autonomous_mode: cm_core::AutonomousMode::Never,
        })
        .await
        .unwrap();
        tx.send(Signal::Stop).await.unwrap();
    })
    .await;

    assert_eq!(state, WorkflowState::Stopped);
    let persisted = runner.controller_store.load().unwrap();
    assert_eq!(persisted.autonomous_mode, cm_core::AutonomousMode::Never);
}

#[tokio::test]
async fn log_files_record_each_child() {
    let f = Fixture::new();
    let mut config = f.config(vec![f.step("s0"), f.step("s1")]);
    config.auto_mode = true;
    let runner = f.runner(config);
    let (tx, rx) = mpsc::channel(16);
    let (_runner, state) = drive(runner, tx, rx, |_tx| async {}).await;
    assert_eq!(state, WorkflowState::Completed);

    let layout = cm_storage::StateLayout::new(f.dir.path());
    let log1 = std::fs::read_to_string(layout.log_file(1)).unwrap();
    assert!(log1.contains("spawn agent=s0"));
    assert!(log1.contains("step done"));
    assert!(log1.contains("agent completed"));
    let log2 = std::fs::read_to_string(layout.log_file(2)).unwrap();
    assert!(log2.contains("spawn agent=s1"));
}

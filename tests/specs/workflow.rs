//! End-to-end workflow execution from files on disk.

use crate::prelude::Project;
use cm_core::{Signal, WorkflowState};
use tokio::sync::mpsc;

const WORKFLOW: &str = r#"
name = "two-step"

[[steps]]
type = "module"
agent_id = "planner"

[[steps]]
type = "ui"
text = "--- build phase ---"

[[steps]]
type = "module"
agent_id = "builder"
"#;

const AGENTS: &str = r#"
[[agents]]
id = "planner"
name = "Planner"
prompt_path = "prompts/planner.md"
engine = "fake"

[[agents]]
id = "builder"
name = "Builder"
prompt_path = "prompts/builder.md"
engine = "fake"
chained_prompts_path = ["prompts/builder-verify.md"]
"#;

fn project() -> Project {
    Project::new(
        WORKFLOW,
        AGENTS,
        &[
            ("planner.md", "Plan the work."),
            ("builder.md", "Build the plan."),
            ("builder-verify.md", "Verify the build."),
        ],
    )
}

#[tokio::test]
async fn autonomous_run_completes_from_files() {
    let p = project();
    let mut runner = p.runner(true);
    let (_tx, mut rx) = mpsc::channel::<Signal>(16);

    let state = runner.run(&mut rx).await.unwrap();
    assert_eq!(state, WorkflowState::Completed);

    // planner, builder primary, builder chained prompt.
    let requests = p.fake.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].prompt, "Plan the work.");
    assert_eq!(requests[1].prompt, "Build the plan.");
    assert_eq!(requests[2].effective_prompt(), "Verify the build.");

    // State tree exists with one session file per executed step.
    let layout = cm_storage::StateLayout::new(p.path());
    assert!(layout.step_file(0).is_file());
    assert!(layout.step_file(1).is_file());
    assert!(layout.mcp_context_file().is_file());
}

#[tokio::test]
async fn manual_run_waits_for_the_operator() {
    let p = project();
    let mut runner = p.runner(false);
    let (tx, mut rx) = mpsc::channel::<Signal>(16);

    // Advance through both steps with empty submissions.
    let ui = std::sync::Arc::clone(&p.ui);
    let feeder = tokio::spawn(async move {
        for n in 1..=2 {
            for _ in 0..500 {
                let count = ui
                    .events()
                    .iter()
                    .filter(|e| matches!(e, cm_engine::ui::UiEvent::InputActive { .. }))
                    .count();
                if count >= n {
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
            tx.send(Signal::Input {
                prompt: None,
                skip: false,
            })
            .await
            .unwrap();
        }
    });

    let state = runner.run(&mut rx).await.unwrap();
    feeder.abort();
    assert_eq!(state, WorkflowState::Completed);
}

#[tokio::test]
async fn stop_exit_state_maps_to_operator_exit() {
    let p = project();
    let mut runner = p.runner(false);
    let (tx, mut rx) = mpsc::channel::<Signal>(16);

    let ui = std::sync::Arc::clone(&p.ui);
    let feeder = tokio::spawn(async move {
        for _ in 0..500 {
            if ui
                .events()
                .iter()
                .any(|e| matches!(e, cm_engine::ui::UiEvent::InputActive { .. }))
            {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        tx.send(Signal::Stop).await.unwrap();
    });

    let state = runner.run(&mut rx).await.unwrap();
    feeder.abort();
    assert_eq!(state, WorkflowState::Stopped);
}

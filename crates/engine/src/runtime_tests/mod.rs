// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenario tests for the workflow runner, driven against the
//! fake engine adapter.

mod scenarios;
mod signals;

use crate::runner::{WorkflowConfig, WorkflowRunner};
use crate::ui::{RecordingUi, UiEvent};
use cm_adapters::{EngineRegistry, FakeEngineAdapter};
use cm_core::{ModuleStep, Signal, WorkflowState};
use cm_mcp::{SignalsHandle, ToolBackend, WorkflowSignalsBackend};
use cm_template::{AgentDef, AgentRegistry, ControllerSpec};
use cm_template::prompts::PathList;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub(super) struct Fixture {
    pub dir: tempfile::TempDir,
    pub fake: Arc<FakeEngineAdapter>,
    pub ui: Arc<RecordingUi>,
    pub signals_handle: SignalsHandle,
    pub backend: WorkflowSignalsBackend,
}

impl Fixture {
    /// Fake emitting one session event and one message.
    pub fn new() -> Self {
        Self::with_script(&FakeEngineAdapter::script_emitting(&[
            r#"{"fake":"session","id":"fake-session-1"}"#,
            r#"{"fake":"message","text":"step done"}"#,
        ]))
    }

    pub fn with_script(script: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let (backend, signals_handle) = WorkflowSignalsBackend::new();
        Self {
            dir,
            fake: Arc::new(FakeEngineAdapter::with_script(script)),
            ui: Arc::new(RecordingUi::default()),
            signals_handle,
            backend,
        }
    }

    /// A step whose prompt file exists under the fixture directory.
    pub fn step(&self, id: &str) -> ModuleStep {
        let prompts = self.dir.path().join("prompts");
        std::fs::create_dir_all(&prompts).unwrap();
        let path = prompts.join(format!("{id}.md"));
        std::fs::write(&path, format!("You are {id}.")).unwrap();

        let mut step = ModuleStep::new(id, id);
        step.engine = Some("fake".into());
        step.prompt_paths = vec![path];
        step
    }

    pub fn config(&self, steps: Vec<ModuleStep>) -> WorkflowConfig {
        WorkflowConfig {
            name: "test-workflow".into(),
            steps,
            sub_agent_ids: Vec::new(),
            controller: None,
            agents: AgentRegistry::default(),
            cwd: self.dir.path().to_path_buf(),
            enabled_conditions: Vec::new(),
            template_hash: "hash-1".into(),
            auto_mode: false,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn runner(&self, config: WorkflowConfig) -> WorkflowRunner<RecordingUi> {
        let registry = EngineRegistry::from_adapters(vec![
            Arc::clone(&self.fake) as Arc<dyn cm_adapters::EngineAdapter>
        ]);
        WorkflowRunner::new(
            config,
            registry,
            self.signals_handle.clone(),
            Arc::clone(&self.ui),
        )
        .unwrap()
    }

    /// An agent definition with chained prompt files created on disk.
    pub fn agent_with_chained(&self, id: &str, chained: &[(&str, &str)]) -> AgentDef {
        let prompts = self.dir.path().join("prompts");
        std::fs::create_dir_all(&prompts).unwrap();
        let primary = prompts.join(format!("{id}.md"));
        std::fs::write(&primary, format!("You are {id}.")).unwrap();

        let mut entries = Vec::new();
        for (name, content) in chained {
            let path = prompts.join(format!("{name}.md"));
            std::fs::write(&path, content).unwrap();
            entries.push(cm_template::ChainedPromptEntry::Path(path));
        }

        AgentDef {
            id: id.into(),
            name: id.to_string(),
            description: None,
            role: None,
            prompt_path: PathList::One(primary),
            chained_prompts_path: Some(cm_template::ChainedPrompts::Many(entries)),
            behavior: None,
            engine: Some("fake".into()),
            model: None,
        }
    }

    /// Wait until the UI has recorded at least `n` input-active states.
    pub async fn wait_for_input_active(&self, n: usize) {
        for _ in 0..500 {
            let count = self
                .ui
                .events()
                .iter()
                .filter(|e| matches!(e, UiEvent::InputActive { .. }))
                .count();
            if count >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("input-active state {n} never reached");
    }

    /// Wait until the UI has recorded the given state.
    pub async fn wait_for_state(&self, state: WorkflowState) {
        for _ in 0..500 {
            if self.ui.states().contains(&state) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("state {state} never reached");
    }
}

/// Run a runner to its final state while allowing the test body to feed
/// signals. Returns (runner, final state).
pub(super) async fn drive<F, Fut>(
    mut runner: WorkflowRunner<RecordingUi>,
    tx: mpsc::Sender<Signal>,
    mut rx: mpsc::Receiver<Signal>,
    feed: F,
) -> (WorkflowRunner<RecordingUi>, WorkflowState)
where
    F: FnOnce(mpsc::Sender<Signal>) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let feeder = tokio::spawn(feed(tx));
    let state = runner.run(&mut rx).await.unwrap();
    feeder.abort();
    (runner, state)
}

/// Shorthand for reading a persisted step session from disk.
pub(super) fn step_session_on_disk(dir: &Path, index: usize) -> cm_storage::StepSession {
    let layout = cm_storage::StateLayout::new(dir);
    let raw = std::fs::read(layout.step_file(index)).unwrap();
    serde_json::from_slice(&raw).unwrap()
}

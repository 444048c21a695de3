//! Shared fixtures for workspace specs.

use cm_adapters::{EngineRegistry, FakeEngineAdapter};
use cm_engine::{RecordingUi, WorkflowConfig, WorkflowRunner};
use cm_mcp::{SignalsHandle, WorkflowSignalsBackend};
use cm_template::{validate, AgentRegistry, WorkflowTemplate};
use std::path::Path;
use std::sync::Arc;

pub struct Project {
    pub dir: tempfile::TempDir,
    pub fake: Arc<FakeEngineAdapter>,
    pub ui: Arc<RecordingUi>,
    pub signals_handle: SignalsHandle,
}

impl Project {
    /// A project directory with a workflow template, agent config, and
    /// prompt files on disk.
    pub fn new(workflow_toml: &str, agents_toml: &str, prompts: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("workflow.toml"), workflow_toml).unwrap();
        std::fs::write(dir.path().join("agents.toml"), agents_toml).unwrap();
        let prompts_dir = dir.path().join("prompts");
        std::fs::create_dir_all(&prompts_dir).unwrap();
        for (name, content) in prompts {
            std::fs::write(prompts_dir.join(name), content).unwrap();
        }

        let (_backend, signals_handle) = WorkflowSignalsBackend::new();
        Self {
            dir,
            fake: Arc::new(FakeEngineAdapter::new()),
            ui: Arc::new(RecordingUi::default()),
            signals_handle,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Load, validate, and resolve the project into a runner.
    pub fn runner(&self, auto: bool) -> WorkflowRunner<RecordingUi> {
        let template = WorkflowTemplate::load(&self.path().join("workflow.toml")).unwrap();
        let agents = AgentRegistry::load(&self.path().join("agents.toml")).unwrap();
        validate(&template, &agents, self.path()).unwrap();

        let mut config = WorkflowConfig::from_template(
            &template,
            agents,
            self.path().to_path_buf(),
            &[],
            &[],
        )
        .unwrap();
        config.auto_mode = auto;

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
}

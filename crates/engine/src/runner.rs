// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level workflow runner.
//!
//! Owns the FSM, the per-step abort handle, and the loop state. One signal
//! channel feeds it; all FSM mutations happen synchronously on this loop.

use crate::directives::LoopCounters;
use crate::error::EngineError;
use crate::ui::WorkflowUi;
use cm_adapters::EngineRegistry;
use cm_core::{
    AbortHandle, AgentId, Machine, ModuleStep, MonitoringId, SessionId, Signal, WorkflowContext,
    WorkflowState,
};
use cm_mcp::SignalsHandle;
use cm_storage::{
    ActiveServersStore, ControllerAgentConfig, ControllerStore, StateLayout, StepStore,
};
use cm_template::{AgentRegistry, ControllerSpec, WorkflowTemplate};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Environment variable that bypasses engine auth preflight (dry runs).
pub const SKIP_AUTH_ENV: &str = "CODEMACHINE_SKIP_AUTH";

/// Everything a workflow run needs, resolved from template and agent files.
pub struct WorkflowConfig {
    pub name: String,
    pub steps: Vec<ModuleStep>,
    pub sub_agent_ids: Vec<AgentId>,
    pub controller: Option<ControllerSpec>,
    pub agents: AgentRegistry,
    pub cwd: PathBuf,
    pub enabled_conditions: Vec<String>,
    pub template_hash: String,
    /// Start in autonomous mode.
    pub auto_mode: bool,
    pub timeout: Duration,
}

impl WorkflowConfig {
    /// Resolve a loaded template into a runnable configuration.
    pub fn from_template(
        template: &WorkflowTemplate,
        agents: AgentRegistry,
        cwd: PathBuf,
        enabled_tracks: &[String],
        enabled_conditions: &[String],
    ) -> Result<Self, EngineError> {
        let steps = template.module_steps(&agents, enabled_tracks, enabled_conditions)?;
        Ok(Self {
            name: template.name.clone(),
            steps,
            sub_agent_ids: template.sub_agent_ids.clone(),
            controller: template.controller.clone(),
            agents,
            cwd,
            enabled_conditions: enabled_conditions.to_vec(),
            template_hash: template.content_hash.clone(),
            auto_mode: false,
            timeout: cm_adapters::DEFAULT_RUN_TIMEOUT,
        })
    }
}

/// Session identity of the child currently running, if any.
pub(crate) struct ActiveChild {
    pub monitoring_id: MonitoringId,
    pub session_id: Option<SessionId>,
}

pub struct WorkflowRunner<U: WorkflowUi> {
    pub(crate) machine: Machine,
    pub(crate) registry: EngineRegistry,
    pub(crate) layout: StateLayout,
    pub(crate) step_store: StepStore,
    pub(crate) controller_store: ControllerStore,
    pub(crate) active_servers: ActiveServersStore,
    pub(crate) agents: AgentRegistry,
    pub(crate) sub_agent_ids: Vec<AgentId>,
    pub(crate) external_servers: Vec<String>,
    pub(crate) enabled_conditions: Vec<String>,
    pub(crate) template_hash: String,
    pub(crate) signals_handle: SignalsHandle,
    pub(crate) ui: Arc<U>,
    pub(crate) timeout: Duration,
    pub(crate) loops: LoopCounters,
    pub(crate) step_abort: Option<AbortHandle>,
    pub(crate) active_child: Option<ActiveChild>,
    pub(crate) pending_resume: Option<String>,
    pub(crate) triggered_steps: HashSet<usize>,
}

impl<U: WorkflowUi> WorkflowRunner<U> {
    pub fn new(
        config: WorkflowConfig,
        registry: EngineRegistry,
        signals_handle: SignalsHandle,
        ui: Arc<U>,
    ) -> Result<Self, EngineError> {
        let layout = StateLayout::new(&config.cwd);
        layout.ensure()?;

        let step_store = StepStore::new(layout.clone());
        let controller_store = ControllerStore::new(layout.clone());
        let active_servers = ActiveServersStore::new(layout.clone());

        // Seed controller.json from the template when the file has no
        // controller yet.
        let mut persisted = controller_store.load()?;
        if persisted.controller_config.is_none() {
            if let Some(spec) = &config.controller {
                persisted.controller_config = Some(ControllerAgentConfig {
                    agent_id: spec.agent_id.clone(),
                    engine: spec.engine.clone(),
                    model: spec.model.clone(),
                    session_id: None,
                    monitoring_id: None,
                });
            }
        }
        persisted.autonomous_mode = if config.auto_mode {
            cm_core::AutonomousMode::True
        } else {
            cm_core::AutonomousMode::False
        };
        controller_store.save(&persisted)?;

        let external_servers =
            cm_mcp::config::load_external_servers(&layout.mcp_servers_file())
                .map(|servers| servers.into_iter().map(|s| s.name).collect())
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "ignoring invalid MCP server config");
                    Vec::new()
                });

        let mut context = WorkflowContext::new(
            config.steps,
            config.cwd.clone(),
            layout.root().to_path_buf(),
        );
        context.auto_mode = config.auto_mode;

        Ok(Self {
            machine: Machine::new(context),
            registry,
            layout,
            step_store,
            controller_store,
            active_servers,
            agents: config.agents,
            sub_agent_ids: config.sub_agent_ids,
            external_servers,
            enabled_conditions: config.enabled_conditions,
            template_hash: config.template_hash,
            signals_handle,
            ui,
            timeout: config.timeout,
            loops: LoopCounters::new(),
            step_abort: None,
            active_child: None,
            pending_resume: None,
            triggered_steps: HashSet::new(),
        })
    }

    pub fn state(&self) -> WorkflowState {
        self.machine.state()
    }

    pub fn context(&self) -> &WorkflowContext {
        &self.machine.context
    }

    /// Read access to persisted step state (status displays, tests).
    pub fn step_store(&self) -> &StepStore {
        &self.step_store
    }

    /// Run the workflow to a final state.
    pub async fn run(
        &mut self,
        signals: &mut mpsc::Receiver<Signal>,
    ) -> Result<WorkflowState, EngineError> {
        self.preflight()?;

        self.machine.send(cm_core::WorkflowEvent::Start);
        self.notify_state();

        while !self.machine.is_final() {
            // Service signals that arrived between suspension points.
            while let Ok(signal) = signals.try_recv() {
                self.apply_signal(signals, signal).await?;
            }
            if self.machine.is_final() {
                break;
            }

            match self.machine.state() {
                WorkflowState::Running => self.execute_running_state(signals).await?,
                WorkflowState::Awaiting | WorkflowState::Delegated => {
                    self.handle_waiting(signals).await?;
                }
                WorkflowState::Idle
                | WorkflowState::Completed
                | WorkflowState::Stopped
                | WorkflowState::Error => break,
            }
        }

        let state = self.machine.state();
        if state == WorkflowState::Error {
            let reason = self
                .machine
                .context
                .last_error
                .clone()
                .unwrap_or_else(|| "unknown error".to_string());
            self.ui.workflow_error(&reason);
        }
        Ok(state)
    }

    /// Configuration and authentication checks; the workflow refuses to
    /// start when any of them fail.
    fn preflight(&self) -> Result<(), EngineError> {
        let skip_auth = std::env::var(SKIP_AUTH_ENV).map(|v| v == "1").unwrap_or(false);

        let mut engines: Vec<Option<String>> = self
            .machine
            .context
            .steps
            .iter()
            .map(|s| s.engine.clone())
            .collect();
        if let Ok(config) = self.controller_store.load() {
            if let Some(controller) = config.controller_config {
                engines.push(Some(controller.engine));
            }
        }

        let mut checked = HashSet::new();
        for engine in engines {
            let id = engine.unwrap_or_else(|| cm_adapters::registry::DEFAULT_ENGINE_ID.to_string());
            if !checked.insert(id.clone()) {
                continue;
            }
            let adapter = self
                .registry
                .get(&id)
                .ok_or_else(|| EngineError::UnknownEngine(id.clone()))?;
            if !skip_auth && !adapter.is_authenticated() {
                return Err(EngineError::NotAuthenticated { engine: id });
            }
        }
        Ok(())
    }

    pub(crate) fn notify_state(&self) {
        self.ui.state_changed(self.machine.state());
    }

    async fn execute_running_state(
        &mut self,
        signals: &mut mpsc::Receiver<Signal>,
    ) -> Result<(), EngineError> {
        // A fresh spell of running always un-pauses.
        self.machine.context.paused = false;

        match self.pending_resume.take() {
            Some(text) => self.resume_with_input(signals, text).await,
            None => self.run_step_fresh(signals).await,
        }
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow template loading.
//!
//! A template is an ordered sequence of steps. Only `module` steps are
//! executed by the engine; `ui` steps are rendered by the UI collaborator.

use crate::agents::AgentRegistry;
use crate::error::TemplateError;
use crate::prompts::PathList;
use cm_core::{AgentId, ModuleBehavior, ModuleStep, StepId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Controller selection in a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerSpec {
    pub agent_id: AgentId,
    pub engine: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// A UI-only step (rendered, never executed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiStep {
    pub text: String,
}

/// Raw step entry as written in the template file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TemplateStep {
    Module(ModuleStepDef),
    Ui(UiStep),
}

/// Module step definition as written in the template file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleStepDef {
    pub agent_id: AgentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_path: Option<PathList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_reasoning_effort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<ModuleBehavior>,
    #[serde(default)]
    pub execute_once: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interactive: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tracks: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<String>,
}

/// A loaded workflow template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<TemplateStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_agent_ids: Vec<AgentId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tracks: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<ControllerSpec>,
    /// SHA-256 of the template file contents; identifies the template
    /// revision for execute-once bookkeeping. Not part of the file.
    #[serde(skip)]
    pub content_hash: String,
}

impl WorkflowTemplate {
    /// Load and parse a template file.
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let raw = std::fs::read_to_string(path).map_err(|e| TemplateError::io(path, e))?;
        let mut template: WorkflowTemplate = toml::from_str(&raw).map_err(|e| {
            TemplateError::Parse {
                path: path.to_path_buf(),
                source: Box::new(e),
            }
        })?;
        template.content_hash = content_hash(&raw);
        Ok(template)
    }

    /// Build the executable steps, resolving agent defaults and applying
    /// track/condition filters. UI steps are skipped here.
    pub fn module_steps(
        &self,
        agents: &AgentRegistry,
        enabled_tracks: &[String],
        enabled_conditions: &[String],
    ) -> Result<Vec<ModuleStep>, TemplateError> {
        let tracks: BTreeSet<&str> = enabled_tracks.iter().map(String::as_str).collect();
        let conditions: BTreeSet<&str> = enabled_conditions.iter().map(String::as_str).collect();

        let mut steps = Vec::new();
        let mut seen_ids = BTreeSet::new();
        for entry in &self.steps {
            let TemplateStep::Module(def) = entry else {
                continue;
            };
            if !included(&def.tracks, &tracks) {
                tracing::debug!(agent_id = %def.agent_id, "step excluded by tracks");
                continue;
            }
            if !def.conditions.iter().all(|c| conditions.contains(c.as_str())) {
                tracing::debug!(agent_id = %def.agent_id, "step excluded by conditions");
                continue;
            }
            let step = resolve_step(def, agents)?;
            // Step ids name steps in directives and loop skip lists; two
            // selected steps must never share one.
            if !seen_ids.insert(step.id.clone()) {
                return Err(TemplateError::Validation(format!(
                    "agent {} appears in more than one selected step",
                    def.agent_id
                )));
            }
            steps.push(step);
        }
        Ok(steps)
    }
}

/// A step with declared tracks is included iff one of them is enabled.
/// Steps without tracks are always included.
fn included(step_tracks: &[String], enabled: &BTreeSet<&str>) -> bool {
    step_tracks.is_empty() || step_tracks.iter().any(|t| enabled.contains(t.as_str()))
}

fn resolve_step(def: &ModuleStepDef, agents: &AgentRegistry) -> Result<ModuleStep, TemplateError> {
    let agent = agents.get(&def.agent_id);

    let prompt_paths: Vec<PathBuf> = match (&def.prompt_path, agent) {
        (Some(paths), _) => paths.as_vec(),
        (None, Some(agent)) => agent.prompt_path.as_vec(),
        (None, None) => {
            return Err(TemplateError::UnknownAgent(def.agent_id.to_string()));
        }
    };

    let mut step = ModuleStep::new(
        StepId::new(def.agent_id.as_str()),
        def.agent_id.clone(),
    );
    step.agent_name = def
        .agent_name
        .clone()
        .or_else(|| agent.map(|a| a.name.clone()))
        .unwrap_or_else(|| def.agent_id.to_string());
    step.prompt_paths = prompt_paths;
    step.engine = def.engine.clone().or_else(|| agent.and_then(|a| a.engine.clone()));
    step.model = def.model.clone().or_else(|| agent.and_then(|a| a.model.clone()));
    step.model_reasoning_effort = def.model_reasoning_effort.clone();
    step.behavior = def
        .behavior
        .clone()
        .or_else(|| agent.and_then(|a| a.behavior.clone()));
    step.execute_once = def.execute_once;
    step.interactive = def.interactive;
    step.tracks = def.tracks.clone();
    step.conditions = def.conditions.clone();
    Ok(step)
}

/// SHA-256 hex digest of the template file contents.
pub fn content_hash(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;

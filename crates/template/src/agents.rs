// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent definition loading.
//!
//! The agent config file declares every agent a template may reference,
//! including the controller (`role = "controller"`) and each agent's
//! chained prompts that populate the step queue.

use crate::error::TemplateError;
use crate::prompts::{merge_prompt_files, PathList};
use cm_core::{AgentId, ModuleBehavior, QueuedPrompt};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One entry of `chained_prompts_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChainedPromptEntry {
    Path(PathBuf),
    Conditional {
        path: PathBuf,
        conditions: Vec<String>,
    },
}

/// `chained_prompts_path`: a single path or a list of (possibly
/// conditional) entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChainedPrompts {
    One(PathBuf),
    Many(Vec<ChainedPromptEntry>),
}

impl ChainedPrompts {
    /// Entries surviving the enabled-condition filter, in declaration order.
    pub fn resolve(&self, enabled_conditions: &[String]) -> Vec<PathBuf> {
        match self {
            ChainedPrompts::One(p) => vec![p.clone()],
            ChainedPrompts::Many(entries) => entries
                .iter()
                .filter_map(|entry| match entry {
                    ChainedPromptEntry::Path(p) => Some(p.clone()),
                    ChainedPromptEntry::Conditional { path, conditions } => conditions
                        .iter()
                        .all(|c| enabled_conditions.contains(c))
                        .then(|| path.clone()),
                })
                .collect(),
        }
    }
}

/// One agent definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDef {
    pub id: AgentId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `"controller"` marks the agent that can drive autonomous mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub prompt_path: PathList,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chained_prompts_path: Option<ChainedPrompts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<ModuleBehavior>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl AgentDef {
    pub fn is_controller(&self) -> bool {
        self.role.as_deref() == Some("controller")
    }

    /// Build the queued prompts for this agent, loading each chained prompt
    /// file. The primary prompt is never part of the queue.
    pub fn queued_prompts(
        &self,
        base_dir: &Path,
        enabled_conditions: &[String],
    ) -> Result<Vec<QueuedPrompt>, TemplateError> {
        let Some(chained) = &self.chained_prompts_path else {
            return Ok(Vec::new());
        };
        let mut prompts = Vec::new();
        for path in chained.resolve(enabled_conditions) {
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let content = merge_prompt_files(base_dir, std::slice::from_ref(&path))?;
            prompts.push(QueuedPrompt::new(name.clone(), name, content));
        }
        Ok(prompts)
    }
}

/// File shape: `[[agents]] ...`
#[derive(Debug, Clone, Deserialize)]
struct AgentsFile {
    #[serde(default)]
    agents: Vec<AgentDef>,
}

/// All agent definitions, indexed by id in declaration order.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: IndexMap<AgentId, AgentDef>,
}

impl AgentRegistry {
    /// Load the agent config file.
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let raw = std::fs::read_to_string(path).map_err(|e| TemplateError::io(path, e))?;
        let file: AgentsFile = toml::from_str(&raw).map_err(|e| TemplateError::Parse {
            path: path.to_path_buf(),
            source: Box::new(e),
        })?;
        let mut agents = IndexMap::new();
        for agent in file.agents {
            if agents.insert(agent.id.clone(), agent.clone()).is_some() {
                return Err(TemplateError::Validation(format!(
                    "duplicate agent id: {}",
                    agent.id
                )));
            }
        }
        Ok(Self { agents })
    }

    pub fn from_defs(defs: Vec<AgentDef>) -> Self {
        Self {
            agents: defs.into_iter().map(|d| (d.id.clone(), d)).collect(),
        }
    }

    pub fn get(&self, id: &AgentId) -> Option<&AgentDef> {
        self.agents.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &AgentId> {
        self.agents.keys()
    }

    /// The agent marked `role = "controller"`, if any.
    pub fn controller(&self) -> Option<&AgentDef> {
        self.agents.values().find(|a| a.is_controller())
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
#[path = "agents_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Template validation: every problem found here refuses the workflow
//! before step 0 runs.

use crate::agents::AgentRegistry;
use crate::error::TemplateError;
use crate::template::{TemplateStep, WorkflowTemplate};
use cm_core::ModuleBehavior;
use std::path::Path;

/// Validate a template against its agent registry and prompt files.
pub fn validate(
    template: &WorkflowTemplate,
    agents: &AgentRegistry,
    base_dir: &Path,
) -> Result<(), TemplateError> {
    if template.name.trim().is_empty() {
        return Err(TemplateError::Validation("template name is empty".into()));
    }

    let module_defs: Vec<_> = template
        .steps
        .iter()
        .filter_map(|s| match s {
            TemplateStep::Module(def) => Some(def),
            TemplateStep::Ui(_) => None,
        })
        .collect();

    if module_defs.is_empty() {
        return Err(TemplateError::Validation(
            "template has no module steps".into(),
        ));
    }

    // Step ids are minted from agent ids, so two steps may only reuse an
    // agent when their track sets are disjoint (never both selected).
    for (i, first) in module_defs.iter().enumerate() {
        for second in module_defs.iter().skip(i + 1) {
            if first.agent_id != second.agent_id {
                continue;
            }
            let disjoint = !first.tracks.is_empty()
                && !second.tracks.is_empty()
                && first.tracks.iter().all(|t| !second.tracks.contains(t));
            if !disjoint {
                return Err(TemplateError::Validation(format!(
                    "agent {} is used by two steps that can be selected together",
                    first.agent_id
                )));
            }
        }
    }

    for (index, def) in module_defs.iter().enumerate() {
        let agent = agents.get(&def.agent_id);
        if def.prompt_path.is_none() && agent.is_none() {
            return Err(TemplateError::UnknownAgent(def.agent_id.to_string()));
        }

        // Prompt files must exist up front.
        let paths = def
            .prompt_path
            .as_ref()
            .map(|p| p.as_vec())
            .or_else(|| agent.map(|a| a.prompt_path.as_vec()))
            .unwrap_or_default();
        for path in paths {
            let resolved = if path.is_absolute() {
                path
            } else {
                base_dir.join(path)
            };
            if !resolved.is_file() {
                return Err(TemplateError::MissingPromptFile(resolved));
            }
        }

        // A loop can only step back over steps that exist.
        let behavior = def.behavior.as_ref().or_else(|| agent.and_then(|a| a.behavior.as_ref()));
        if let Some(ModuleBehavior::Loop(l)) = behavior {
            if l.steps == 0 {
                return Err(TemplateError::Validation(format!(
                    "step {index}: loop behavior with steps = 0"
                )));
            }
            if l.steps > index {
                return Err(TemplateError::Validation(format!(
                    "step {index}: loop steps back {} past the start",
                    l.steps
                )));
            }
        }

        if let Some(ModuleBehavior::Trigger(t)) = behavior {
            if agents.get(&t.trigger_agent_id).is_none() {
                return Err(TemplateError::UnknownAgent(
                    t.trigger_agent_id.to_string(),
                ));
            }
        }
    }

    if let Some(controller) = &template.controller {
        if agents.get(&controller.agent_id).is_none() {
            return Err(TemplateError::UnknownAgent(
                controller.agent_id.to_string(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;

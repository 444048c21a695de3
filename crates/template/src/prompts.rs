// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt file loading and merging.

use crate::error::TemplateError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A single path or a list of paths. Multiple paths mean concatenation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathList {
    One(PathBuf),
    Many(Vec<PathBuf>),
}

impl PathList {
    pub fn into_vec(self) -> Vec<PathBuf> {
        match self {
            PathList::One(p) => vec![p],
            PathList::Many(ps) => ps,
        }
    }

    pub fn as_vec(&self) -> Vec<PathBuf> {
        self.clone().into_vec()
    }
}

/// Concatenate the given prompt files (resolved against `base_dir` when
/// relative) into one prompt, separated by blank lines.
pub fn merge_prompt_files(base_dir: &Path, paths: &[PathBuf]) -> Result<String, TemplateError> {
    let mut parts = Vec::with_capacity(paths.len());
    for path in paths {
        let resolved = if path.is_absolute() {
            path.clone()
        } else {
            base_dir.join(path)
        };
        let content = std::fs::read_to_string(&resolved).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TemplateError::MissingPromptFile(resolved.clone())
            } else {
                TemplateError::io(&resolved, e)
            }
        })?;
        parts.push(content.trim_end().to_string());
    }
    Ok(parts.join("\n\n"))
}

#[cfg(test)]
#[path = "prompts_tests.rs"]
mod tests;

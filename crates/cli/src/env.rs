// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment handling for the CLI.

use std::path::PathBuf;

/// Working-directory override honored by every subcommand.
pub const CWD_ENV: &str = "CODEMACHINE_CWD";

/// Resolve the effective working directory: `CODEMACHINE_CWD` when set,
/// the process working directory otherwise.
pub fn resolve_cwd() -> anyhow::Result<PathBuf> {
    if let Some(dir) = std::env::var_os(CWD_ENV) {
        let path = PathBuf::from(dir);
        anyhow::ensure!(path.is_dir(), "{CWD_ENV} is not a directory: {}", path.display());
        return Ok(path);
    }
    Ok(std::env::current_dir()?)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;

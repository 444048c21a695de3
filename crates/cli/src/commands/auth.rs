// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `codemachine auth`: engine login plumbing.

use anyhow::Context;
use clap::Args;
use cm_adapters::EngineRegistry;
use std::process::ExitCode;

#[derive(Args)]
pub struct AuthArgs {
    /// Engine id (codex, cursor, opencode, auggie, copilot, vibe)
    pub engine: String,
    /// Remove stored credentials instead of logging in
    #[arg(long)]
    pub clear: bool,
    /// Re-run the login flow even when already authenticated
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: AuthArgs) -> anyhow::Result<ExitCode> {
    let registry = EngineRegistry::with_builtin();
    let adapter = registry
        .get(&args.engine)
        .with_context(|| format!("unknown engine: {} (known: {:?})", args.engine, registry.ids()))?;

    if args.clear {
        adapter.clear_auth()?;
        println!("credentials cleared for {}", args.engine);
        return Ok(ExitCode::SUCCESS);
    }

    adapter.ensure_auth(args.force)?;
    println!("{} is authenticated", args.engine);
    Ok(ExitCode::SUCCESS)
}

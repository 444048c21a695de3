// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `codemachine mcp`: run the router on stdio, or manage engine MCP
//! settings.

use anyhow::Context;
use clap::{Args, Subcommand};
use cm_adapters::{EngineRegistry, McpScope};
use cm_mcp::{
    AgentCoordinationBackend, AgentSpawner, ExternalBackend, McpRouter, ToolBackend,
    WorkflowSignalsBackend,
};
use cm_storage::StateLayout;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Args)]
pub struct McpArgs {
    #[command(subcommand)]
    pub command: McpCommand,
}

#[derive(Subcommand)]
pub enum McpCommand {
    /// Serve MCP over stdio (what agents connect to)
    Serve,
    /// Register the router in an engine's MCP settings
    Configure {
        engine: String,
        /// Use the user-level settings file instead of the project one
        #[arg(long)]
        user: bool,
    },
    /// Remove the router from an engine's MCP settings
    Cleanup {
        engine: String,
        #[arg(long)]
        user: bool,
    },
}

/// Spawner used when agents coordinate sub-agents through the router
/// process: each sub-agent runs through the subprocess runner with the
/// engine configured for it in the agent registry. The router process has
/// no agent registry of its own, so it reports what the engine wrote into
/// the state tree.
struct RouterAgentSpawner {
    registry: EngineRegistry,
    cwd: std::path::PathBuf,
}

#[async_trait::async_trait]
impl AgentSpawner for RouterAgentSpawner {
    async fn run_agent(
        &self,
        name: &str,
        prompt: &str,
        working_dir: Option<std::path::PathBuf>,
        input: Option<cm_mcp::InputQualifier>,
        timeout_ms: Option<u64>,
    ) -> Result<String, String> {
        let cwd = working_dir.unwrap_or_else(|| self.cwd.clone());

        // Input qualifier: prepend (the tail of) a file to the prompt.
        let prompt = match input {
            Some(qualifier) => {
                let content = tokio::fs::read_to_string(cwd.join(&qualifier.file))
                    .await
                    .map_err(|e| format!("cannot read {}: {e}", qualifier.file))?;
                let content = match qualifier.tail {
                    Some(n) => {
                        let lines: Vec<&str> = content.lines().collect();
                        let start = lines.len().saturating_sub(n as usize);
                        lines[start..].join("\n")
                    }
                    None => content,
                };
                format!("## Input ({})\n{content}\n\n{prompt}", qualifier.file)
            }
            None => prompt.to_string(),
        };

        let Some(adapter) = self.registry.resolve(None) else {
            return Err("no default engine available".to_string());
        };
        let request = cm_adapters::RunRequest {
            prompt,
            cwd,
            model: None,
            model_reasoning_effort: None,
            resume_session_id: None,
            resume_prompt: None,
        };
        let mut options = cm_adapters::runner::RunOptions::new(adapter, request);
        if let Some(ms) = timeout_ms {
            options.timeout = std::time::Duration::from_millis(ms);
        }
        tracing::info!(agent = name, "running coordinated agent");
        match cm_adapters::runner::run(options).await {
            Ok(output) => Ok(output.stdout),
            Err(e) => Err(e.to_string()),
        }
    }

    fn available_agents(&self) -> Vec<String> {
        Vec::new()
    }
}

pub async fn run(args: McpArgs) -> anyhow::Result<ExitCode> {
    match args.command {
        McpCommand::Serve => serve().await,
        McpCommand::Configure { engine, user } => configure(&engine, user, true),
        McpCommand::Cleanup { engine, user } => configure(&engine, user, false),
    }
}

async fn serve() -> anyhow::Result<ExitCode> {
    let cwd = crate::env::resolve_cwd()?;
    let layout = StateLayout::new(&cwd);
    layout.ensure()?;

    let (signals_backend, _handle) = WorkflowSignalsBackend::with_layout(Some(layout.clone()));
    let coordination = AgentCoordinationBackend::new(Arc::new(RouterAgentSpawner {
        registry: EngineRegistry::with_builtin(),
        cwd,
    }));

    let mut router = McpRouter::new(cm_storage::ActiveServersStore::new(layout.clone()));
    router.add_backend(Arc::new(signals_backend) as Arc<dyn ToolBackend>);
    router.add_backend(Arc::new(coordination) as Arc<dyn ToolBackend>);

    // User-defined external servers from mcp/servers.toml.
    for config in cm_mcp::config::load_external_servers(&layout.mcp_servers_file())? {
        match ExternalBackend::spawn(&config).await {
            Ok(backend) => router.add_backend(Arc::new(backend) as Arc<dyn ToolBackend>),
            Err(e) => tracing::warn!(server = %config.name, error = %e, "external server failed to start"),
        }
    }

    router
        .serve(tokio::io::stdin(), tokio::io::stdout())
        .await?;
    Ok(ExitCode::SUCCESS)
}

fn configure(engine: &str, user: bool, install: bool) -> anyhow::Result<ExitCode> {
    let cwd = crate::env::resolve_cwd()?;
    let registry = EngineRegistry::with_builtin();
    let adapter = registry
        .get(engine)
        .with_context(|| format!("unknown engine: {engine}"))?;

    anyhow::ensure!(
        adapter.mcp_supported(),
        "{engine} does not support MCP configuration"
    );

    let scope = if user { McpScope::User } else { McpScope::Project };
    if install {
        adapter.mcp_configure(&cwd, scope)?;
        println!("MCP router registered for {engine}");
    } else {
        adapter.mcp_cleanup(&cwd, scope)?;
        println!("MCP router removed for {engine}");
    }
    Ok(ExitCode::SUCCESS)
}

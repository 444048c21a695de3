// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `codemachine run`: execute a workflow template to a final state.

use crate::term_ui::{spawn_stdin_reader, TermUi};
use anyhow::Context;
use clap::Args;
use cm_adapters::EngineRegistry;
use cm_core::{Signal, SystemClock, WorkflowState};
use cm_engine::{InterruptAction, InterruptGuard, WorkflowConfig, WorkflowRunner};
use cm_mcp::WorkflowSignalsBackend;
use cm_storage::StateLayout;
use cm_template::{validate, AgentRegistry, WorkflowTemplate};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// How long a forced exit waits for the runner to mark agents aborted and
/// close their logs before giving up.
const FORCE_EXIT_GRACE: Duration = Duration::from_secs(3);

#[derive(Args)]
pub struct RunArgs {
    /// Workflow template file
    #[arg(default_value = "workflow.toml")]
    pub template: PathBuf,
    /// Agent config file
    #[arg(long, default_value = "agents.toml")]
    pub agents: PathBuf,
    /// Enabled track labels
    #[arg(long = "track")]
    pub tracks: Vec<String>,
    /// Enabled condition flags
    #[arg(long = "condition")]
    pub conditions: Vec<String>,
    /// Start in autonomous mode (controller drives the workflow)
    #[arg(long)]
    pub auto: bool,
    /// Per-agent timeout in minutes
    #[arg(long, default_value_t = 30)]
    pub timeout_min: u64,
}

pub async fn run(args: RunArgs) -> anyhow::Result<ExitCode> {
    let cwd = crate::env::resolve_cwd()?;

    let template_path = cwd.join(&args.template);
    let template = WorkflowTemplate::load(&template_path)
        .with_context(|| format!("loading template {}", template_path.display()))?;
    let agents_path = cwd.join(&args.agents);
    let agents = if agents_path.is_file() {
        AgentRegistry::load(&agents_path)?
    } else {
        AgentRegistry::default()
    };
    validate(&template, &agents, &cwd)?;

    let mut config =
        WorkflowConfig::from_template(&template, agents, cwd.clone(), &args.tracks, &args.conditions)?;
    config.auto_mode = args.auto;
    config.timeout = Duration::from_secs(args.timeout_min * 60);

    let layout = StateLayout::new(&cwd);
    layout.ensure()?;
    let (_signals_backend, signals_handle) =
        WorkflowSignalsBackend::with_layout(Some(layout));

    let mut runner = WorkflowRunner::new(
        config,
        EngineRegistry::with_builtin(),
        signals_handle,
        Arc::new(TermUi),
    )?;

    let (signal_tx, mut signal_rx) = mpsc::channel::<Signal>(64);
    let (force_tx, mut force_rx) = oneshot::channel::<()>();
    let stdin_task = spawn_stdin_reader(signal_tx.clone());
    let interrupt_task = spawn_interrupt_handler(signal_tx, force_tx);

    let mut runner_task =
        tokio::spawn(async move { runner.run(&mut signal_rx).await });

    let state = tokio::select! {
        result = &mut runner_task => Some(result??),
        _ = &mut force_rx => {
            // The interrupt handler already sent STOP; the abort path marks
            // running agents aborted and flushes their logs. Give it a
            // bounded window, then exit regardless (tearing down the
            // runtime drops the log writers, which flush and unlock).
            match tokio::time::timeout(FORCE_EXIT_GRACE, &mut runner_task).await {
                Ok(result) => {
                    if let Err(e) = result? {
                        tracing::warn!(error = %e, "runner errored during forced exit");
                    }
                }
                Err(_) => {
                    eprintln!("[workflow] agents did not wind down in time");
                }
            }
            None
        }
    };

    runner_task.abort();
    stdin_task.abort();
    interrupt_task.abort();

    Ok(match state {
        None => ExitCode::from(130),
        Some(WorkflowState::Completed) => ExitCode::SUCCESS,
        Some(WorkflowState::Stopped) => ExitCode::from(130),
        Some(_) => ExitCode::from(1),
    })
}

/// Two-stage Ctrl-C: the first interrupt requests a graceful stop, a
/// second one within the debounce window forces exit. The force path still
/// goes through STOP so running agents are aborted and their logs closed;
/// it only stops waiting for them past the grace window.
fn spawn_interrupt_handler(
    tx: mpsc::Sender<Signal>,
    force_tx: oneshot::Sender<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut guard = InterruptGuard::new(SystemClock);
        let mut force_tx = Some(force_tx);
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            match guard.on_interrupt() {
                InterruptAction::GracefulStop => {
                    eprintln!("\n[workflow] stopping (press Ctrl-C again to force exit)");
                    if tx.send(Signal::Stop).await.is_err() {
                        return;
                    }
                }
                InterruptAction::ForceExit => {
                    eprintln!("\n[workflow] forcing exit");
                    // STOP again in case the first one was missed, then
                    // flip the force switch.
                    let _ = tx.send(Signal::Stop).await;
                    if let Some(force_tx) = force_tx.take() {
                        let _ = force_tx.send(());
                    }
                }
            }
        }
    })
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess runner.
//!
//! Spawns one engine child per prompt, streams normalized output back to
//! the caller, extracts session identity and token telemetry, and enforces
//! cancellation and timeout with SIGTERM-then-SIGKILL escalation. The
//! runner never interprets prompts and never retries; one shot only.

use crate::engine::{EngineAdapter, RunRequest};
use crate::normalize::{normalize_chunk, LineAssembler};
use cm_core::{AbortSignal, AgentEvent, SessionId, TokenTelemetry};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Default per-child timeout.
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Grace window between SIGTERM and SIGKILL.
const TERM_GRACE: Duration = Duration::from_secs(5);

/// How many stderr lines feed an error message.
const STDERR_HEAD_LINES: usize = 10;

/// Errors from one run
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("{binary} not found. Install it with: {install}")]
    BinaryMissing { binary: String, install: String },

    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// Cancellation is not an error for the workflow; the signal handler
    /// that raised the abort owns the FSM consequence.
    #[error("run aborted")]
    Aborted,

    #[error("agent timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("{message}")]
    AgentFailed {
        message: String,
        exit_code: Option<i32>,
    },
}

/// Streaming updates delivered in child-output order.
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerUpdate {
    /// Already-rendered UI line (trailing newline included).
    Data { chunk: String },
    /// Normalized stderr line.
    ErrorData { chunk: String },
    /// Accumulated usage after each telemetry event.
    Telemetry { usage: TokenTelemetry },
    /// Emitted exactly once per run, from the first session-bearing event.
    SessionId { session_id: SessionId },
}

/// One run of one engine child.
pub struct RunOptions {
    pub engine: Arc<dyn EngineAdapter>,
    pub request: RunRequest,
    /// Streaming sink; `None` discards updates.
    pub updates: Option<mpsc::Sender<RunnerUpdate>>,
    pub abort: AbortSignal,
    pub timeout: Duration,
}

impl RunOptions {
    pub fn new(engine: Arc<dyn EngineAdapter>, request: RunRequest) -> Self {
        Self {
            engine,
            request,
            updates: None,
            abort: AbortSignal::never(),
            timeout: DEFAULT_RUN_TIMEOUT,
        }
    }
}

/// Collected result of a completed run.
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    /// Concatenation of every rendered stdout line.
    pub stdout: String,
    pub stderr: String,
    pub session_id: Option<SessionId>,
    pub telemetry: TokenTelemetry,
}

#[derive(Default)]
struct StreamState {
    stdout: String,
    session_id: Option<SessionId>,
    telemetry: TokenTelemetry,
    first_error: Option<String>,
}

/// Run one engine child to completion.
pub async fn run(options: RunOptions) -> Result<RunOutput, RunnerError> {
    let RunOptions {
        engine,
        request,
        updates,
        mut abort,
        timeout,
    } = options;

    let invocation = engine.build_invocation(&request);
    let program = resolve_binary(&invocation.program).ok_or_else(|| {
        RunnerError::BinaryMissing {
            binary: invocation.program.clone(),
            install: engine.metadata().install_command.to_string(),
        }
    })?;

    tracing::debug!(
        engine = engine.metadata().id,
        program = %program,
        resume = request.is_resume(),
        "spawning engine child"
    );

    let mut child = Command::new(&program)
        .args(&invocation.args)
        .envs(invocation.env.iter().cloned())
        .current_dir(&request.cwd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| RunnerError::Spawn {
            binary: invocation.program.clone(),
            source: e,
        })?;

    // Deliver the prompt (or resume prompt) on stdin. A child that never
    // reads stdin surfaces as a broken pipe here; that is its business.
    if let Some(mut stdin) = child.stdin.take() {
        let _ = stdin.write_all(invocation.stdin_payload.as_bytes()).await;
        let _ = stdin.shutdown().await;
    }

    let stdout_task = spawn_stdout_reader(&mut child, Arc::clone(&engine), updates.clone());
    let stderr_task = spawn_stderr_reader(&mut child, updates.clone());

    let exit = tokio::select! {
        status = child.wait() => match status {
            Ok(status) => Some(status),
            Err(e) => {
                return Err(RunnerError::Spawn { binary: invocation.program, source: e });
            }
        },
        _ = abort.aborted() => {
            terminate(&mut child).await;
            None
        }
        _ = tokio::time::sleep(timeout) => {
            tracing::warn!(engine = engine.metadata().id, "engine child timed out");
            terminate(&mut child).await;
            drain(stdout_task, stderr_task).await;
            return Err(RunnerError::Timeout(timeout));
        }
    };

    // Readers drain to end-of-file before the runner returns.
    let (mut state, stderr) = drain(stdout_task, stderr_task).await;

    let Some(exit) = exit else {
        return Err(RunnerError::Aborted);
    };

    let exit_code = exit.code();
    let failed = !exit.success()
        || state.first_error.is_some()
        || (state.stdout.is_empty() && !stderr.is_empty());
    if failed {
        let message = state
            .first_error
            .take()
            .or_else(|| stderr_head(&stderr))
            .unwrap_or_else(|| format!("agent exited with code {}", exit_code.unwrap_or(-1)));
        return Err(RunnerError::AgentFailed { message, exit_code });
    }

    // Engines that do not stream usage report it via their session file.
    if state.telemetry == TokenTelemetry::default() {
        if let Some(session_id) = &state.session_id {
            if let Some(usage) = engine.scan_session_telemetry(&request.cwd, session_id) {
                state.telemetry.accumulate(&usage);
                send_update(
                    &updates,
                    RunnerUpdate::Telemetry {
                        usage: state.telemetry,
                    },
                )
                .await;
            }
        }
    }

    Ok(RunOutput {
        stdout: state.stdout,
        stderr,
        session_id: state.session_id,
        telemetry: state.telemetry,
    })
}

fn spawn_stdout_reader(
    child: &mut Child,
    engine: Arc<dyn EngineAdapter>,
    updates: Option<mpsc::Sender<RunnerUpdate>>,
) -> Option<JoinHandle<StreamState>> {
    let mut stdout = child.stdout.take()?;
    Some(tokio::spawn(async move {
        let mut state = StreamState::default();
        let mut assembler = LineAssembler::new();
        let mut buf = [0u8; 4096];
        loop {
            match stdout.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                    for line in assembler.push(&chunk) {
                        process_stdout_line(&engine, &updates, &mut state, &line).await;
                    }
                }
            }
        }
        if let Some(residual) = assembler.flush() {
            process_stdout_line(&engine, &updates, &mut state, &residual).await;
        }
        state
    }))
}

async fn process_stdout_line(
    engine: &Arc<dyn EngineAdapter>,
    updates: &Option<mpsc::Sender<RunnerUpdate>>,
    state: &mut StreamState,
    line: &str,
) {
    match engine.parse_event_line(line) {
        Some(event) => {
            if let AgentEvent::Session { session_id } = &event {
                // Exactly once per run; later session events are ignored.
                if state.session_id.is_none() {
                    state.session_id = Some(session_id.clone());
                    send_update(
                        updates,
                        RunnerUpdate::SessionId {
                            session_id: session_id.clone(),
                        },
                    )
                    .await;
                }
            }
            if let AgentEvent::Telemetry { usage } = &event {
                state.telemetry.accumulate(usage);
                send_update(
                    updates,
                    RunnerUpdate::Telemetry {
                        usage: state.telemetry,
                    },
                )
                .await;
            }
            if let AgentEvent::Error { message } = &event {
                state.first_error.get_or_insert_with(|| message.clone());
            }
            if let Some(rendered) = engine.render_event(&event) {
                push_data(updates, state, &rendered).await;
            }
        }
        None => {
            if !line.is_empty() {
                push_data(updates, state, line).await;
            }
        }
    }
}

async fn push_data(
    updates: &Option<mpsc::Sender<RunnerUpdate>>,
    state: &mut StreamState,
    line: &str,
) {
    state.stdout.push_str(line);
    state.stdout.push('\n');
    send_update(
        updates,
        RunnerUpdate::Data {
            chunk: format!("{line}\n"),
        },
    )
    .await;
}

fn spawn_stderr_reader(
    child: &mut Child,
    updates: Option<mpsc::Sender<RunnerUpdate>>,
) -> Option<JoinHandle<String>> {
    let mut stderr = child.stderr.take()?;
    Some(tokio::spawn(async move {
        let mut collected = String::new();
        let mut buf = [0u8; 4096];
        loop {
            match stderr.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let chunk = normalize_chunk(&String::from_utf8_lossy(&buf[..n]));
                    collected.push_str(&chunk);
                    send_update(&updates, RunnerUpdate::ErrorData { chunk }).await;
                }
            }
        }
        collected
    }))
}

async fn drain(
    stdout_task: Option<JoinHandle<StreamState>>,
    stderr_task: Option<JoinHandle<String>>,
) -> (StreamState, String) {
    let state = match stdout_task {
        Some(task) => task.await.unwrap_or_default(),
        None => StreamState::default(),
    };
    let stderr = match stderr_task {
        Some(task) => task.await.unwrap_or_default(),
        None => String::new(),
    };
    (state, stderr)
}

async fn send_update(updates: &Option<mpsc::Sender<RunnerUpdate>>, update: RunnerUpdate) {
    if let Some(tx) = updates {
        // A dropped receiver must not stall the reader.
        let _ = tx.send(update).await;
    }
}

/// First lines of stderr as an error message.
fn stderr_head(stderr: &str) -> Option<String> {
    let head: Vec<&str> = stderr
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(STDERR_HEAD_LINES)
        .collect();
    (!head.is_empty()).then(|| head.join("\n"))
}

/// SIGTERM, grace window, then SIGKILL.
async fn terminate(child: &mut Child) {
    if let Some(pid) = child.id() {
        let _ = nix::sys::signal::kill(
            nix::unistd::Pid::from_raw(pid as i32),
            nix::sys::signal::Signal::SIGTERM,
        );
        if tokio::time::timeout(TERM_GRACE, child.wait()).await.is_ok() {
            return;
        }
        tracing::warn!(pid, "child survived SIGTERM, sending SIGKILL");
    }
    let _ = child.start_kill();
    let _ = child.wait().await;
}

/// Locate a binary: explicit paths are checked directly, bare names are
/// searched on PATH.
fn resolve_binary(program: &str) -> Option<String> {
    if program.contains('/') {
        return std::path::Path::new(program)
            .is_file()
            .then(|| program.to_string());
    }
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        let candidate = dir.join(program);
        if candidate.is_file() {
            return Some(candidate.to_string_lossy().into_owned());
        }
    }
    None
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;

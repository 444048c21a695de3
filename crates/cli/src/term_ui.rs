// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin terminal rendering of engine events, plus the stdin reader that
//! turns operator lines into signals.
//!
//! Rendering terminal graphics is out of the engine's scope; this is a
//! line printer. Operator commands:
//!
//! ```text
//! <text>       submit input (empty line advances)
//! /skip        skip the current step
//! /stop        stop the workflow
//! /pause       pause the running step
//! /auto        switch to autonomous mode
//! /manual      switch to manual mode
//! /controller  talk to the controller agent
//! /continue    end the controller conversation and resume
//! ```

use cm_core::{
    AutonomousMode, MonitoringId, QueuedPrompt, Signal, TokenTelemetry, WorkflowState,
};
use cm_engine::WorkflowUi;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Line-printing UI.
#[derive(Default)]
pub struct TermUi;

impl WorkflowUi for TermUi {
    fn agent_line(&self, _monitoring_id: Option<MonitoringId>, chunk: &str) {
        print!("{chunk}");
        let _ = std::io::stdout().flush();
    }

    fn agent_error_line(&self, _monitoring_id: Option<MonitoringId>, chunk: &str) {
        eprint!("{chunk}");
    }

    fn telemetry(&self, usage: TokenTelemetry) {
        let cost = usage
            .cost_usd
            .map(|c| format!(" (${c:.4})"))
            .unwrap_or_default();
        eprintln!(
            "[tokens] in={} cached={} out={}{cost}",
            usage.input_tokens, usage.cached_input_tokens, usage.output_tokens
        );
    }

    fn state_changed(&self, state: WorkflowState) {
        eprintln!("[workflow] {state}");
    }

    fn input_active(&self, queue: &[QueuedPrompt], queue_index: usize) {
        if !queue.is_empty() {
            eprintln!("[queue] {} of {} queued prompts:", queue_index, queue.len());
            for (i, prompt) in queue.iter().enumerate() {
                let marker = if i == queue_index { ">" } else { " " };
                eprintln!("  {marker} {}", prompt.label);
            }
        }
        eprintln!("[input] press enter to advance, or type a message (/help for commands)");
    }

    fn controller_view(&self, active: bool) {
        if active {
            eprintln!("[controller] conversation started; empty line resumes the workflow");
        } else {
            eprintln!("[controller] conversation ended");
        }
    }

    fn workflow_error(&self, reason: &str) {
        eprintln!("[workflow] error: {reason}");
    }
}

/// Read operator lines from stdin and publish signals until the channel
/// closes.
pub fn spawn_stdin_reader(tx: mpsc::Sender<Signal>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) | Err(_) => break,
            };
            let signal = match line.trim() {
                "/skip" => Signal::Skip,
                "/stop" => Signal::Stop,
                "/pause" => Signal::Pause,
                "/controller" => Signal::ReturnToController,
                "/continue" => Signal::ControllerContinue,
                "/auto" => Signal::ModeChange {
                    autonomous_mode: AutonomousMode::True,
                },
                "/manual" => Signal::ModeChange {
                    autonomous_mode: AutonomousMode::False,
                },
                "/help" => {
                    eprintln!(
                        "commands: /skip /stop /pause /auto /manual /controller /continue"
                    );
                    continue;
                }
                "" => Signal::Input {
                    prompt: None,
                    skip: false,
                },
                text => Signal::Input {
                    prompt: Some(text.to_string()),
                    skip: false,
                },
            };
            if tx.send(signal).await.is_err() {
                break;
            }
        }
    })
}

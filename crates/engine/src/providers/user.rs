// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User input provider: waits on operator signals.

use crate::error::EngineError;
use crate::ui::WorkflowUi;
use cm_core::{
    AutonomousMode, InputOutcome, InputSource, QueuedPrompt, Signal, SWITCH_TO_AUTO,
    SWITCH_TO_MANUAL,
};
use tokio::sync::mpsc;

/// What one wait on the user produced.
#[derive(Debug, Clone, PartialEq)]
pub enum UserInputEvent {
    Outcome(InputOutcome),
    /// The operator asked for autonomous mode.
    SwitchToAuto,
    /// A signal the provider does not own; the signal manager handles it.
    Bubbled(Signal),
}

pub struct UserProvider;

impl UserProvider {
    /// Emit the input-active UI state and wait for exactly one of
    /// text-submit, skip, or stop. An empty submission means "advance".
    pub async fn get_input(
        signals: &mut mpsc::Receiver<Signal>,
        ui: &dyn WorkflowUi,
        queue: &[QueuedPrompt],
        queue_index: usize,
    ) -> Result<UserInputEvent, EngineError> {
        ui.input_active(queue, queue_index);

        loop {
            let signal = signals
                .recv()
                .await
                .ok_or(EngineError::SignalChannelClosed)?;
            match signal {
                Signal::Input { skip: true, .. } => {
                    return Ok(UserInputEvent::Outcome(InputOutcome::Skip));
                }
                Signal::Input { prompt, .. } => {
                    let value = prompt.unwrap_or_default();
                    if value == SWITCH_TO_AUTO {
                        return Ok(UserInputEvent::SwitchToAuto);
                    }
                    if value == SWITCH_TO_MANUAL {
                        // Already waiting on the user; nothing to switch.
                        continue;
                    }
                    return Ok(UserInputEvent::Outcome(InputOutcome::Input {
                        value,
                        source: InputSource::User,
                    }));
                }
                Signal::Skip => return Ok(UserInputEvent::Outcome(InputOutcome::Skip)),
                Signal::Stop => return Ok(UserInputEvent::Outcome(InputOutcome::Stop)),
                Signal::ModeChange {
                    autonomous_mode: AutonomousMode::True,
                } => return Ok(UserInputEvent::SwitchToAuto),
                other => return Ok(UserInputEvent::Bubbled(other)),
            }
        }
    }
}

#[cfg(test)]
#[path = "user_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Two-stage operator interrupt with debounce.
//!
//! The first Ctrl-C asks for a graceful stop (STOP to the FSM, wait for
//! children). A second interrupt within the window forces exit; outside
//! the window it counts as a new first interrupt.

use cm_core::Clock;
use std::time::{Duration, Instant};

/// Default window in which a second interrupt forces exit.
pub const DEFAULT_FORCE_WINDOW: Duration = Duration::from_secs(3);

/// What the caller should do about an interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// Signal STOP and wait for children to wind down.
    GracefulStop,
    /// Mark running agents aborted, close logs, exit now.
    ForceExit,
}

/// Interrupt debouncer.
pub struct InterruptGuard<C: Clock> {
    clock: C,
    window: Duration,
    first_pressed_at: Option<Instant>,
}

impl<C: Clock> InterruptGuard<C> {
    pub fn new(clock: C) -> Self {
        Self::with_window(clock, DEFAULT_FORCE_WINDOW)
    }

    pub fn with_window(clock: C, window: Duration) -> Self {
        Self {
            clock,
            window,
            first_pressed_at: None,
        }
    }

    /// Register one interrupt and decide its meaning.
    pub fn on_interrupt(&mut self) -> InterruptAction {
        let now = self.clock.now();
        match self.first_pressed_at {
            Some(first) if now.duration_since(first) <= self.window => InterruptAction::ForceExit,
            _ => {
                self.first_pressed_at = Some(now);
                InterruptAction::GracefulStop
            }
        }
    }
}

#[cfg(test)]
#[path = "interrupt_tests.rs"]
mod tests;

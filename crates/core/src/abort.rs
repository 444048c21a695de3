// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cooperative cancellation primitive.
//!
//! The runner owns one [`AbortHandle`] per active step; signal handlers abort
//! it and are then responsible for their own FSM transition. Aborting is
//! idempotent. The controller provider's subprocess runs under a separate
//! handle so a mode change can cancel the controller without touching the
//! step.

use tokio::sync::watch;

/// Owning side of a cancellation pair.
#[derive(Debug)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

/// Observer side handed to subprocess runners and providers.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortHandle {
    /// Create a fresh handle/signal pair.
    pub fn new() -> (Self, AbortSignal) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, AbortSignal { rx })
    }

    /// Trip the signal. Safe to call more than once.
    pub fn abort(&self) {
        // send_replace never fails; receivers may all be gone already
        let _ = self.tx.send_replace(true);
    }

    /// Whether this handle has been tripped.
    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }

    /// A new observer for the same handle.
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl AbortSignal {
    /// Whether the owning handle has been tripped.
    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve when the owning handle trips (or is dropped).
    pub async fn aborted(&mut self) {
        if *self.rx.borrow() {
            return;
        }
        // A closed channel means the handle was dropped without aborting;
        // treat that as "never fires" for this waiter.
        while self.rx.changed().await.is_ok() {
            if *self.rx.borrow() {
                return;
            }
        }
        std::future::pending::<()>().await;
    }

    /// A signal that never fires, for runs that cannot be cancelled.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        // Dropping the sender closes the channel; `aborted()` then pends forever.
        drop(tx);
        Self { rx }
    }
}

#[cfg(test)]
#[path = "abort_tests.rs"]
mod tests;

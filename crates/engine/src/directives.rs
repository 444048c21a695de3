// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Directive processing and loop bookkeeping.
//!
//! When a step's queue is exhausted, its persisted directive (together
//! with the step's declared behavior) decides what the workflow does next.

use cm_core::{DirectiveAction, ModuleBehavior, ModuleStep, StepId};
use cm_storage::{StepStore, StorageError};
use std::collections::HashMap;

/// Resolved next action after a step finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveOutcome {
    Advance,
    Stop { reason: Option<String> },
    Pause { reason: Option<String> },
    /// Hold for operator confirmation (checkpoint behavior).
    Checkpoint,
    /// Re-enter an earlier step.
    Loop { target_index: usize },
}

/// A loop currently in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveLoop {
    pub origin_step_index: usize,
    pub iteration_count: u32,
    pub max: Option<u32>,
    pub skip: Vec<StepId>,
}

/// In-memory loop iteration counters, keyed by origin step index.
#[derive(Debug, Default)]
pub struct LoopCounters {
    counts: HashMap<usize, u32>,
    active: Option<ActiveLoop>,
}

impl LoopCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, step_index: usize) -> u32 {
        self.counts.get(&step_index).copied().unwrap_or(0)
    }

    pub fn active(&self) -> Option<&ActiveLoop> {
        self.active.as_ref()
    }

    fn begin_iteration(&mut self, origin: usize, count: u32, max: Option<u32>, skip: Vec<StepId>) {
        self.counts.insert(origin, count);
        self.active = Some(ActiveLoop {
            origin_step_index: origin,
            iteration_count: count,
            max,
            skip,
        });
    }

    /// The loop ends when execution passes its origin step again.
    pub fn step_passed(&mut self, step_index: usize) {
        if let Some(active) = &self.active {
            if step_index >= active.origin_step_index {
                self.active = None;
            }
        }
    }

    /// Whether `step` should be skipped because an active loop excludes it.
    pub fn skips(&self, step: &ModuleStep) -> bool {
        self.active
            .as_ref()
            .map(|l| l.skip.contains(&step.id))
            .unwrap_or(false)
    }
}

/// Resolve the directive of the step at `index`.
///
/// Loop resolution: the persisted directive must say `loop` and the step
/// must declare a loop behavior. The iteration counter increments here;
/// once it exceeds `max_iterations` the loop falls through to Advance.
pub fn process_directive(
    store: &StepStore,
    loops: &mut LoopCounters,
    steps: &[ModuleStep],
    index: usize,
) -> Result<DirectiveOutcome, StorageError> {
    let session = store.load_step(index)?;
    let step = steps.get(index);
    let directive = session.directive.clone();

    match directive.action {
        DirectiveAction::Stop => Ok(DirectiveOutcome::Stop {
            reason: directive.reason,
        }),
        DirectiveAction::Pause => Ok(DirectiveOutcome::Pause {
            reason: directive.reason,
        }),
        DirectiveAction::Loop => {
            let Some(behavior) = step.and_then(|s| s.loop_behavior()) else {
                tracing::warn!(index, "loop directive on a step without loop behavior");
                return Ok(checkpoint_or_advance(step));
            };

            let target_index = match &directive.target_step_id {
                Some(target) => {
                    let Some(found) = steps.iter().position(|s| &s.id == target) else {
                        tracing::warn!(index, target = %target, "loop target not found");
                        return Ok(DirectiveOutcome::Advance);
                    };
                    found
                }
                None => index.saturating_sub(behavior.steps),
            };

            let count = store.increment_loop_count(index)?;
            // At count == max the last permitted iteration already ran:
            // fall through to advance.
            if let Some(max) = behavior.max_iterations {
                if count >= max {
                    tracing::info!(index, count, max, "loop iterations exhausted, advancing");
                    loops.active = None;
                    return Ok(DirectiveOutcome::Advance);
                }
            }
            loops.begin_iteration(index, count, behavior.max_iterations, behavior.skip.clone());
            Ok(DirectiveOutcome::Loop { target_index })
        }
        DirectiveAction::Continue => Ok(checkpoint_or_advance(step)),
    }
}

/// A checkpoint step holds even when its directive says continue.
fn checkpoint_or_advance(step: Option<&ModuleStep>) -> DirectiveOutcome {
    match step.and_then(|s| s.behavior.as_ref()) {
        Some(ModuleBehavior::Checkpoint) => DirectiveOutcome::Checkpoint,
        _ => DirectiveOutcome::Advance,
    }
}

/// Choose the next step index when advancing, honoring an active loop's
/// skip list. Returns `None` when no executable step remains before `total`.
pub fn next_index(loops: &LoopCounters, steps: &[ModuleStep], mut index: usize) -> Option<usize> {
    loop {
        index += 1;
        if index >= steps.len() {
            return None;
        }
        let step = &steps[index];
        if loops.skips(step) {
            tracing::debug!(index, step_id = %step.id, "skipped by active loop");
            continue;
        }
        return Some(index);
    }
}

#[cfg(test)]
#[path = "directives_tests.rs"]
mod tests;

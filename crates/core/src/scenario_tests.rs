// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    manual_interactive = { false, false, false, 1, HandlerMode::Interactive },
    manual_noninteractive = { false, false, true, 2, HandlerMode::Interactive },
    manual_paused = { false, true, false, 3, HandlerMode::Interactive },
    manual_paused_noninteractive = { false, true, true, 4, HandlerMode::Interactive },
    auto_interactive = { true, false, false, 5, HandlerMode::Autonomous },
    auto_noninteractive = { true, false, true, 6, HandlerMode::Continuous },
    auto_paused = { true, true, false, 7, HandlerMode::Interactive },
    auto_paused_noninteractive = { true, true, true, 8, HandlerMode::Interactive },
)]
fn classification_table(
    auto_mode: bool,
    paused: bool,
    noninteractive_step: bool,
    number: u8,
    mode: HandlerMode,
) {
    let scenario = Scenario::classify(ScenarioFlags {
        auto_mode,
        paused,
        noninteractive_step,
    });
    assert_eq!(scenario.0, number);
    assert_eq!(scenario.mode(), mode);
}

#[test]
fn all_eight_scenarios_are_distinct() {
    let mut seen = std::collections::HashSet::new();
    for auto_mode in [false, true] {
        for paused in [false, true] {
            for noninteractive_step in [false, true] {
                let s = Scenario::classify(ScenarioFlags {
                    auto_mode,
                    paused,
                    noninteractive_step,
                });
                assert!(seen.insert(s.0));
            }
        }
    }
    assert_eq!(seen.len(), 8);
}

#[test]
fn pause_always_resolves_interactively() {
    for auto_mode in [false, true] {
        for noninteractive_step in [false, true] {
            let s = Scenario::classify(ScenarioFlags {
                auto_mode,
                paused: true,
                noninteractive_step,
            });
            assert_eq!(s.mode(), HandlerMode::Interactive);
        }
    }
}

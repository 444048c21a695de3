// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    continue_ = { DirectiveAction::Continue, "continue" },
    pause = { DirectiveAction::Pause, "pause" },
    loop_ = { DirectiveAction::Loop, "loop" },
    stop = { DirectiveAction::Stop, "stop" },
)]
fn action_display(action: DirectiveAction, expected: &str) {
    assert_eq!(action.to_string(), expected);
}

#[test]
fn default_directive_continues() {
    let d = Directive::default();
    assert_eq!(d.action, DirectiveAction::Continue);
    assert!(d.reason.is_none());
    assert!(d.target_step_id.is_none());
}

#[test]
fn directive_serde_round_trip() {
    let d = Directive {
        action: DirectiveAction::Loop,
        reason: Some("tests failing".to_string()),
        target_step_id: Some(StepId::new("step-03-implement")),
    };
    let json = serde_json::to_string(&d).unwrap();
    let parsed: Directive = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, d);
}

#[test]
fn action_serde_snake_case() {
    let json = serde_json::to_string(&DirectiveAction::Continue).unwrap();
    assert_eq!(json, "\"continue\"");
}

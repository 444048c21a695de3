// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn session_id_display() {
    let id = SessionId::new("sess-abc123");
    assert_eq!(id.to_string(), "sess-abc123");
}

#[test]
fn session_id_equality() {
    let id1 = SessionId::new("s-1");
    let id2 = SessionId::new("s-1");
    let id3 = SessionId::new("s-2");

    assert_eq!(id1, id2);
    assert_ne!(id1, id3);
}

#[test]
fn agent_id_from_str() {
    let id: AgentId = "step-07-modules".into();
    assert_eq!(id.as_str(), "step-07-modules");
}

#[test]
fn step_id_serde() {
    let id = StepId::new("step-01-plan");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"step-01-plan\"");

    let parsed: StepId = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, id);
}

#[test]
fn short_id_truncates() {
    let id = SessionId::new("0123456789abcdef");
    assert_eq!(id.short(8), "01234567");
    assert_eq!(id.short(100), "0123456789abcdef");
}

#[test]
fn monitoring_id_serde_transparent() {
    let id = MonitoringId(42);
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "42");

    let parsed: MonitoringId = serde_json::from_str("42").unwrap();
    assert_eq!(parsed, id);
}

#[test]
fn uuid_id_gen_unique() {
    let id_gen = UuidIdGen;
    let a = id_gen.next();
    let b = id_gen.next();
    assert_ne!(a, b);
}

#[test]
fn sequential_id_gen_counts_up() {
    let id_gen = SequentialIdGen::new("run");
    assert_eq!(id_gen.next(), "run-1");
    assert_eq!(id_gen.next(), "run-2");
}

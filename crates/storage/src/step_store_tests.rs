// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cm_core::DirectiveAction;

fn store() -> (tempfile::TempDir, StepStore) {
    let dir = tempfile::tempdir().unwrap();
    let layout = StateLayout::new(dir.path());
    layout.ensure().unwrap();
    (dir, StepStore::new(layout))
}

fn prompts(names: &[&str]) -> Vec<QueuedPrompt> {
    names
        .iter()
        .map(|n| QueuedPrompt::new(*n, *n, format!("do {n}")))
        .collect()
}

#[test]
fn load_creates_fresh_session_on_disk() {
    let (dir, store) = store();
    let session = store.load_step(0).unwrap();

    assert!(session.queue.is_empty());
    assert_eq!(session.queue_index, 0);
    assert_eq!(session.directive.action, DirectiveAction::Continue);
    assert!(!session.completed);

    let on_disk = dir
        .path()
        .join(".codemachine")
        .join("steps")
        .join("0.json");
    assert!(on_disk.is_file());
}

#[test]
fn enqueue_and_walk_queue() {
    let (_dir, store) = store();
    store.enqueue_prompts(0, prompts(&["a", "b"])).unwrap();

    assert_eq!(
        store.current_queued_prompt(0).unwrap().unwrap().name,
        "a"
    );
    store.advance_queue(0).unwrap();
    assert_eq!(
        store.current_queued_prompt(0).unwrap().unwrap().name,
        "b"
    );
    store.advance_queue(0).unwrap();
    assert!(store.current_queued_prompt(0).unwrap().is_none());
    assert!(store.load_step(0).unwrap().queue_exhausted());
}

#[test]
fn advance_past_end_fails_loudly() {
    let (_dir, store) = store();
    store.enqueue_prompts(0, prompts(&["only"])).unwrap();
    store.advance_queue(0).unwrap();

    let err = store.advance_queue(0).unwrap_err();
    assert!(matches!(err, StorageError::QueueExhausted { .. }));
}

#[test]
fn session_init_is_idempotent_for_same_values() {
    let (_dir, store) = store();
    let sid = SessionId::new("sess-1");
    store
        .step_session_initialized(0, sid.clone(), MonitoringId(1))
        .unwrap();
    store
        .step_session_initialized(0, sid.clone(), MonitoringId(1))
        .unwrap();

    let session = store.load_step(0).unwrap();
    assert_eq!(session.session_id, Some(sid));
    assert_eq!(session.monitoring_id, Some(MonitoringId(1)));
}

#[test]
fn session_init_rejects_mismatched_values() {
    let (_dir, store) = store();
    store
        .step_session_initialized(0, SessionId::new("sess-1"), MonitoringId(1))
        .unwrap();
    let err = store
        .step_session_initialized(0, SessionId::new("sess-2"), MonitoringId(1))
        .unwrap_err();
    assert!(matches!(err, StorageError::SessionMismatch { .. }));
}

#[test]
fn completed_resets_directive() {
    let (_dir, store) = store();
    store
        .set_directive(0, Directive::stop("agent gave up"))
        .unwrap();
    store.step_completed(0).unwrap();

    let session = store.load_step(0).unwrap();
    assert!(session.completed);
    assert_eq!(session.directive.action, DirectiveAction::Continue);
}

#[test]
fn set_directive_round_trips() {
    let (_dir, store) = store();
    let directive = Directive::loop_();
    store.set_directive(1, directive.clone()).unwrap();
    assert_eq!(store.load_step(1).unwrap().directive, directive);
}

#[test]
fn reset_queue_rewinds_index_only() {
    let (_dir, store) = store();
    store.enqueue_prompts(0, prompts(&["a", "b"])).unwrap();
    store.advance_queue(0).unwrap();
    store.reset_queue(0).unwrap();

    let session = store.load_step(0).unwrap();
    assert_eq!(session.queue_index, 0);
    assert_eq!(session.queue.len(), 2);
}

#[test]
fn reset_session_clears_identity() {
    let (_dir, store) = store();
    store
        .step_session_initialized(0, SessionId::new("sess-1"), MonitoringId(1))
        .unwrap();
    store.step_completed(0).unwrap();
    store.reset_session(0).unwrap();

    let session = store.load_step(0).unwrap();
    assert!(session.session_id.is_none());
    assert!(session.monitoring_id.is_none());
    assert!(!session.completed);
}

#[test]
fn sessions_survive_cache_loss() {
    let (dir, store) = store();
    store.enqueue_prompts(2, prompts(&["x"])).unwrap();
    store
        .set_directive(2, Directive::pause("checkpoint"))
        .unwrap();
    drop(store);

    let layout = StateLayout::new(dir.path());
    let reopened = StepStore::new(layout);
    let session = reopened.load_step(2).unwrap();
    assert_eq!(session.queue.len(), 1);
    assert_eq!(session.directive.action, DirectiveAction::Pause);
}

#[test]
fn loop_counter_increments() {
    let (_dir, store) = store();
    assert_eq!(store.increment_loop_count(1).unwrap(), 1);
    assert_eq!(store.increment_loop_count(1).unwrap(), 2);
}

#[test]
fn capture_session_does_not_overwrite() {
    let (_dir, store) = store();
    store
        .capture_session(0, Some(SessionId::new("s-1")), Some(MonitoringId(4)))
        .unwrap();
    store
        .capture_session(0, Some(SessionId::new("s-2")), Some(MonitoringId(9)))
        .unwrap();

    let session = store.load_step(0).unwrap();
    assert_eq!(session.session_id, Some(SessionId::new("s-1")));
    assert_eq!(session.monitoring_id, Some(MonitoringId(4)));
}

#[test]
fn only_target_step_file_is_written() {
    let (dir, store) = store();
    store.load_step(0).unwrap();
    store.load_step(1).unwrap();
    store.enqueue_prompts(0, prompts(&["a"])).unwrap();

    let step1 = dir
        .path()
        .join(".codemachine")
        .join("steps")
        .join("1.json");
    let before = std::fs::read_to_string(&step1).unwrap();
    store.advance_queue(0).unwrap();
    let after = std::fs::read_to_string(&step1).unwrap();
    assert_eq!(before, after);
}

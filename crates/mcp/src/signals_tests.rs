// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn propose_args(step_id: &str) -> Value {
    json!({
        "step_id": step_id,
        "artifact_path": "docs/plan.md",
        "checklist": ["wrote plan", "listed modules"],
        "confidence": 0.8
    })
}

#[tokio::test]
async fn propose_then_get_pending() {
    let (backend, handle) = WorkflowSignalsBackend::new();
    handle.set_current_step(Some(StepId::new("step-07-modules")));

    let result = backend
        .call("propose_step_completion", propose_args("step-07-modules"))
        .await
        .unwrap();
    assert!(!result.is_error);

    let pending = handle.pending_proposal().unwrap();
    assert_eq!(pending.step_id, StepId::new("step-07-modules"));
    assert_eq!(pending.checklist.len(), 2);

    let result = backend
        .call("get_pending_proposal", json!({}))
        .await
        .unwrap();
    assert!(result.first_text().unwrap().contains("step-07-modules"));
}

#[tokio::test]
async fn wrong_step_id_is_tool_error() {
    let (backend, handle) = WorkflowSignalsBackend::new();
    handle.set_current_step(Some(StepId::new("step-07-modules")));

    let result = backend
        .call("propose_step_completion", propose_args("step-99-other"))
        .await
        .unwrap();
    assert!(result.is_error);
    assert!(result.first_text().unwrap().contains("wrong step_id"));
    assert!(handle.pending_proposal().is_none());
}

#[tokio::test]
async fn approval_flows_to_handle() {
    let (backend, handle) = WorkflowSignalsBackend::new();
    handle.set_current_step(Some(StepId::new("s1")));

    backend
        .call("propose_step_completion", propose_args("s1"))
        .await
        .unwrap();
    backend
        .call(
            "approve_step_transition",
            json!({"step_id": "s1", "decision": "approve"}),
        )
        .await
        .unwrap();

    let approval = handle.try_take_decision().await.unwrap();
    assert_eq!(approval.decision, ApprovalDecision::Approve);
    // Approval clears the pending proposal
    assert!(handle.pending_proposal().is_none());
}

#[tokio::test]
async fn revise_keeps_proposal_pending() {
    let (backend, handle) = WorkflowSignalsBackend::new();
    handle.set_current_step(Some(StepId::new("s1")));

    backend
        .call("propose_step_completion", propose_args("s1"))
        .await
        .unwrap();
    backend
        .call(
            "approve_step_transition",
            json!({"step_id": "s1", "decision": "revise", "notes": "add tests"}),
        )
        .await
        .unwrap();

    let approval = handle.try_take_decision().await.unwrap();
    assert_eq!(approval.decision, ApprovalDecision::Revise);
    assert!(handle.pending_proposal().is_some());
}

#[tokio::test]
async fn unknown_decision_rejected() {
    let (backend, handle) = WorkflowSignalsBackend::new();
    handle.set_current_step(Some(StepId::new("s1")));

    let result = backend
        .call(
            "approve_step_transition",
            json!({"step_id": "s1", "decision": "maybe"}),
        )
        .await
        .unwrap();
    assert!(result.is_error);
    assert!(handle.try_take_decision().await.is_none());
}

#[tokio::test]
async fn missing_arguments_are_tool_errors() {
    let (backend, _handle) = WorkflowSignalsBackend::new();
    let result = backend
        .call("propose_step_completion", json!({}))
        .await
        .unwrap();
    assert!(result.is_error);
}

#[tokio::test]
async fn advertises_signal_tools() {
    let (backend, _handle) = WorkflowSignalsBackend::new();
    let tools = backend.tools().await.unwrap();
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "propose_step_completion",
            "approve_step_transition",
            "get_pending_proposal",
            "set_step_directive",
        ]
    );
}

#[tokio::test]
async fn set_step_directive_reaches_the_handle() {
    let (backend, handle) = WorkflowSignalsBackend::new();
    handle.set_current_step(Some(StepId::new("s1")));

    let result = backend
        .call(
            "set_step_directive",
            json!({"step_id": "s1", "action": "loop", "reason": "tests failing"}),
        )
        .await
        .unwrap();
    assert!(!result.is_error);

    // A different step's lookup leaves the directive in place.
    assert!(handle
        .try_take_directive_for(&StepId::new("s0"))
        .is_none());

    let directive = handle
        .try_take_directive_for(&StepId::new("s1"))
        .unwrap();
    assert_eq!(directive.action, cm_core::DirectiveAction::Loop);
    assert_eq!(directive.reason.as_deref(), Some("tests failing"));

    // Consumed: a second take yields nothing.
    assert!(handle
        .try_take_directive_for(&StepId::new("s1"))
        .is_none());
}

#[tokio::test]
async fn set_step_directive_validates_gate_and_action() {
    let (backend, handle) = WorkflowSignalsBackend::new();
    handle.set_current_step(Some(StepId::new("s1")));

    let result = backend
        .call(
            "set_step_directive",
            json!({"step_id": "s9", "action": "loop"}),
        )
        .await
        .unwrap();
    assert!(result.is_error);
    assert!(handle
        .try_take_directive_for(&StepId::new("s9"))
        .is_none());

    let result = backend
        .call(
            "set_step_directive",
            json!({"step_id": "s1", "action": "dance"}),
        )
        .await
        .unwrap();
    assert!(result.is_error);
}

#[tokio::test]
async fn directives_cross_process_via_layout() {
    let dir = tempfile::tempdir().unwrap();
    let layout = cm_storage::StateLayout::new(dir.path());
    layout.ensure().unwrap();

    let (router_backend, _router_handle) =
        WorkflowSignalsBackend::with_layout(Some(layout.clone()));
    router_backend
        .call(
            "set_step_directive",
            json!({"step_id": "s1", "action": "stop", "reason": "done early"}),
        )
        .await
        .unwrap();

    // The engine side reads it from disk and consumes it.
    let (_engine_backend, engine_handle) =
        WorkflowSignalsBackend::with_layout(Some(layout.clone()));
    assert!(engine_handle
        .try_take_directive_for(&StepId::new("s0"))
        .is_none());
    let directive = engine_handle
        .try_take_directive_for(&StepId::new("s1"))
        .unwrap();
    assert_eq!(directive.action, cm_core::DirectiveAction::Stop);
    assert!(engine_handle
        .try_take_directive_for(&StepId::new("s1"))
        .is_none());
}

#[tokio::test]
async fn gate_and_decisions_cross_process_via_layout() {
    let dir = tempfile::tempdir().unwrap();
    let layout = cm_storage::StateLayout::new(dir.path());
    layout.ensure().unwrap();

    // The "engine" side sets the gate with its own handle...
    let (_engine_backend, engine_handle) =
        WorkflowSignalsBackend::with_layout(Some(layout.clone()));
    engine_handle.set_current_step(Some(StepId::new("s1")));

    // ...and a separate router process sees it through the file.
    let (router_backend, _router_handle) =
        WorkflowSignalsBackend::with_layout(Some(layout.clone()));
    let result = router_backend
        .call("propose_step_completion", propose_args("s9"))
        .await
        .unwrap();
    assert!(result.is_error);

    router_backend
        .call(
            "approve_step_transition",
            json!({"step_id": "s1", "decision": "approve"}),
        )
        .await
        .unwrap();

    // The engine handle picks the decision up from disk.
    let approval = engine_handle.try_take_decision().await.unwrap();
    assert_eq!(approval.decision, ApprovalDecision::Approve);
    // Consumed: a second read yields nothing.
    assert!(engine_handle.try_take_decision().await.is_none());
}

#[tokio::test]
async fn no_step_gate_accepts_any_step_id() {
    let (backend, handle) = WorkflowSignalsBackend::new();
    // No current step set
    let result = backend
        .call("propose_step_completion", propose_args("anything"))
        .await
        .unwrap();
    assert!(!result.is_error);
    assert!(handle.pending_proposal().is_some());
}

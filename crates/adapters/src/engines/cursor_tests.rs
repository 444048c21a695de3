// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn request() -> RunRequest {
    RunRequest {
        prompt: "p".into(),
        cwd: PathBuf::from("/project"),
        model: None,
        model_reasoning_effort: None,
        resume_session_id: None,
        resume_prompt: None,
    }
}

#[test]
fn invocation_uses_stream_json() {
    let adapter = CursorAdapter;
    let invocation = adapter.build_invocation(&request());
    assert_eq!(invocation.program, "cursor-agent");
    assert!(invocation.args.contains(&"stream-json".to_string()));
    assert!(!invocation.args.contains(&"--resume".to_string()));
}

#[test]
fn resume_adds_flag() {
    let adapter = CursorAdapter;
    let mut request = request();
    request.resume_session_id = Some(SessionId::new("c-9"));
    request.resume_prompt = Some("more".into());

    let invocation = adapter.build_invocation(&request);
    let pos = invocation.args.iter().position(|a| a == "--resume").unwrap();
    assert_eq!(invocation.args[pos + 1], "c-9");
    assert_eq!(invocation.stdin_payload, "more");
}

#[test]
fn parses_init_session() {
    let adapter = CursorAdapter;
    assert_eq!(
        adapter.parse_event_line(
            r#"{"type":"system","subtype":"init","sessionId":"cur-1","model":"composer-1"}"#
        ),
        Some(AgentEvent::Session {
            session_id: SessionId::new("cur-1")
        })
    );
}

#[test]
fn parses_assistant_text_blocks() {
    let adapter = CursorAdapter;
    let event = adapter.parse_event_line(
        r#"{"type":"assistant","message":{"content":[{"type":"text","text":"hello"},{"type":"text","text":"world"}]}}"#,
    );
    assert_eq!(
        event,
        Some(AgentEvent::Message {
            text: "hello\nworld".into()
        })
    );
}

#[test]
fn parses_result_usage() {
    let adapter = CursorAdapter;
    let event = adapter.parse_event_line(
        r#"{"type":"result","usage":{"inputTokens":10,"outputTokens":5,"costUsd":0.01}}"#,
    );
    let Some(AgentEvent::Telemetry { usage }) = event else {
        panic!("expected telemetry");
    };
    assert_eq!(usage.input_tokens, 10);
    assert_eq!(usage.cost_usd, Some(0.01));
}

#[test]
fn mcp_settings_are_json() {
    let adapter = CursorAdapter;
    let dir = tempfile::tempdir().unwrap();
    adapter.mcp_configure(dir.path(), McpScope::Project).unwrap();
    assert!(adapter
        .mcp_is_configured(dir.path(), McpScope::Project)
        .unwrap());
    assert!(dir.path().join(".cursor").join("mcp.json").is_file());
}

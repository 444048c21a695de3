// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::fake::FakeEngineAdapter;
use cm_core::AbortHandle;
use std::path::PathBuf;

fn request() -> RunRequest {
    RunRequest {
        prompt: "do the work".into(),
        cwd: std::env::temp_dir(),
        model: None,
        model_reasoning_effort: None,
        resume_session_id: None,
        resume_prompt: None,
    }
}

fn options(engine: Arc<dyn EngineAdapter>) -> RunOptions {
    RunOptions::new(engine, request())
}

#[tokio::test]
async fn happy_run_collects_session_message_and_usage() {
    let script = FakeEngineAdapter::script_emitting(&[
        r#"{"fake":"session","id":"s-1"}"#,
        r#"{"fake":"message","text":"hello"}"#,
        r#"{"fake":"usage","in":10,"out":4}"#,
        r#"{"fake":"usage","in":5,"out":2}"#,
    ]);
    let engine = Arc::new(FakeEngineAdapter::with_script(&script));

    let output = run(options(engine)).await.unwrap();
    assert_eq!(output.session_id, Some(cm_core::SessionId::new("s-1")));
    assert!(output.stdout.contains("hello"));
    assert_eq!(output.telemetry.input_tokens, 15);
    assert_eq!(output.telemetry.output_tokens, 6);
}

#[tokio::test]
async fn session_id_update_emitted_exactly_once() {
    let script = FakeEngineAdapter::script_emitting(&[
        r#"{"fake":"session","id":"s-1"}"#,
        r#"{"fake":"session","id":"s-2"}"#,
    ]);
    let engine = Arc::new(FakeEngineAdapter::with_script(&script));
    let (tx, mut rx) = tokio::sync::mpsc::channel(64);

    let mut options = options(engine);
    options.updates = Some(tx);
    let output = run(options).await.unwrap();

    let mut session_updates = 0;
    while let Ok(update) = rx.try_recv() {
        if matches!(update, RunnerUpdate::SessionId { .. }) {
            session_updates += 1;
        }
    }
    assert_eq!(session_updates, 1);
    assert_eq!(output.session_id, Some(cm_core::SessionId::new("s-1")));
}

#[tokio::test]
async fn non_event_lines_pass_through_in_order() {
    let engine = Arc::new(FakeEngineAdapter::with_script(
        "printf 'alpha\\nbeta\\n'",
    ));
    let (tx, mut rx) = tokio::sync::mpsc::channel(64);

    let mut options = options(engine);
    options.updates = Some(tx);
    run(options).await.unwrap();

    let mut data = Vec::new();
    while let Ok(update) = rx.try_recv() {
        if let RunnerUpdate::Data { chunk } = update {
            data.push(chunk);
        }
    }
    assert_eq!(data, vec!["alpha\n".to_string(), "beta\n".to_string()]);
}

#[tokio::test]
async fn prompt_is_delivered_on_stdin() {
    // `cat` echoes stdin back; the prompt must round-trip.
    let engine = Arc::new(FakeEngineAdapter::with_script("cat"));
    let output = run(options(engine)).await.unwrap();
    assert!(output.stdout.contains("do the work"));
}

#[tokio::test]
async fn nonzero_exit_uses_stderr_head() {
    let engine = Arc::new(FakeEngineAdapter::with_script(
        "echo 'first failure line' >&2; echo 'second line' >&2; exit 3",
    ));
    let err = run(options(engine)).await.unwrap_err();
    let RunnerError::AgentFailed { message, exit_code } = err else {
        panic!("expected AgentFailed, got {err:?}");
    };
    assert!(message.starts_with("first failure line"));
    assert_eq!(exit_code, Some(3));
}

#[tokio::test]
async fn stream_error_event_fails_even_with_exit_zero() {
    let script = FakeEngineAdapter::script_emitting(&[
        r#"{"fake":"message","text":"partial"}"#,
        r#"{"fake":"error","message":"quota exceeded"}"#,
    ]);
    let engine = Arc::new(FakeEngineAdapter::with_script(&script));
    let err = run(options(engine)).await.unwrap_err();
    let RunnerError::AgentFailed { message, exit_code } = err else {
        panic!("expected AgentFailed");
    };
    assert_eq!(message, "quota exceeded");
    assert_eq!(exit_code, Some(0));
}

#[tokio::test]
async fn empty_stdout_with_stderr_is_a_failure() {
    let engine = Arc::new(FakeEngineAdapter::with_script(
        "echo 'warning: something' >&2; exit 0",
    ));
    let err = run(options(engine)).await.unwrap_err();
    assert!(matches!(err, RunnerError::AgentFailed { .. }));
}

#[tokio::test]
async fn missing_binary_mentions_install_command() {
    #[derive(Clone)]
    struct MissingBinary(FakeEngineAdapter);
    impl EngineAdapter for MissingBinary {
        fn metadata(&self) -> &crate::engine::EngineMetadata {
            self.0.metadata()
        }
        fn is_authenticated(&self) -> bool {
            true
        }
        fn ensure_auth(&self, _force: bool) -> Result<(), crate::engine::EngineAdapterError> {
            Ok(())
        }
        fn clear_auth(&self) -> Result<(), crate::engine::EngineAdapterError> {
            Ok(())
        }
        fn build_invocation(&self, request: &RunRequest) -> crate::engine::Invocation {
            let mut invocation = self.0.build_invocation(request);
            invocation.program = "codemachine-no-such-binary".to_string();
            invocation
        }
        fn parse_event_line(&self, line: &str) -> Option<cm_core::AgentEvent> {
            self.0.parse_event_line(line)
        }
    }

    let engine = Arc::new(MissingBinary(FakeEngineAdapter::new()));
    let err = run(options(engine)).await.unwrap_err();
    let RunnerError::BinaryMissing { binary, install } = err else {
        panic!("expected BinaryMissing");
    };
    assert_eq!(binary, "codemachine-no-such-binary");
    assert_eq!(install, "install a POSIX shell");
}

#[tokio::test]
async fn abort_terminates_child_quickly() {
    let engine = Arc::new(FakeEngineAdapter::with_script("sleep 30"));
    let (handle, signal) = AbortHandle::new();

    let mut options = options(engine);
    options.abort = signal;
    let started = std::time::Instant::now();
    let task = tokio::spawn(run(options));

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    handle.abort();

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, RunnerError::Aborted));
    assert!(started.elapsed() < std::time::Duration::from_secs(20));
}

#[tokio::test]
async fn timeout_kills_child() {
    let engine = Arc::new(FakeEngineAdapter::with_script("sleep 30"));
    let mut options = options(engine);
    options.timeout = std::time::Duration::from_millis(150);

    let err = run(options).await.unwrap_err();
    assert!(matches!(err, RunnerError::Timeout(_)));
}

#[tokio::test]
async fn carriage_return_output_is_normalized() {
    let engine = Arc::new(FakeEngineAdapter::with_script(
        "printf 'step 1/3\\rstep 2/3\\rstep 3/3\\n'",
    ));
    let output = run(options(engine)).await.unwrap();
    assert_eq!(output.stdout, "step 3/3\n");
}

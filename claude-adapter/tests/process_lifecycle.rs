//! Process lifecycle tests against `/bin/sh` scripts standing in for the CLI.
//!
//! Each test hands a shell script to the runner through
//! `PreparedCommand::raw`, so no Claude installation is needed.

#![cfg(unix)]

use chameleon_claude::cmd::PreparedCommand;
use chameleon_claude::{
    run_claude, ClaudeError, InvocationHandle, ProcessState, StreamEvent, StreamSinks, TokenUsage,
};
use std::time::Duration;
use tokio::sync::mpsc;

fn sh(script: &str) -> PreparedCommand {
    PreparedCommand::raw("/bin/sh", ["-c", script])
}

const HAPPY_SCRIPT: &str = r#"
printf '%s\n' '{"type":"system","subtype":"init","model":"deepseek-v3-250324","cwd":"/w","tools":["Bash"]}'
echo 'diagnostic: not json'
printf '%s\n' '{"type":"assistant","message":{"content":[{"type":"text","text":"Hel"},{"type":"tool_use","id":"t1","name":"Read","input":{"file_path":"/w/a.txt"}}]}}'
printf '%s\n' '{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"t1","content":"file body"}]}}'
printf '%s\n' '{"type":"result","subtype":"success","result":"Hello","usage":{"input_tokens":10,"output_tokens":5}}'
"#;

#[tokio::test]
async fn successful_run_streams_events_and_assembles_result() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = InvocationHandle::new();
    let result = run_claude(
        &sh(HAPPY_SCRIPT),
        Duration::from_secs(30),
        StreamSinks::events(tx),
        &handle,
    )
    .await
    .expect("run should succeed");

    assert_eq!(result.content, "Hello");
    assert_eq!(result.model, "deepseek-v3-250324");
    assert_eq!(result.usage, TokenUsage { input_tokens: 10, output_tokens: 5 });
    assert_eq!(result.finish_reason.as_deref(), Some("stop"));
    assert_eq!(handle.state(), ProcessState::Exited(0));

    let mut kinds = Vec::new();
    while let Some(event) = rx.recv().await {
        kinds.push(match event {
            StreamEvent::Init(_) => "init",
            StreamEvent::Assistant(_) => "assistant",
            StreamEvent::User(_) => "user",
            StreamEvent::Success(_) => "success",
            StreamEvent::Unknown(_) => "unknown",
        });
    }
    assert_eq!(kinds, vec!["init", "assistant", "user", "success"]);
}

#[tokio::test]
async fn text_sink_receives_assistant_text_only() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    run_claude(
        &sh(HAPPY_SCRIPT),
        Duration::from_secs(30),
        StreamSinks::text(tx),
        &InvocationHandle::new(),
    )
    .await
    .expect("run should succeed");

    let mut chunks = Vec::new();
    while let Some(chunk) = rx.recv().await {
        chunks.push(chunk);
    }
    assert_eq!(chunks, vec!["Hel".to_string()]);
}

#[tokio::test]
async fn stdin_is_closed_so_reading_it_does_not_block() {
    let script = r#"cat > /dev/null; printf '%s\n' '{"type":"result","subtype":"success","result":"done"}'"#;
    let result = run_claude(
        &sh(script),
        Duration::from_secs(10),
        StreamSinks::default(),
        &InvocationHandle::new(),
    )
    .await
    .expect("cat should see EOF immediately");
    assert_eq!(result.content, "done");
}

#[tokio::test]
async fn nonzero_exit_carries_code_and_stderr() {
    let err = run_claude(
        &sh("echo 'auth failed' >&2; exit 3"),
        Duration::from_secs(10),
        StreamSinks::default(),
        &InvocationHandle::new(),
    )
    .await
    .unwrap_err();

    match err {
        ClaudeError::NonZeroExit { exit_code, stderr } => {
            assert_eq!(exit_code, 3);
            assert!(stderr.contains("auth failed"), "stderr was: {stderr}");
        }
        other => panic!("expected NonZeroExit, got {other:?}"),
    }
}

#[tokio::test]
async fn plain_text_output_is_returned_verbatim() {
    let result = run_claude(
        &sh("printf 'oops'"),
        Duration::from_secs(10),
        StreamSinks::default(),
        &InvocationHandle::new(),
    )
    .await
    .expect("run should succeed");
    assert_eq!(result.content, "oops");
    assert_eq!(result.model, "unknown");
    assert_eq!(result.usage, TokenUsage::default());
}

#[tokio::test]
async fn trailing_newlines_survive_the_raw_fallback() {
    let result = run_claude(
        &sh(r"printf 'oops\r\n'"),
        Duration::from_secs(10),
        StreamSinks::default(),
        &InvocationHandle::new(),
    )
    .await
    .expect("run should succeed");
    assert_eq!(result.content, "oops\r\n");
}

const SUCCESS_LINE: &str =
    r#"{"type":"result","subtype":"success","result":"Hello","usage":{"input_tokens":10,"output_tokens":5}}"#;

#[tokio::test]
async fn invalid_utf8_on_stdout_does_not_hide_the_result() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let script = format!(r"printf 'diag \377\376 bytes\n'; printf '%s\n' '{SUCCESS_LINE}'");
    let result = run_claude(
        &sh(&script),
        Duration::from_secs(10),
        StreamSinks::events(tx),
        &InvocationHandle::new(),
    )
    .await
    .expect("run should succeed");

    assert_eq!(result.content, "Hello");
    assert_eq!(result.finish_reason.as_deref(), Some("stop"));
    assert_eq!(result.usage, TokenUsage { input_tokens: 10, output_tokens: 5 });
    assert!(matches!(rx.recv().await, Some(StreamEvent::Success(_))));
}

#[tokio::test]
async fn invalid_utf8_followed_by_heavy_output_still_succeeds() {
    let script = format!(
        r#"printf 'diag \377\376 bytes\n'
i=0
while [ "$i" -lt 5000 ]; do printf '{{"n":%d}}\n' "$i"; i=$((i+1)); done
printf '%s\n' '{SUCCESS_LINE}'"#
    );
    let result = run_claude(
        &sh(&script),
        Duration::from_secs(30),
        StreamSinks::default(),
        &InvocationHandle::new(),
    )
    .await
    .expect("a clean exit must not become a failure");
    assert_eq!(result.content, "Hello");
    assert_eq!(result.stream_messages.map(|m| m.len()), Some(5001));
}

#[tokio::test]
async fn invalid_utf8_on_stderr_is_still_reported() {
    let err = run_claude(
        &sh(r"printf 'bad \377 byte\nauth failed\n' >&2; exit 4"),
        Duration::from_secs(10),
        StreamSinks::default(),
        &InvocationHandle::new(),
    )
    .await
    .unwrap_err();

    match err {
        ClaudeError::NonZeroExit { exit_code, stderr } => {
            assert_eq!(exit_code, 4);
            assert!(stderr.contains("bad \u{FFFD} byte"), "stderr was: {stderr:?}");
            assert!(stderr.contains("auth failed"), "stderr was: {stderr:?}");
        }
        other => panic!("expected NonZeroExit, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_executable_is_a_spawn_failure() {
    let handle = InvocationHandle::new();
    let err = run_claude(
        &PreparedCommand::raw("/definitely/not/here/claude", ["-p", "x"]),
        Duration::from_secs(10),
        StreamSinks::default(),
        &handle,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ClaudeError::SpawnFailed { .. }), "got {err:?}");
    assert_eq!(handle.state(), ProcessState::SpawnError);
}

#[tokio::test]
async fn timeout_kills_the_process() {
    let handle = InvocationHandle::new();
    let started = std::time::Instant::now();
    let err = run_claude(
        &sh("sleep 30"),
        Duration::from_millis(200),
        StreamSinks::default(),
        &handle,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ClaudeError::Timeout(d) if d == Duration::from_millis(200)));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(handle.state(), ProcessState::TimedOut);
}

#[tokio::test]
async fn exit_racing_the_timeout_settles_exactly_once() {
    // Limits sweep from "already due" to "never due" so both arms get to win.
    let limits_ms = [0, 0, 0, 0, 0, 1, 2, 3, 5, 8, 13, 21, 50, 100, 5_000, 5_000];
    let (mut exits, mut timeouts) = (0, 0);
    for ms in limits_ms {
        let handle = InvocationHandle::new();
        let outcome = run_claude(
            &sh("exit 0"),
            Duration::from_millis(ms),
            StreamSinks::default(),
            &handle,
        )
        .await;

        let terminal = handle.state();
        match outcome {
            Ok(_) => {
                assert_eq!(terminal, ProcessState::Exited(0));
                exits += 1;
            }
            Err(ClaudeError::Timeout(_)) => {
                assert_eq!(terminal, ProcessState::TimedOut);
                timeouts += 1;
            }
            Err(other) => panic!("unexpected outcome {other:?}"),
        }
        handle.cancel();
        assert_eq!(handle.state(), terminal);
    }
    assert!(exits > 0, "no run finished before its limit");
    assert!(timeouts > 0, "no run hit its limit");
}

#[tokio::test]
async fn cancel_stops_processing_and_rejects() {
    let script = r#"
printf '%s\n' '{"type":"system","subtype":"init","model":"m"}'
sleep 30
printf '%s\n' '{"type":"result","subtype":"success","result":"too late"}'
"#;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = InvocationHandle::new();
    let runner = {
        let handle = handle.clone();
        let command = sh(script);
        tokio::spawn(async move {
            run_claude(&command, Duration::from_secs(60), StreamSinks::events(tx), &handle).await
        })
    };

    let first = tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("init event should arrive")
        .expect("channel open");
    assert!(matches!(first, StreamEvent::Init(_)));

    handle.cancel();
    let outcome = tokio::time::timeout(Duration::from_secs(10), runner)
        .await
        .expect("runner should finish after cancel")
        .expect("runner task should not panic");
    assert!(matches!(outcome, Err(ClaudeError::Cancelled)), "got {outcome:?}");
    assert_eq!(handle.state(), ProcessState::Cancelled);

    // The sender is gone with the aborted reader; nothing else was delivered.
    let rest = tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("channel should close");
    assert!(rest.is_none(), "unexpected event after cancel: {rest:?}");
}

#[tokio::test]
async fn cancel_after_exit_is_a_no_op() {
    let handle = InvocationHandle::new();
    run_claude(
        &sh("exit 0"),
        Duration::from_secs(10),
        StreamSinks::default(),
        &handle,
    )
    .await
    .expect("run should succeed");
    handle.cancel();
    assert_eq!(handle.state(), ProcessState::Exited(0));
}

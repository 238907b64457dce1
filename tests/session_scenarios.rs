//! Session scenarios against stand-in EventsTrace processes
//!
//! Run with: cargo test --test session_scenarios

use std::time::{Duration, Instant};

use etrace_core::{Error, HarnessConfig};
use etrace_session::test_utils::script_session;
use etrace_session::{CancelSignal, CancelSource, SessionState};
use serial_test::serial;

// ─────────────────────────────────────────────────────────
// Test Data Helpers
// ─────────────────────────────────────────────────────────

/// init, tick, tick, done on stdout, then stay alive until killed
const TICKS: &str = r#"
echo '{"type":"init"}'
echo '{"type":"tick","n":1}'
echo '{"type":"tick","n":2}'
echo '{"type":"done"}'
exec sleep 30
"#;

fn config() -> HarnessConfig {
    HarnessConfig::default()
        .with_ready_timeout(Duration::from_secs(5))
        .with_event_timeout(Duration::from_secs(5))
        .with_reader_join_timeout(Duration::from_millis(500))
}

// ─────────────────────────────────────────────────────────
// Ordering and Filtering
// ─────────────────────────────────────────────────────────

#[tokio::test]
#[serial]
async fn test_tick_scenario() {
    let config = config().with_event_timeout(Duration::from_millis(300));
    let (mut session, sink) = script_session(TICKS, config);

    session.start(CancelSignal::never()).await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.ready_line(), Some(r#"{"type":"init"}"#));

    let first = session.next_event(&["tick"]).await.unwrap();
    assert_eq!(first, r#"{"type":"tick","n":1}"#);

    let second = session.next_event(&["tick"]).await.unwrap();
    assert_eq!(second, r#"{"type":"tick","n":2}"#);

    // Only "done" remains and the child is still alive: this must time out
    let err = session.next_event(&["tick"]).await.unwrap_err();
    match &err {
        Error::EventTimeout { kinds, waited, .. } => {
            assert_eq!(kinds, &vec!["tick".to_string()]);
            assert_eq!(*waited, Duration::from_millis(300));
        }
        other => panic!("expected event timeout, got {:?}", other),
    }
    assert!(err.is_fatal());
    assert_eq!(session.state(), SessionState::Failed);
    assert!(sink.contents().starts_with("===== EventsTrace Stderr ====="));

    session.stop().await.unwrap();
}

#[tokio::test]
async fn test_non_utf8_file_name_does_not_hide_later_events() {
    let script = r#"
echo '{"type":"init"}'
printf '{"event_type":"FILE_DELETE","path":"/tmp/\377"}\n'
echo '{"type":"tick"}'
exec sleep 30
"#;
    let (mut session, _sink) = script_session(script, config());
    session.start(CancelSignal::never()).await.unwrap();

    let deleted = session.next_trace_event(&["FILE_DELETE"]).await.unwrap();
    assert_eq!(
        deleted.field("path").and_then(|v| v.as_str()),
        Some("/tmp/\u{FFFD}")
    );

    let tick = session.next_event(&["tick"]).await.unwrap();
    assert_eq!(tick, r#"{"type":"tick"}"#);

    session.stop().await.unwrap();
}

#[tokio::test]
async fn test_ready_line_is_not_redelivered() {
    let (mut session, _sink) = script_session(TICKS, config());
    session.start(CancelSignal::never()).await.unwrap();

    // "init" was consumed by the readiness gate
    let event = session.next_trace_event(&["init", "done"]).await.unwrap();
    assert_eq!(event.kind, "done");

    session.stop().await.unwrap();
}

#[tokio::test]
async fn test_malformed_lines_are_skipped() {
    let script = r#"
echo 'EventsTrace initialized'
echo 'libbpf: loading object'
echo '{"event_type":'
echo '{"pids":{"tid":1}}'
echo '{"event_type":"PROCESS_EXEC","filename":"/bin/true"}'
exec sleep 30
"#;
    let (mut session, _sink) = script_session(script, config());
    session.start(CancelSignal::never()).await.unwrap();

    let event = session.next_trace_event(&["PROCESS_EXEC"]).await.unwrap();
    assert_eq!(event.field("filename").unwrap(), "/bin/true");

    session.stop().await.unwrap();
}

#[tokio::test]
async fn test_mandatory_flags_reach_the_child() {
    let script = r#"
echo ready
printf '{"type":"argv","args":"%s"}\n' "$*"
exec sleep 30
"#;
    let (mut session, _sink) = script_session(script, config());
    session.start(CancelSignal::never()).await.unwrap();

    let event = session.next_trace_event(&["argv"]).await.unwrap();
    assert_eq!(
        event.field("args").unwrap(),
        "--print-initialized --unbuffer-stdout --libbpf-verbose --set-bpf-tramp"
    );

    session.stop().await.unwrap();
}

// ─────────────────────────────────────────────────────────
// Failure Paths
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_bad_path_reports_launch_failure() {
    let config = config().with_binary("/nonexistent/EventsTrace");
    let mut session = etrace_session::EventsTraceSession::new(config, vec![]);

    let started = Instant::now();
    let err = session.start(CancelSignal::never()).await.unwrap_err();

    assert!(matches!(err, Error::Launch { .. }));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(session.pid(), None);
}

#[tokio::test]
#[serial]
async fn test_ready_timeout_dumps_stderr() {
    let script = r#"
echo 'libbpf: failed to find BTF' >&2
echo 'Could not create event context' >&2
exec sleep 30
"#;
    let config = config().with_ready_timeout(Duration::from_millis(300));
    let (mut session, sink) = script_session(script, config);

    let err = session.start(CancelSignal::never()).await.unwrap_err();
    assert!(matches!(err, Error::ReadyTimeout { .. }));
    assert_eq!(
        err.stderr_lines(),
        [
            "libbpf: failed to find BTF".to_string(),
            "Could not create event context".to_string()
        ]
    );
    assert_eq!(
        sink.contents(),
        "===== EventsTrace Stderr =====\nlibbpf: failed to find BTF\nCould not create event context\n"
    );
    assert_eq!(session.state(), SessionState::Failed);

    session.stop().await.unwrap();
}

#[tokio::test]
async fn test_outer_cancel_aborts_readiness() {
    let (mut session, _sink) = script_session("exec sleep 30", config());
    let shutdown = CancelSource::new();
    let trigger = shutdown.clone();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = session.start(shutdown.signal()).await.unwrap_err();
    assert!(matches!(err, Error::ReadyTimeout { .. }));
    assert!(started.elapsed() < Duration::from_secs(5));

    session.stop().await.unwrap();
}

#[tokio::test]
async fn test_child_exit_before_output_is_stdout_closed() {
    let (mut session, _sink) = script_session("echo 'bad flags' >&2; exit 1", config());

    let err = session.start(CancelSignal::never()).await.unwrap_err();
    assert!(matches!(err, Error::StdoutClosed { .. }));
    assert_eq!(session.state(), SessionState::Failed);

    session.stop().await.unwrap();
}

#[tokio::test]
async fn test_child_exit_while_waiting_for_event() {
    let script = r#"
echo '{"type":"init"}'
echo '{"type":"tick"}'
"#;
    let (mut session, _sink) = script_session(script, config());
    session.start(CancelSignal::never()).await.unwrap();

    let started = Instant::now();
    let err = session.next_event(&["done"]).await.unwrap_err();
    assert!(matches!(err, Error::StdoutClosed { .. }));
    assert!(started.elapsed() < Duration::from_secs(5));

    session.stop().await.unwrap();
}

#[tokio::test]
async fn test_failed_session_rejects_queries() {
    let config = config().with_event_timeout(Duration::from_millis(100));
    let (mut session, _sink) = script_session(TICKS, config);
    session.start(CancelSignal::never()).await.unwrap();

    assert!(session.next_event(&["missing"]).await.is_err());
    let err = session.next_event(&["tick"]).await.unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidState {
            expected: "ready",
            actual: "failed"
        }
    ));

    session.stop().await.unwrap();
}

// ─────────────────────────────────────────────────────────
// Backpressure and Teardown
// ─────────────────────────────────────────────────────────

#[tokio::test]
#[serial]
async fn test_full_queue_loses_no_lines() {
    let script = r#"
echo '{"type":"init"}'
i=1
while [ $i -le 50 ]; do
  echo "{\"type\":\"tick\",\"n\":$i}"
  i=$((i + 1))
done
exec sleep 30
"#;
    let config = config().with_queue_capacity(4);
    let (mut session, _sink) = script_session(script, config);
    session.start(CancelSignal::never()).await.unwrap();

    // Let the child fill the queue while nobody drains it
    tokio::time::sleep(Duration::from_millis(200)).await;

    for n in 1..=50 {
        let event = session.next_trace_event(&["tick"]).await.unwrap();
        assert_eq!(event.field("n").unwrap(), n);
    }

    session.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let (mut session, _sink) = script_session(TICKS, config());
    session.start(CancelSignal::never()).await.unwrap();

    session.stop().await.unwrap();
    assert_eq!(session.state(), SessionState::Stopped);

    session.stop().await.unwrap();
    assert_eq!(session.state(), SessionState::Stopped);
}

#[tokio::test]
async fn test_no_lines_after_stop() {
    let (mut session, sink) = script_session(TICKS, config());
    session.start(CancelSignal::never()).await.unwrap();
    session.stop().await.unwrap();

    let err = session.next_event(&["tick"]).await.unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidState {
            actual: "stopped",
            ..
        }
    ));
    assert!(session.dump_stderr().is_empty());
    assert_eq!(sink.contents(), "===== EventsTrace Stderr =====\n");
}

#[tokio::test]
#[serial]
async fn test_stop_with_grandchild_holding_pipe() {
    // `sleep` is a grandchild here and keeps stdout open after sh is killed
    let script = r#"
echo '{"type":"init"}'
sleep 30
"#;
    let config = config().with_reader_join_timeout(Duration::from_millis(200));
    let (mut session, _sink) = script_session(script, config);
    session.start(CancelSignal::never()).await.unwrap();

    let started = Instant::now();
    session.stop().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(session.state(), SessionState::Stopped);
}

#[tokio::test]
async fn test_stderr_dump_while_running() {
    let script = r#"
echo 'verbose: attaching tracepoints' >&2
echo '{"type":"init"}'
exec sleep 30
"#;
    let (mut session, sink) = script_session(script, config());
    session.start(CancelSignal::never()).await.unwrap();

    // Give the stderr reader a moment; the dump never waits on its own
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(session.dump_stderr(), vec!["verbose: attaching tracepoints"]);
    assert_eq!(session.state(), SessionState::Ready);
    assert!(sink.contents().contains("verbose: attaching tracepoints"));

    session.stop().await.unwrap();
}

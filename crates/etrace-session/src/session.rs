//! EventsTrace session lifecycle
//!
//! One [`EventsTraceSession`] owns exactly one EventsTrace child for the
//! lifetime of a test. Output flows one way:
//!
//! ```text
//! child ─ stdout pipe ─ reader task ─ bounded queue ─ readiness gate / event filter
//!       ─ stderr pipe ─ reader task ─ bounded queue ─ diagnostic dump
//! ```
//!
//! Queries take `&mut self`, so only one consumer drains stdout at a time.

use std::fmt;
use std::io::Write;
use std::process::ExitStatus;
use std::time::Instant;

use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use etrace_core::prelude::*;
use etrace_core::{Event, HarnessConfig};

use crate::cancel::{CancelSignal, CancelSource};
use crate::dump::{drain_queue, write_dump};
use crate::filter::next_matching;
use crate::process::{self, SpawnedProcess};
use crate::reader::{read_lines, StreamKind};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Configured, not launched
    Created,
    /// Launched, readers attached, no output seen yet
    Started,
    /// First stdout line observed
    Ready,
    /// Child killed and reaped
    Stopped,
    /// A fatal error occurred; terminal
    Failed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Created => "created",
            SessionState::Started => "started",
            SessionState::Ready => "ready",
            SessionState::Stopped => "stopped",
            SessionState::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single EventsTrace child process and its two output queues.
///
/// Readiness is "any stdout line at all". EventsTrace prints its
/// initialized marker first, but an early diagnostic on stdout would also
/// count as ready.
pub struct EventsTraceSession {
    config: HarnessConfig,
    args: Vec<String>,
    state: SessionState,
    child: Option<Child>,
    pid: Option<u32>,
    stdout_rx: Option<mpsc::Receiver<String>>,
    stderr_rx: Option<mpsc::Receiver<String>>,
    readers: Vec<(StreamKind, JoinHandle<usize>)>,
    cancel: Option<CancelSource>,
    ready_line: Option<String>,
    dump_sink: Box<dyn Write + Send>,
}

impl EventsTraceSession {
    /// Configure a session. Nothing is launched until [`start`](Self::start).
    pub fn new(config: HarnessConfig, args: Vec<String>) -> Self {
        Self {
            config,
            args,
            state: SessionState::Created,
            child: None,
            pid: None,
            stdout_rx: None,
            stderr_rx: None,
            readers: Vec::new(),
            cancel: None,
            ready_line: None,
            dump_sink: Box::new(std::io::stderr()),
        }
    }

    /// Send diagnostic dumps somewhere other than the process's stderr
    pub fn with_dump_sink(mut self, sink: Box<dyn Write + Send>) -> Self {
        self.dump_sink = sink;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// The stdout line that satisfied the readiness gate
    pub fn ready_line(&self) -> Option<&str> {
        self.ready_line.as_deref()
    }

    /// Program and full argument vector, mandatory flags included
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.config.binary.display().to_string()];
        parts.extend(process::build_args(&self.args));
        parts.join(" ")
    }

    /// Launch EventsTrace and wait until it prints its first stdout line.
    ///
    /// `cancel` is the caller's outer signal: it aborts the readiness wait
    /// and is propagated to both readers. Readiness also gives up after
    /// `ready_timeout`. Every failure here is fatal for the session and is
    /// never retried.
    pub async fn start(&mut self, cancel: CancelSignal) -> Result<()> {
        self.expect_state(SessionState::Created)?;

        let SpawnedProcess {
            child,
            stdout,
            stderr,
            pid,
        } = match process::spawn(&self.config.binary, &self.args) {
            Ok(spawned) => spawned,
            Err(e) => {
                error!("failed to start EventsTrace: {}", e);
                self.state = SessionState::Failed;
                return Err(e);
            }
        };

        let readers_cancel = cancel.child();
        let capacity = self.config.queue_capacity();
        let (stdout_tx, stdout_rx) = mpsc::channel(capacity);
        let (stderr_tx, stderr_rx) = mpsc::channel(capacity);

        self.readers = vec![
            (
                StreamKind::Stdout,
                tokio::spawn(read_lines(
                    stdout,
                    stdout_tx,
                    readers_cancel.signal(),
                    StreamKind::Stdout,
                )),
            ),
            (
                StreamKind::Stderr,
                tokio::spawn(read_lines(
                    stderr,
                    stderr_tx,
                    readers_cancel.signal(),
                    StreamKind::Stderr,
                )),
            ),
        ];

        self.child = Some(child);
        self.pid = pid;
        self.stdout_rx = Some(stdout_rx);
        self.stderr_rx = Some(stderr_rx);
        self.cancel = Some(readers_cancel);
        self.transition(SessionState::Started);

        self.wait_ready(cancel).await
    }

    /// Readiness gate: first stdout line, outer cancellation, or deadline
    async fn wait_ready(&mut self, mut cancel: CancelSignal) -> Result<()> {
        let deadline = self.config.ready_timeout();
        let started = Instant::now();

        let Some(rx) = self.stdout_rx.as_mut() else {
            return Err(Error::invalid_state("started", self.state.as_str()));
        };

        let first = first_line(rx, &mut cancel, deadline).await;

        match first {
            Some(Some(line)) => {
                info!("EventsTrace ready after {:?}: {}", started.elapsed(), line);
                self.ready_line = Some(line);
                self.transition(SessionState::Ready);
                Ok(())
            }
            Some(None) => Err(self.fail(|stderr| Error::StdoutClosed { stderr })),
            None => {
                let waited = started.elapsed();
                Err(self.fail(|stderr| Error::ReadyTimeout { waited, stderr }))
            }
        }
    }

    /// Return the next stdout line whose kind is in `kinds`.
    ///
    /// Earlier non-matching lines are consumed. Gives up after
    /// `event_timeout` (measured from this call), or as soon as stdout
    /// closes; both dump stderr and fail the session.
    pub async fn next_event<S: AsRef<str>>(&mut self, kinds: &[S]) -> Result<String> {
        self.next_trace_event(kinds).await.map(|event| event.raw)
    }

    /// Like [`next_event`](Self::next_event) but returns the parsed view
    pub async fn next_trace_event<S: AsRef<str>>(&mut self, kinds: &[S]) -> Result<Event> {
        self.expect_state(SessionState::Ready)?;

        let waited = self.config.event_timeout();
        let Some(rx) = self.stdout_rx.as_mut() else {
            return Err(Error::invalid_state("ready", self.state.as_str()));
        };

        let outcome = timeout(waited, next_matching(rx, kinds)).await;
        match outcome {
            Ok(Some(event)) => {
                debug!("matched {} event", event.kind);
                Ok(event)
            }
            Ok(None) => Err(self.fail(|stderr| Error::StdoutClosed { stderr })),
            Err(_) => {
                let kinds: Vec<String> = kinds.iter().map(|k| k.as_ref().to_string()).collect();
                Err(self.fail(|stderr| Error::EventTimeout {
                    kinds,
                    waited,
                    stderr,
                }))
            }
        }
    }

    /// Print everything already buffered on stderr to the dump sink.
    ///
    /// Does not wait for more output and does not change session state.
    /// Returns the dumped lines.
    pub fn dump_stderr(&mut self) -> Vec<String> {
        let lines = self
            .stderr_rx
            .as_mut()
            .map(drain_queue)
            .unwrap_or_default();
        write_dump(self.dump_sink.as_mut(), &lines);
        lines
    }

    /// Kill and reap the child, then close both queues.
    ///
    /// Idempotent: without a live child (never started, or already
    /// stopped) this is a no-op. A kill or wait failure is returned and the
    /// child is kept so `stop` can be retried.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            debug!("stop requested with no running EventsTrace ({})", self.state);
            return Ok(());
        };

        info!("Stopping EventsTrace (PID {:?})", self.pid);
        if let Some(cancel) = &self.cancel {
            cancel.cancel();
        }

        match kill_and_reap(&mut child).await {
            Ok(status) => info!("EventsTrace exited with status: {}", status),
            Err(e) => {
                error!("{}", e);
                self.child = Some(child);
                return Err(e);
            }
        }

        // Dropping the receivers closes the queues; readers parked on a full
        // queue see the closed channel and exit.
        self.stdout_rx = None;
        self.stderr_rx = None;
        self.join_readers().await;

        if self.state != SessionState::Failed {
            self.transition(SessionState::Stopped);
        }
        Ok(())
    }

    async fn join_readers(&mut self) {
        let grace = self.config.reader_join_timeout();
        for (kind, mut handle) in std::mem::take(&mut self.readers) {
            match timeout(grace, &mut handle).await {
                Ok(Ok(lines)) => debug!("{} reader joined ({} lines)", kind, lines),
                Ok(Err(e)) => warn!("{} reader task failed: {}", kind, e),
                Err(_) => {
                    warn!(
                        "{} reader still blocked in a read after {:?}, aborting",
                        kind, grace
                    );
                    handle.abort();
                }
            }
        }
    }

    /// Dump stderr, mark the session failed, and build the error to report
    fn fail(&mut self, make: impl FnOnce(Vec<String>) -> Error) -> Error {
        let stderr = self.dump_stderr();
        self.transition(SessionState::Failed);
        let err = make(stderr);
        error!("{}, dumped stderr above", err);
        err
    }

    fn expect_state(&self, expected: SessionState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::invalid_state(expected.as_str(), self.state.as_str()))
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!("session {} -> {}", self.state, next);
        self.state = next;
    }
}

/// Wait for the first stdout line.
///
/// `Some(Some(line))` on output, `Some(None)` if stdout closed, `None` on
/// cancellation or deadline. A line that is already queued always wins.
async fn first_line(
    rx: &mut mpsc::Receiver<String>,
    cancel: &mut CancelSignal,
    deadline: std::time::Duration,
) -> Option<Option<String>> {
    tokio::select! {
        biased;
        line = rx.recv() => Some(line),
        _ = cancel.cancelled() => None,
        _ = tokio::time::sleep(deadline) => None,
    }
}

/// Kill the child and wait for its exit status.
///
/// A kill error on a child that has already exited is not an error.
async fn kill_and_reap(child: &mut Child) -> Result<ExitStatus> {
    if let Err(e) = child.start_kill() {
        return match child.try_wait() {
            Ok(Some(status)) => {
                debug!("EventsTrace had already exited");
                Ok(status)
            }
            _ => Err(Error::teardown(format!("kill failed: {}", e))),
        };
    }

    child
        .wait()
        .await
        .map_err(|e| Error::teardown(format!("wait failed: {}", e)))
}

impl fmt::Debug for EventsTraceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventsTraceSession")
            .field("binary", &self.config.binary)
            .field("args", &self.args)
            .field("state", &self.state)
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

impl Drop for EventsTraceSession {
    fn drop(&mut self) {
        if self.child.is_some() {
            warn!("EventsTraceSession dropped without stop(), killing EventsTrace");
            if let Some(cancel) = &self.cancel {
                cancel.cancel();
            }
        }
        // kill_on_drop(true) on the Child takes care of the process itself
    }
}

//! Trace runner - drive one session from start to stop
//!
//! Starts EventsTrace, waits for readiness, writes the next `count`
//! matching events to the output one per line, then stops the child.

use std::io::Write;

use etrace_core::prelude::*;
use etrace_core::{EventKind, HarnessConfig};
use etrace_session::{CancelSignal, EventsTraceSession};

/// What to launch and which events to collect
#[derive(Debug, Clone)]
pub struct TraceOptions {
    pub config: HarnessConfig,
    /// Extra arguments passed before the mandatory flags
    pub args: Vec<String>,
    /// Accepted kinds; empty means every kind EventsTrace is known to emit
    pub kinds: Vec<String>,
    /// Number of matching events to print before stopping
    pub count: usize,
}

impl TraceOptions {
    pub fn new(config: HarnessConfig) -> Self {
        Self {
            config,
            args: Vec::new(),
            kinds: Vec::new(),
            count: 1,
        }
    }

    /// The kind set the filter will accept
    pub fn accepted_kinds(&self) -> Vec<String> {
        if self.kinds.is_empty() {
            EventKind::ALL.iter().map(|k| k.to_string()).collect()
        } else {
            self.kinds.clone()
        }
    }
}

/// Run a full session, writing matched events to `out`.
///
/// Returns the number of events written. The child is always stopped
/// before returning; a fatal session error takes precedence over a
/// teardown error.
pub async fn run_trace(
    options: TraceOptions,
    cancel: CancelSignal,
    out: &mut dyn Write,
) -> Result<usize> {
    let kinds = options.accepted_kinds();
    let mut session = EventsTraceSession::new(options.config, options.args);
    info!("Running {}", session.command_line());

    let collected = collect(&mut session, cancel, &kinds, options.count, out).await;
    let stopped = session.stop().await;

    match (collected, stopped) {
        (Ok(written), Ok(())) => Ok(written),
        (Err(e), Ok(())) => Err(e),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Err(stop_err)) => {
            warn!("EventsTrace teardown also failed: {}", stop_err);
            Err(e)
        }
    }
}

async fn collect(
    session: &mut EventsTraceSession,
    cancel: CancelSignal,
    kinds: &[String],
    count: usize,
    out: &mut dyn Write,
) -> Result<usize> {
    session.start(cancel).await?;

    for written in 0..count {
        let line = session.next_event(kinds).await?;
        writeln!(out, "{}", line)
            .and_then(|_| out.flush())
            .context("writing event")?;
        debug!("wrote event {}/{}", written + 1, count);
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_kinds_default_to_known_kinds() {
        let options = TraceOptions::new(HarnessConfig::default());
        assert_eq!(
            options.accepted_kinds(),
            vec![
                "PROCESS_FORK",
                "PROCESS_EXEC",
                "PROCESS_EXIT",
                "PROCESS_SETSID",
                "FILE_DELETE"
            ]
        );
    }

    #[test]
    fn test_accepted_kinds_explicit() {
        let mut options = TraceOptions::new(HarnessConfig::default());
        options.kinds = vec!["tick".to_string()];
        assert_eq!(options.accepted_kinds(), vec!["tick"]);
    }
}

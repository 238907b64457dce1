//! Test utilities for driving sessions with stand-in processes
//!
//! Real EventsTrace needs root and a BPF-capable kernel, so tests launch
//! `sh -c <script>` instead. The mandatory flags land in the script's `$@`.

use std::io::Write;
use std::sync::{Arc, Mutex};

use etrace_core::HarnessConfig;

use super::EventsTraceSession;

/// Build a session that runs `script` under `sh -c`.
///
/// Diagnostic dumps go to the returned [`SharedSink`].
pub fn script_session(script: &str, config: HarnessConfig) -> (EventsTraceSession, SharedSink) {
    let sink = SharedSink::default();
    let session = EventsTraceSession::new(config.with_binary("sh"), script_args(script))
        .with_dump_sink(Box::new(sink.clone()));
    (session, sink)
}

/// Arguments for `sh -c <script>` with `$0` set to `etrace`
pub fn script_args(script: &str) -> Vec<String> {
    vec!["-c".to_string(), script.to_string(), "etrace".to_string()]
}

/// A cloneable in-memory writer for capturing diagnostic dumps
#[derive(Debug, Clone, Default)]
pub struct SharedSink {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl SharedSink {
    /// Everything written so far, lossily decoded
    pub fn contents(&self) -> String {
        let buf = self.buf.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl Write for SharedSink {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        let mut buf = self.buf.lock().unwrap_or_else(|e| e.into_inner());
        buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

//! Stderr diagnostic dump

use std::io::Write;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use etrace_core::prelude::*;

pub const DUMP_HEADER: &str = "===== EventsTrace Stderr =====";

/// Take every line currently buffered in `rx`, oldest first.
///
/// Never waits: stops as soon as the queue is empty or closed.
pub fn drain_queue(rx: &mut mpsc::Receiver<String>) -> Vec<String> {
    let mut lines = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(line) => lines.push(line),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
        }
    }
    lines
}

/// Write the header and `lines` to `sink`. Write failures are logged only.
pub fn write_dump(sink: &mut dyn Write, lines: &[String]) {
    if let Err(e) = try_write_dump(sink, lines) {
        warn!("failed to write stderr dump: {}", e);
    }
}

fn try_write_dump(sink: &mut dyn Write, lines: &[String]) -> std::io::Result<()> {
    writeln!(sink, "{}", DUMP_HEADER)?;
    for line in lines {
        writeln!(sink, "{}", line)?;
    }
    sink.flush()
}

//! Line readers feeding the per-stream bounded queues

use std::fmt;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;

use etrace_core::prelude::*;

use crate::cancel::CancelSignal;

/// Which child output stream a reader is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => f.write_str("stdout"),
            StreamKind::Stderr => f.write_str("stderr"),
        }
    }
}

/// Read newline-delimited lines from `stream` into `tx` until EOF, a read
/// error, cancellation, or the queue's receiver going away.
///
/// Cancellation is checked before each read and while waiting for queue
/// space. A read already in flight is not interrupted: the reader notices
/// cancellation only once the child writes more output or closes the pipe.
///
/// Bytes that are not valid UTF-8 (raw file names, for instance) are
/// replaced with U+FFFD rather than ending the stream.
///
/// The queue is closed when this returns, since `tx` is dropped. Returns the
/// number of lines forwarded.
pub async fn read_lines<R>(
    stream: R,
    tx: mpsc::Sender<String>,
    mut cancel: CancelSignal,
    kind: StreamKind,
) -> usize
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    let mut forwarded = 0usize;

    loop {
        if cancel.is_cancelled() {
            debug!("{} reader cancelled", kind);
            break;
        }

        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                debug!("{} reached end of stream", kind);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("failed to read from EventsTrace {}: {}", kind, e);
                break;
            }
        }
        let line = decode_line(&buf);

        trace!("{}: {}", kind, line);

        // Full queue: wait for a consumer, but stay responsive to cancellation
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("{} reader cancelled while queue was full", kind);
                break;
            }
            sent = tx.send(line) => {
                if sent.is_err() {
                    debug!("{} queue closed", kind);
                    break;
                }
                forwarded += 1;
            }
        }
    }

    info!("{} reader finished after {} lines", kind, forwarded);
    forwarded
}

/// Strip the line terminator (`\n` or `\r\n`) and decode lossily
fn decode_line(buf: &[u8]) -> String {
    let line = buf.strip_suffix(b"\n").unwrap_or(buf);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

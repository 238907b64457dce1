//! Event filtering over the stdout queue

use tokio::sync::mpsc;

use etrace_core::prelude::*;
use etrace_core::Event;

/// Pop lines until one whose kind is in `kinds` arrives.
///
/// Lines without a recognizable kind, or with a kind not in `kinds`, are
/// consumed and discarded. Returns `None` once the queue is closed and empty.
///
/// Cancel safe: dropping the future (e.g. on timeout) never loses a line
/// that was not already inspected.
pub async fn next_matching<S: AsRef<str>>(
    rx: &mut mpsc::Receiver<String>,
    kinds: &[S],
) -> Option<Event> {
    while let Some(line) = rx.recv().await {
        match Event::parse(&line) {
            Some(event) if event.is_any_of(kinds) => return Some(event),
            Some(event) => trace!("skipping {} event", event.kind),
            None => trace!("skipping line without event kind: {}", line),
        }
    }
    None
}

//! # etrace-session - EventsTrace Process Session
//!
//! Launches one EventsTrace child, reads its stdout and stderr concurrently
//! into bounded queues, and answers "give me the next event of kind X"
//! queries with a deadline.
//!
//! Depends on [`etrace_core`] for the event view, configuration and errors.
//!
//! ## Public API
//!
//! ### Session
//! - [`EventsTraceSession`] - `start` / `next_event` / `dump_stderr` / `stop`
//! - [`SessionState`] - Created → Started → Ready → Stopped, or Failed
//!
//! ### Plumbing
//! - [`read_lines()`] - Line reader task for one output stream
//! - [`next_matching()`] - Kind filter over a line queue
//! - [`drain_queue()`], [`write_dump()`] - Stderr diagnostic dump
//! - [`CancelSource`], [`CancelSignal`] - Reader cancellation
//! - [`MANDATORY_FLAGS`] - Flags appended to every launch

pub mod cancel;
pub mod dump;
pub mod filter;
pub mod process;
pub mod reader;
pub mod session;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;

// Public API re-exports
pub use cancel::{CancelSignal, CancelSource};
pub use dump::{drain_queue, write_dump, DUMP_HEADER};
pub use filter::next_matching;
pub use process::{build_args, MANDATORY_FLAGS};
pub use reader::{read_lines, StreamKind};
pub use session::{EventsTraceSession, SessionState};

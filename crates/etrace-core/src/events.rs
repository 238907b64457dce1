//! Event view over EventsTrace stdout lines
//!
//! Every stdout line is expected to be a single JSON object carrying a
//! string discriminant. Parsing is best-effort: anything without a
//! recognizable discriminant simply has no kind.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Field names checked, in order, for the event discriminant.
pub const KIND_FIELDS: [&str; 3] = ["event_type", "type", "kind"];

/// Extract the discriminant from a raw stdout line.
///
/// Returns `None` for non-JSON lines, non-object values, and objects whose
/// discriminant field is missing or not a string.
pub fn event_kind(line: &str) -> Option<String> {
    let body = parse_object(line)?;
    kind_of(&body).map(str::to_string)
}

fn parse_object(line: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(line.trim()).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn kind_of(body: &Map<String, Value>) -> Option<&str> {
    KIND_FIELDS
        .iter()
        .find_map(|field| body.get(*field).and_then(Value::as_str))
}

/// A parsed stdout record.
///
/// Only the discriminant is interpreted; every other field is kept as
/// opaque JSON and the raw line is preserved untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: String,
    pub raw: String,
    body: Map<String, Value>,
}

impl Event {
    /// Parse a stdout line, returning `None` if it has no recognizable kind
    pub fn parse(line: &str) -> Option<Self> {
        let body = parse_object(line)?;
        let kind = kind_of(&body)?.to_string();
        Some(Self {
            kind,
            raw: line.to_string(),
            body,
        })
    }

    /// Look up a top-level field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.body.get(name)
    }

    /// Whether this event's kind is one of `kinds`
    pub fn is_any_of<S: AsRef<str>>(&self, kinds: &[S]) -> bool {
        kinds.iter().any(|k| k.as_ref() == self.kind)
    }

    /// Deserialize the whole record into a typed payload.
    ///
    /// Fails with [`Error::Json`](crate::Error::Json) when the record does not have the
    /// expected shape.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(self.body.clone()))?)
    }
}

/// Event kinds emitted by the EventsTrace binary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ProcessFork,
    ProcessExec,
    ProcessExit,
    ProcessSetsid,
    FileDelete,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::ProcessFork,
        EventKind::ProcessExec,
        EventKind::ProcessExit,
        EventKind::ProcessSetsid,
        EventKind::FileDelete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ProcessFork => "PROCESS_FORK",
            EventKind::ProcessExec => "PROCESS_EXEC",
            EventKind::ProcessExit => "PROCESS_EXIT",
            EventKind::ProcessSetsid => "PROCESS_SETSID",
            EventKind::FileDelete => "FILE_DELETE",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for EventKind {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown event kind: {}", s))
    }
}

// ─────────────────────────────────────────────────────────
// Shared Payload Structs
// ─────────────────────────────────────────────────────────

/// Process identity block (`pids`) shared by process events
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PidInfo {
    pub tid: i64,
    pub tgid: i64,
    pub ppid: i64,
    pub pgid: i64,
    pub sid: i64,
    pub start_time_ns: u64,
}

/// Credentials block (`creds`)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CredInfo {
    pub ruid: i64,
    pub rgid: i64,
    pub euid: i64,
    pub egid: i64,
    pub suid: i64,
    pub sgid: i64,
}

/// Controlling terminal (`ctty`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct TtyDev {
    pub major: i64,
    pub minor: i64,
}

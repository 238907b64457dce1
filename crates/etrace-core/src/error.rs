//! Harness error types with rich context

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Harness error types organized by lifecycle stage
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    // ─────────────────────────────────────────────────────────────
    // Session Lifecycle Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to start {program}: {reason}")]
    Launch { program: String, reason: String },

    #[error("Timed out after {waited:?} waiting for EventsTrace to get ready")]
    ReadyTimeout {
        waited: Duration,
        stderr: Vec<String>,
    },

    #[error("EventsTrace stdout closed before the expected output arrived")]
    StdoutClosed { stderr: Vec<String> },

    #[error("Timed out after {waited:?} waiting for EventsTrace output of kind {kinds:?}")]
    EventTimeout {
        kinds: Vec<String>,
        waited: Duration,
        stderr: Vec<String>,
    },

    #[error("Failed to stop EventsTrace: {reason}")]
    Teardown { reason: String },

    #[error("Session is {actual}, expected {expected}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn launch(program: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Launch {
            program: program.into(),
            reason: reason.into(),
        }
    }

    pub fn teardown(reason: impl Into<String>) -> Self {
        Self::Teardown {
            reason: reason.into(),
        }
    }

    pub fn invalid_state(expected: &'static str, actual: &'static str) -> Self {
        Self::InvalidState { expected, actual }
    }

    /// Stderr lines dumped while this error was being reported, if any.
    pub fn stderr_lines(&self) -> &[String] {
        match self {
            Error::ReadyTimeout { stderr, .. }
            | Error::StdoutClosed { stderr }
            | Error::EventTimeout { stderr, .. } => stderr,
            _ => &[],
        }
    }

    /// Check if this is a recoverable error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Teardown { .. } | Error::InvalidState { .. })
    }

    /// Check if this error should end the test session
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Launch { .. }
                | Error::ReadyTimeout { .. }
                | Error::StdoutClosed { .. }
                | Error::EventTimeout { .. }
        )
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Context Extensions
// ─────────────────────────────────────────────────────────────────

/// Log a failure with a short description of what was being attempted,
/// then propagate it as a harness [`Error`]
pub trait ResultExt<T> {
    fn context(self, what: impl Into<String>) -> Result<T>;

    /// Like [`context`](Self::context), building the description only on failure
    fn with_context<F>(self, what: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, what: impl Into<String>) -> Result<T> {
        self.with_context(|| what.into())
    }

    fn with_context<F>(self, what: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{} failed: {}", what(), err);
            err
        })
    }
}

//! # etrace-core - Core Domain Types
//!
//! Foundation crate for the EventsTrace harness. Provides error handling,
//! the event view over stdout lines, harness configuration and logging.
//!
//! This crate has **zero internal dependencies**.
//!
//! ## Public API
//!
//! ### Events (`events`)
//! - [`Event`] - A stdout line with its discriminant extracted
//! - [`event_kind()`] - Best-effort discriminant extraction
//! - [`EventKind`] - Kinds the EventsTrace binary emits
//! - [`PidInfo`], [`CredInfo`], [`TtyDev`] - Nested payload blocks
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Error enum with `fatal` vs `recoverable` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ### Configuration (`config`)
//! - [`HarnessConfig`] - Binary path, queue capacity and timeouts
//! - [`load_config()`] - Lenient TOML loader
//!
//! ## Prelude
//!
//! ```rust
//! use etrace_core::prelude::*;
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

/// Prelude for common imports used throughout all harness crates
pub mod prelude {
    pub use super::error::{Error, Result, ResultExt};
    pub use tracing::{debug, error, info, instrument, trace, warn};
}

pub use config::{load_config, load_config_strict, HarnessConfig, DEFAULT_BINARY};
pub use error::{Error, Result, ResultExt};
pub use events::{event_kind, CredInfo, Event, EventKind, PidInfo, TtyDev, KIND_FIELDS};

//! Harness configuration
//!
//! Loaded from a TOML file such as:
//!
//! ```toml
//! binary = "/EventsTrace"
//! queue_capacity = 100
//! ready_timeout_ms = 30000
//! event_timeout_ms = 60000
//! reader_join_timeout_ms = 1000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Where the EventsTrace binary lives inside the test image
pub const DEFAULT_BINARY: &str = "/EventsTrace";

/// Settings for one harness session
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Executable to launch
    pub binary: PathBuf,

    /// Lines buffered per output stream before the reader blocks
    pub queue_capacity: usize,

    /// How long `start` waits for the first stdout line
    pub ready_timeout_ms: u64,

    /// How long each event query waits for a matching line
    pub event_timeout_ms: u64,

    /// Grace period for reader tasks to finish after the child is reaped
    pub reader_join_timeout_ms: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_BINARY),
            queue_capacity: 100,
            ready_timeout_ms: 30_000,
            event_timeout_ms: 60_000,
            reader_join_timeout_ms: 1000,
        }
    }
}

impl HarnessConfig {
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_event_timeout(mut self, timeout: Duration) -> Self {
        self.event_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_reader_join_timeout(mut self, timeout: Duration) -> Self {
        self.reader_join_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Queue capacity, never zero (a zero-sized channel cannot be created)
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity.max(1)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn event_timeout(&self) -> Duration {
        Duration::from_millis(self.event_timeout_ms)
    }

    pub fn reader_join_timeout(&self) -> Duration {
        Duration::from_millis(self.reader_join_timeout_ms)
    }
}

/// Load configuration from a TOML file
///
/// Returns default settings if file doesn't exist or can't be parsed.
pub fn load_config(path: &Path) -> HarnessConfig {
    if !path.exists() {
        debug!("No config file at {:?}, using defaults", path);
        return HarnessConfig::default();
    }

    match load_config_strict(path) {
        Ok(config) => {
            debug!("Loaded config from {:?}", path);
            config
        }
        Err(e) => {
            warn!("Failed to load {:?}: {}", path, e);
            HarnessConfig::default()
        }
    }
}

/// Load configuration from a TOML file, failing on a missing or invalid file
pub fn load_config_strict(path: &Path) -> Result<HarnessConfig> {
    if !path.exists() {
        return Err(Error::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::config(format!("Failed to parse {}: {}", path.display(), e)))
}

//! Per-connection configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::protocol::DEFAULT_MAX_FRAME_SIZE;

/// Default command delimiter negotiated by the debuggee.
pub const DEFAULT_DELIMITER: &str = "|*|";

/// Default bound on a held unparseable command fragment (1 MiB).
pub const DEFAULT_MAX_HELD_FRAGMENT: usize = 1024 * 1024;

/// Default interval for the timer-driven timeout sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for one debugger connection.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Separator between command messages on the text channel. Supplied by
    /// connection negotiation; treated as opaque here.
    pub delimiter: String,
    /// Directory receiving file-channel payloads; purged at session start.
    pub staging_dir: PathBuf,
    /// Whether the debuggee base64-encodes string payload values.
    pub base64_strings: bool,
    /// Maximum accepted file-channel frame size.
    pub max_frame_size: u32,
    /// Bound on the held fragment used for JSON-continuation recovery.
    pub max_held_fragment: usize,
    /// Interval for the timer-driven timeout sweep in the session driver.
    pub sweep_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER.to_string(),
            staging_dir: PathBuf::from("temp"),
            base64_strings: true,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_held_fragment: DEFAULT_MAX_HELD_FRAGMENT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl SessionConfig {
    /// Create a configuration with the given staging directory.
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            ..Self::default()
        }
    }

    /// Set the command delimiter.
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Enable or disable base64-encoded payload strings.
    pub fn with_base64_strings(mut self, enabled: bool) -> Self {
        self.base64_strings = enabled;
        self
    }

    /// Set the maximum file-channel frame size.
    pub fn with_max_frame_size(mut self, size: u32) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Set the held-fragment bound.
    pub fn with_max_held_fragment(mut self, bytes: usize) -> Self {
        self.max_held_fragment = bytes;
        self
    }

    /// Set the timeout sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

//! Server configuration and start-parameter validation.

use std::time::Duration;

use radiosim_core::ConfigError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Tuning knobs for the relay.
///
/// The listen address is not part of this struct; it is passed to
/// [`RadioServer::start`](crate::server::RadioServer::start).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Back-off after a failed `accept`, in milliseconds.
    pub poll_interval_ms: u64,
    /// Upper bound on a single relay or acknowledgment write, in milliseconds.
    pub write_timeout_ms: u64,
    /// Read buffer size; each read is one frame.
    pub max_frame_size: usize,
    /// Pending-connection backlog for the listening socket.
    pub listen_backlog: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 250,
            write_timeout_ms: 250,
            max_frame_size: 4096,
            listen_backlog: 1024,
        }
    }
}

impl ServerConfig {
    /// Accept back-off as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Write timeout as a [`Duration`].
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Defaults with `RADIOSIM_*` environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply environment variable overrides.
    ///
    /// Values that fail to parse or fall outside the accepted range are
    /// ignored and the current value is kept.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = read_env_u64("RADIOSIM_POLL_INTERVAL_MS", 1, 60_000) {
            self.poll_interval_ms = v;
        }
        if let Some(v) = read_env_u64("RADIOSIM_WRITE_TIMEOUT_MS", 1, 60_000) {
            self.write_timeout_ms = v;
        }
        if let Some(v) = read_env_u64("RADIOSIM_MAX_FRAME_SIZE", 64, 16 * 1024 * 1024) {
            self.max_frame_size = usize::try_from(v).unwrap_or(self.max_frame_size);
        }
        if let Some(v) = read_env_u64("RADIOSIM_LISTEN_BACKLOG", 1, 65_535) {
            self.listen_backlog = u32::try_from(v).unwrap_or(self.listen_backlog);
        }
        self
    }
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    parse_bounded(&std::env::var(name).ok()?, min, max).or_else(|| {
        debug!(name, "ignoring out-of-range or non-numeric override");
        None
    })
}

fn parse_bounded(raw: &str, min: u64, max: u64) -> Option<u64> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|v| (min..=max).contains(v))
}

/// Validate a port supplied by the entry point.
///
/// Zero and negative values are rejected as non-positive, values above
/// 65535 as out of range.
pub fn validate_port(port: i64) -> Result<u16, ConfigError> {
    if port <= 0 {
        return Err(ConfigError::NonPositivePort(port));
    }
    u16::try_from(port).map_err(|_| ConfigError::PortOutOfRange(port))
}

/// Parse and validate a textual port.
pub fn parse_port(raw: &str) -> Result<u16, ConfigError> {
    let port = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| ConfigError::PortNotInteger(raw.to_string()))?;
    validate_port(port)
}

/// Reject an empty host string.
pub fn validate_host(host: &str) -> Result<&str, ConfigError> {
    let host = host.trim();
    if host.is_empty() {
        return Err(ConfigError::EmptyHost);
    }
    Ok(host)
}

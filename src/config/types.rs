//! Configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default delay between two reads of a watched file.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Default capacity of a session's event channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Whether to allow cross-origin requests from anywhere.
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            cors_permissive: true,
        }
    }
}

impl ServerConfig {
    /// The `host:port` address to bind.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Tail session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Delay between two polls of a file, in milliseconds.
    pub poll_interval_ms: u64,
    /// Events buffered per session before slow subscribers start losing the
    /// oldest ones.
    pub channel_capacity: usize,
    /// Pause polling while a session has no subscribers.
    pub suspend_when_idle: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            suspend_when_idle: true,
        }
    }
}

impl WatcherConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogmonConfig {
    pub server: ServerConfig,
    pub watcher: WatcherConfig,
}

impl LogmonConfig {
    /// Check values that deserialize fine but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watcher.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "watcher.poll_interval_ms",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.watcher.channel_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "watcher.channel_capacity",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "server.host",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` to match the JSON
//! wire format. Each type implements [`Default`] with production default
//! values. Types marked with `#[serde(default)]` allow partial JSON —
//! missing fields get their default value during deserialization.

use serde::{Deserialize, Serialize};

/// Root settings type for the Pulse broadcaster.
///
/// Loaded from `~/.pulse/settings.json` with defaults applied for missing
/// fields. Environment variables can override specific values.
///
/// # JSON Format
///
/// All field names are camelCase. Example:
///
/// ```json
/// {
///   "version": "0.1.0",
///   "server": { "port": 9090, "maxSubscribers": 256 }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PulseSettings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// Server network and broadcast settings.
    pub server: ServerSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for PulseSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "pulse".to_string(),
            server: ServerSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Server network and broadcast settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// HTTP/WebSocket port (`0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent subscribers; registration past this is rejected.
    pub max_subscribers: usize,
    /// Bounded outbound queue depth per subscriber.
    pub max_queue_depth: usize,
    /// Interval between server-initiated Ping frames, in seconds.
    pub heartbeat_interval_secs: u64,
    /// Disconnect a subscriber after this long without a Pong, in seconds.
    pub heartbeat_timeout_secs: u64,
    /// How long a draining session may flush queued events on shutdown,
    /// in seconds.
    pub drain_timeout_secs: u64,
    /// Overall graceful-shutdown budget before tasks are aborted, in seconds.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_subscribers: 1024,
            max_queue_depth: 64,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 60,
            drain_timeout_secs: 5,
            shutdown_timeout_secs: 30,
        }
    }
}

impl ServerSettings {
    /// Check invariants that serde cannot express.
    ///
    /// `maxSubscribers` and `maxQueueDepth` must be positive (the queue is
    /// bounded by contract, and `0` does not mean unbounded), and the
    /// heartbeat timeout must be at least one interval.
    pub fn validate(&self) -> crate::errors::Result<()> {
        if self.max_subscribers == 0 {
            return Err(crate::errors::SettingsError::InvalidValue(
                "maxSubscribers must be > 0".to_string(),
            ));
        }
        if self.max_queue_depth == 0 {
            return Err(crate::errors::SettingsError::InvalidValue(
                "maxQueueDepth must be > 0".to_string(),
            ));
        }
        if self.heartbeat_timeout_secs < self.heartbeat_interval_secs {
            return Err(crate::errors::SettingsError::InvalidValue(
                "heartbeatTimeoutSecs must be >= heartbeatIntervalSecs".to_string(),
            ));
        }
        Ok(())
    }
}

/// Minimum log level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace-level (most verbose).
    Trace,
    /// Debug-level.
    Debug,
    /// Info-level (default).
    #[default]
    Info,
    /// Warning-level.
    Warn,
    /// Error-level.
    Error,
}

impl LogLevel {
    /// Convert to a tracing filter string.
    pub fn as_filter_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum log level emitted by the subscriber.
    pub level: LogLevel,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

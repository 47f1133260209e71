//! Server configuration.

use pulse_settings::ServerSettings;
use serde::{Deserialize, Serialize};

/// Configuration for the Pulse server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent subscribers; registrations past this are refused.
    pub max_subscribers: usize,
    /// Bounded outbound queue depth per subscriber.
    pub max_queue_depth: usize,
    /// Heartbeat ping interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Heartbeat timeout in seconds (disconnect after this long without a pong).
    pub heartbeat_timeout_secs: u64,
    /// Drain budget per session on shutdown, in seconds.
    pub drain_timeout_secs: u64,
    /// Overall graceful-shutdown budget in seconds.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_subscribers: 1024,
            max_queue_depth: 64,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 60,
            drain_timeout_secs: 5,
            shutdown_timeout_secs: 30,
        }
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            max_subscribers: settings.max_subscribers,
            max_queue_depth: settings.max_queue_depth,
            heartbeat_interval_secs: settings.heartbeat_interval_secs,
            heartbeat_timeout_secs: settings.heartbeat_timeout_secs,
            drain_timeout_secs: settings.drain_timeout_secs,
            shutdown_timeout_secs: settings.shutdown_timeout_secs,
        }
    }
}

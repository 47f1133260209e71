//! # pulse-relay
//!
//! Pulse deployment-status broadcaster binary — loads settings, starts the
//! HTTP/WebSocket server, and runs until interrupted.

#![deny(unsafe_code)]

mod demo;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use pulse_server::config::ServerConfig;
use pulse_server::server::PulseServer;
use pulse_settings::{PulseSettings, SettingsError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Pulse deployment-status broadcaster.
#[derive(Parser, Debug)]
#[command(name = "pulse-relay", about = "Real-time deployment status broadcaster")]
struct Cli {
    /// Host to bind (overrides settings if specified).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings if specified; 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the settings file (default `~/.pulse/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Publish a synthetic deployment feed (for demos and dashboard work).
    #[arg(long)]
    demo: bool,

    /// Seconds between synthetic events.
    #[arg(long, default_value = "5")]
    demo_interval_secs: u64,
}

/// Load settings, falling back to defaults when the file is rejected.
///
/// The error is returned instead of logged because tracing is not up yet
/// at load time (the log level itself comes from the settings).
fn load_settings_or_default(path: &Path) -> (PulseSettings, Option<SettingsError>) {
    match pulse_settings::load_settings_from_path(path) {
        Ok(settings) => (settings, None),
        Err(e) => (PulseSettings::default(), Some(e)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // Settings first: the log level lives there.
    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(pulse_settings::settings_path);
    let (settings, settings_err) = load_settings_or_default(&settings_path);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.logging.level.as_filter_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Some(e) = settings_err {
        warn!(path = %settings_path.display(), error = %e, "settings file rejected, running on defaults");
    }

    let metrics_handle = pulse_server::metrics::install_recorder();

    let mut config = ServerConfig::from(&settings.server);
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);

    let server = PulseServer::new(config, metrics_handle);
    let (addr, serve_handle) = server
        .listen()
        .await
        .context("Failed to bind listener")?;
    info!("Pulse listening on http://{addr} (ws://{addr}/ws/deploy)");

    let mut background = vec![serve_handle];
    if args.demo {
        let hub = server.hub().clone();
        let token = server.shutdown().token();
        let interval = Duration::from_secs(args.demo_interval_secs.max(1));
        background.push(tokio::spawn(async move {
            let mut feed = demo::DemoFeed::new();
            let mut tick = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        hub.publish(&feed.next_event()).await;
                    }
                    () = token.cancelled() => break,
                }
            }
        }));
        info!(
            interval_secs = interval.as_secs(),
            "demo feed enabled"
        );
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    info!("shutdown signal received, draining sessions");

    server
        .shutdown()
        .graceful_shutdown(background, Some(shutdown_timeout))
        .await;
    info!("shutdown complete");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_settings_file_is_not_an_error() {
        let (settings, err) = load_settings_or_default(Path::new("/nonexistent/pulse.json"));
        assert!(err.is_none());
        assert_eq!(settings.server.port, 8080);
    }

    #[test]
    fn rejected_settings_file_is_reported_and_defaults_apply() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"server": {{"maxQueueDepth": 0}}}}"#).unwrap();

        let (settings, err) = load_settings_or_default(file.path());
        assert!(matches!(err, Some(SettingsError::InvalidValue(_))));
        assert_eq!(settings.server.max_queue_depth, 64);
    }

    #[test]
    fn unreadable_json_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();

        let (_, err) = load_settings_or_default(file.path());
        assert!(matches!(err, Some(SettingsError::Json(_))));
    }
}

//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Must be called once at server startup before any metrics are recorded.
pub fn install_recorder() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install metrics recorder");
    info!("prometheus metrics recorder installed");
    handle
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across crates.

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Connection duration seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Sessions terminated by liveness timeout (counter).
pub const WS_LIVENESS_TIMEOUTS_TOTAL: &str = "ws_liveness_timeouts_total";
/// Sessions terminated by write failure (counter).
pub const WS_WRITE_FAILURES_TOTAL: &str = "ws_write_failures_total";
/// Events published into the hub (counter).
pub const HUB_EVENTS_PUBLISHED_TOTAL: &str = "hub_events_published_total";
/// Slow-consumer drops (counter).
pub const HUB_EVENTS_DROPPED_TOTAL: &str = "hub_events_dropped_total";
/// Registrations refused at capacity (counter).
pub const HUB_REGISTRATIONS_REJECTED_TOTAL: &str = "hub_registrations_rejected_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_and_render() {
        // Build a recorder + handle (no global install to avoid test conflicts).
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let output = handle.render();
        assert!(output.is_empty() || output.contains('#') || output.contains('\n'));
    }

    #[test]
    fn metric_constants_are_snake_case() {
        let names = [
            WS_CONNECTIONS_TOTAL,
            WS_DISCONNECTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            WS_CONNECTION_DURATION_SECONDS,
            WS_LIVENESS_TIMEOUTS_TOTAL,
            WS_WRITE_FAILURES_TOTAL,
            HUB_EVENTS_PUBLISHED_TOTAL,
            HUB_EVENTS_DROPPED_TOTAL,
            HUB_REGISTRATIONS_REJECTED_TOTAL,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}

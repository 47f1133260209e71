//! `PulseServer` — Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use pulse_hub::Hub;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::session;
use crate::shutdown::ShutdownCoordinator;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast hub (registry + publish ingress).
    pub hub: Arc<Hub>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Server configuration.
    pub config: ServerConfig,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus render handle.
    pub metrics: PrometheusHandle,
}

/// The main Pulse server.
pub struct PulseServer {
    config: ServerConfig,
    hub: Arc<Hub>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: PrometheusHandle,
}

impl PulseServer {
    /// Create a new server.
    pub fn new(config: ServerConfig, metrics: PrometheusHandle) -> Self {
        let hub = Arc::new(Hub::new(config.max_subscribers, config.max_queue_depth));
        Self {
            config,
            hub,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics,
        }
    }

    /// Build the Axum router with all routes.
    ///
    /// CORS is allow-all: the dashboard is served from arbitrary origins and
    /// this endpoint carries no credentials.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: self.hub.clone(),
            shutdown: self.shutdown.clone(),
            config: self.config.clone(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws/deploy", get(ws_handler))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind and start serving.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task
    /// handle. The listener stops accepting when the shutdown coordinator
    /// fires.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "listening");

        let app = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                warn!(error = %e, "server error");
            }
        });

        Ok((local_addr, handle))
    }

    /// The broadcast hub — publish ingress for the event source.
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let subscribers = state.hub.subscriber_count().await;
    let resp = health::health_check(state.start_time, subscribers, state.hub.dropped_total());
    Json(resp)
}

/// GET /metrics — Prometheus text format.
async fn metrics_handler(State(state): State<AppState>) -> String {
    crate::metrics::render(&state.metrics)
}

/// GET /ws/deploy — WebSocket upgrade.
///
/// Registration happens before the upgrade so a full hub refuses the
/// connection with `503` instead of accepting and immediately closing.
/// The registry entry is released if the upgrade never completes; only
/// `run_session` unregisters on the success path.
async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    match state.hub.register().await {
        Ok((subscriber, events)) => {
            let hub = state.hub.clone();
            let shutdown = state.shutdown.token();
            let config = state.config.clone();
            let failed_hub = state.hub.clone();
            let failed_id = subscriber.id.clone();
            ws.on_failed_upgrade(move |e| {
                warn!(subscriber_id = %failed_id, error = %e, "upgrade failed, releasing slot");
                let _ = tokio::spawn(async move {
                    let _ = failed_hub.unregister(&failed_id).await;
                });
            })
            .on_upgrade(move |socket| {
                session::run_session(socket, subscriber, events, hub, shutdown, config)
            })
        }
        Err(e) => {
            warn!(error = %e, "registration refused");
            counter!("ws_connections_refused_total").increment(1);
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;

    fn make_server() -> PulseServer {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        PulseServer::new(ServerConfig::default(), handle)
    }

    #[tokio::test]
    async fn server_with_default_config() {
        let server = make_server();
        assert_eq!(server.config().host, "127.0.0.1");
        assert_eq!(server.config().port, 0);
    }

    #[tokio::test]
    async fn hub_sized_from_config() {
        let config = ServerConfig {
            max_subscribers: 3,
            ..ServerConfig::default()
        };
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let server = PulseServer::new(config, handle);
        assert_eq!(server.hub().max_subscribers(), 3);
        assert_eq!(server.hub().subscriber_count().await, 0);
    }

    #[test]
    fn shutdown_coordinator_accessible() {
        let server = make_server();
        assert!(!server.shutdown().is_shutting_down());
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let server = make_server();
        let app = server.router();

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 10_000)
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["subscribers"], 0);
        assert!(parsed["dropped_events"].is_number());
    }

    #[tokio::test]
    async fn metrics_endpoint_returns_text() {
        let server = make_server();
        let app = server.router();

        let req = Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ws_route_requires_upgrade() {
        let server = make_server();
        let app = server.router();

        // Plain GET without upgrade headers is rejected by the extractor.
        let req = Request::builder()
            .uri("/ws/deploy")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_ne!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let server = make_server();
        let app = server.router();

        let req = Request::builder()
            .uri("/nonexistent")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn listen_binds_auto_port() {
        let server = make_server();
        let (addr, _handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);
        server.shutdown().shutdown();
    }

    #[tokio::test]
    async fn shutdown_stops_listener() {
        let server = make_server();
        let (_addr, handle) = server.listen().await.unwrap();
        server.shutdown().shutdown();
        // Serve task exits once the token fires.
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("serve task should exit on shutdown")
            .unwrap();
    }
}

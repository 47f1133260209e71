//! WebSocket session lifecycle — handles a single subscriber from upgrade
//! through disconnect.
//!
//! Three tasks cooperate per session:
//!
//! - the **send loop** drains the subscriber's bounded queue onto the wire
//!   and emits periodic Ping frames
//! - the **heartbeat monitor** watches the pong flag and kills the session
//!   on liveness timeout
//! - the **read loop** (this task) records pongs and notices peer closes
//!
//! A session-local `CancellationToken` ties them together: whichever task
//! hits a terminal condition cancels it, and teardown converges on one
//! idempotent `Hub::unregister` call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use pulse_core::SessionError;
use pulse_hub::{HeartbeatResult, Hub, Subscriber, run_heartbeat};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::ServerConfig;

/// Run a WebSocket session for a registered subscriber.
///
/// 1. Spawns the send loop (queue drain + Ping frames)
/// 2. Spawns the heartbeat monitor
/// 3. Reads inbound frames until disconnect or session kill
/// 4. Unregisters from the hub exactly once on the way out
#[instrument(skip_all, fields(subscriber_id = %subscriber.id))]
pub async fn run_session(
    ws: WebSocket,
    subscriber: Arc<Subscriber>,
    events: mpsc::Receiver<Arc<str>>,
    hub: Arc<Hub>,
    shutdown: CancellationToken,
    config: ServerConfig,
) {
    let (ws_tx, mut ws_rx) = ws.split();

    let connection_start = Instant::now();
    info!("subscriber connected");
    counter!("ws_connections_total").increment(1);
    gauge!("ws_connections_active").increment(1.0);

    // Session-local kill switch: write failure, liveness timeout, or
    // completed drain all cancel it.
    let kill = CancellationToken::new();

    let heartbeat = tokio::spawn(monitor_liveness(
        subscriber.clone(),
        Duration::from_secs(config.heartbeat_interval_secs),
        Duration::from_secs(config.heartbeat_timeout_secs),
        kill.clone(),
    ));

    let send_loop = tokio::spawn(run_send_loop(
        ws_tx,
        events,
        subscriber.clone(),
        shutdown,
        kill.clone(),
        Duration::from_secs(config.heartbeat_interval_secs),
        Duration::from_secs(config.drain_timeout_secs),
    ));

    // Read loop: pongs feed the liveness flag; there is no inbound
    // application protocol on this endpoint.
    loop {
        tokio::select! {
            frame = ws_rx.next() => {
                match frame {
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        subscriber.mark_alive();
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("subscriber sent close frame");
                        break;
                    }
                    Some(Ok(Message::Text(_) | Message::Binary(_))) => {
                        debug!("ignoring inbound data frame");
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "read error, closing session");
                        break;
                    }
                    None => break,
                }
            }
            () = kill.cancelled() => break,
        }
    }

    // Teardown: release the other tasks, then unregister (idempotent).
    kill.cancel();
    let _ = send_loop.await;
    let _ = heartbeat.await;
    let _ = hub.unregister(&subscriber.id).await;

    info!(
        drop_count = subscriber.drop_count(),
        "subscriber disconnected"
    );
    counter!("ws_disconnections_total").increment(1);
    gauge!("ws_connections_active").decrement(1.0);
    histogram!("ws_connection_duration_seconds").record(connection_start.elapsed().as_secs_f64());
}

/// Watch the pong flag and cancel the session on liveness timeout.
async fn monitor_liveness(
    subscriber: Arc<Subscriber>,
    interval: Duration,
    timeout: Duration,
    kill: CancellationToken,
) {
    let result = run_heartbeat(subscriber.clone(), interval, timeout, kill.clone()).await;
    if result == HeartbeatResult::TimedOut {
        let err = SessionError::LivenessTimeout;
        warn!(subscriber_id = %subscriber.id, error = %err, "forcing disconnect");
        counter!("ws_liveness_timeouts_total").increment(1);
        kill.cancel();
    }
}

/// Drain the subscriber queue onto the socket; send periodic Pings.
///
/// On server shutdown the session transitions to `Draining` and flushes
/// whatever is already queued within `drain_timeout`, then closes. A write
/// error is terminal: no retry, immediate teardown.
#[allow(clippy::too_many_arguments)]
async fn run_send_loop(
    mut ws_tx: futures::stream::SplitSink<WebSocket, Message>,
    mut events: mpsc::Receiver<Arc<str>>,
    subscriber: Arc<Subscriber>,
    shutdown: CancellationToken,
    kill: CancellationToken,
    ping_interval: Duration,
    drain_timeout: Duration,
) {
    let mut ping = tokio::time::interval(ping_interval);
    // Skip the immediate first tick
    let _ = ping.tick().await;

    loop {
        tokio::select! {
            msg = events.recv() => {
                match msg {
                    Some(text) => {
                        if let Err(e) = ws_tx.send(Message::Text(text.to_string().into())).await {
                            let err = SessionError::WriteFailure(e.to_string());
                            warn!(subscriber_id = %subscriber.id, error = %err, "terminal write error");
                            counter!("ws_write_failures_total").increment(1);
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = ping.tick() => {
                if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }
            () = shutdown.cancelled() => {
                if subscriber.begin_drain() {
                    debug!(subscriber_id = %subscriber.id, "draining session");
                    drain_queue(&mut ws_tx, &mut events, drain_timeout).await;
                }
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }
            () = kill.cancelled() => break,
        }
    }

    kill.cancel();
}

/// Flush already-queued events within a bounded deadline.
async fn drain_queue(
    ws_tx: &mut futures::stream::SplitSink<WebSocket, Message>,
    events: &mut mpsc::Receiver<Arc<str>>,
    drain_timeout: Duration,
) {
    let deadline = tokio::time::Instant::now() + drain_timeout;
    while let Ok(text) = events.try_recv() {
        let send = ws_tx.send(Message::Text(text.to_string().into()));
        match tokio::time::timeout_at(deadline, send).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => break,
            Err(_) => {
                warn!("drain timeout exceeded, force-closing");
                break;
            }
        }
    }
}

//! Heartbeat ping/pong liveness monitoring.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::subscriber::Subscriber;

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// The subscriber stopped responding within the timeout window.
    TimedOut,
    /// The heartbeat was cancelled externally.
    Cancelled,
}

/// Run heartbeat monitoring for a subscriber.
///
/// At each `interval` tick the alive flag is checked. If the subscriber has
/// not responded since the last tick the missed-pong counter increments.
/// Once `max_missed` consecutive misses are reached the subscriber is
/// considered dead and [`HeartbeatResult::TimedOut`] is returned — the
/// session then tears down and unregisters.
///
/// `max_missed` is computed as `timeout / interval` (clamped to at least 1),
/// so with the default 30s interval and 60s timeout, the second consecutive
/// missed window forces the disconnect.
pub async fn run_heartbeat(
    subscriber: Arc<Subscriber>,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let mut check_interval = time::interval(interval);
    // The first tick fires immediately; skip it so the peer has a full
    // interval to answer the first ping.
    let _ = check_interval.tick().await;
    let mut missed_pongs: u32 = 0;
    let interval_ms = interval.as_millis().max(1);
    #[allow(clippy::cast_possible_truncation)]
    let max_missed = (timeout.as_millis() / interval_ms).max(1) as u32;

    loop {
        tokio::select! {
            _ = check_interval.tick() => {
                // check_alive swaps the flag to false itself; a pong landing
                // right after the swap must count for the next window.
                if subscriber.check_alive() {
                    missed_pongs = 0;
                } else {
                    missed_pongs += 1;
                    if missed_pongs >= max_missed {
                        return HeartbeatResult::TimedOut;
                    }
                }
            }
            () = cancel.cancelled() => {
                return HeartbeatResult::Cancelled;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! Event fan-out to registered subscribers.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use pulse_core::{DeploymentEvent, HubError, SubscriberId};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};

use crate::subscriber::{EnqueueOutcome, Subscriber};

/// The broadcast hub: registry of active subscribers plus the single
/// publish ingress.
///
/// Lock discipline: the registry lock is always taken before any
/// per-subscriber queue operation, never the reverse. `publish` snapshots
/// the registry under the read lock, releases it, and then enqueues —
/// a subscriber removed mid-fan-out simply no-ops against its closed queue.
pub struct Hub {
    /// Registered subscribers indexed by session ID.
    subscribers: RwLock<HashMap<SubscriberId, Arc<Subscriber>>>,
    /// Registration limit; `register` rejects past this (no eviction).
    max_subscribers: usize,
    /// Bounded queue depth handed to each new subscriber.
    queue_depth: usize,
    /// Total events dropped across all subscribers (slow-consumer drops).
    dropped_total: AtomicU64,
    /// Total publish calls.
    published_total: AtomicU64,
}

impl Hub {
    /// Create a hub with the given capacity limits.
    pub fn new(max_subscribers: usize, queue_depth: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            max_subscribers,
            queue_depth,
            dropped_total: AtomicU64::new(0),
            published_total: AtomicU64::new(0),
        }
    }

    /// Admit a new subscriber.
    ///
    /// Returns the registered subscriber (already transitioned to `Active`)
    /// and the receiver half of its bounded queue, to be drained by the
    /// session's send loop. Fails with [`HubError::CapacityExceeded`] when
    /// the limit is reached; existing subscribers are unaffected.
    pub async fn register(
        &self,
    ) -> Result<(Arc<Subscriber>, mpsc::Receiver<Arc<str>>), HubError> {
        let mut subs = self.subscribers.write().await;
        if subs.len() >= self.max_subscribers {
            counter!("hub_registrations_rejected_total").increment(1);
            return Err(HubError::CapacityExceeded {
                max: self.max_subscribers,
            });
        }

        let (tx, rx) = mpsc::channel(self.queue_depth);
        let subscriber = Arc::new(Subscriber::new(SubscriberId::new(), tx));
        // Registration completes the Connecting -> Active transition.
        let _ = subscriber.activate();
        let _ = subs.insert(subscriber.id.clone(), subscriber.clone());
        debug!(subscriber_id = %subscriber.id, active = subs.len(), "subscriber registered");
        Ok((subscriber, rx))
    }

    /// Remove a subscriber by session ID.
    ///
    /// Idempotent: removing an ID that is absent (already removed by another
    /// teardown path) is a no-op. Returns whether this call removed it.
    pub async fn unregister(&self, id: &SubscriberId) -> bool {
        let removed = self.subscribers.write().await.remove(id);
        match removed {
            Some(sub) => {
                let _ = sub.close();
                debug!(subscriber_id = %id, "subscriber unregistered");
                true
            }
            None => false,
        }
    }

    /// Deliver an event to every registered subscriber's queue.
    ///
    /// The event is serialized once and shared read-only across the fan-out.
    /// Per-subscriber delivery is independent and non-blocking: a full queue
    /// drops the event for that subscriber only. This method never suspends
    /// on any subscriber's queue.
    pub async fn publish(&self, event: &DeploymentEvent) {
        let json: Arc<str> = match serde_json::to_string(event) {
            Ok(j) => Arc::from(j),
            Err(e) => {
                warn!(event_id = %event.id, error = %e, "failed to serialize event");
                return;
            }
        };

        let snapshot: Vec<Arc<Subscriber>> = {
            let subs = self.subscribers.read().await;
            subs.values().cloned().collect()
        };

        let _ = self.published_total.fetch_add(1, Ordering::Relaxed);
        counter!("hub_events_published_total").increment(1);
        debug!(
            event_id = %event.id,
            service = event.service,
            recipients = snapshot.len(),
            "fan-out"
        );

        for sub in snapshot {
            match sub.enqueue(json.clone()) {
                EnqueueOutcome::Delivered => {}
                EnqueueOutcome::Dropped => {
                    let _ = self.dropped_total.fetch_add(1, Ordering::Relaxed);
                    counter!("hub_events_dropped_total").increment(1);
                    warn!(
                        subscriber_id = %sub.id,
                        drop_count = sub.drop_count(),
                        "queue full, event dropped for slow consumer"
                    );
                }
                EnqueueOutcome::Closed => {
                    // Removed mid-fan-out; unregister will reap it.
                    debug!(subscriber_id = %sub.id, "enqueue on closed queue, skipping");
                }
            }
        }
    }

    /// Number of registered subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Snapshot of all registered subscribers (used for shutdown draining).
    pub async fn snapshot(&self) -> Vec<Arc<Subscriber>> {
        self.subscribers.read().await.values().cloned().collect()
    }

    /// Total slow-consumer drops across all subscribers.
    pub fn dropped_total(&self) -> u64 {
        self.dropped_total.load(Ordering::Relaxed)
    }

    /// Total publish calls since startup.
    pub fn published_total(&self) -> u64 {
        self.published_total.load(Ordering::Relaxed)
    }

    /// The configured registration limit.
    pub fn max_subscribers(&self) -> usize {
        self.max_subscribers
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriber::SessionState;
    use assert_matches::assert_matches;
    use pulse_core::{CheckResult, DeployStatus};
    use std::collections::BTreeMap;

    fn make_event(service: &str) -> DeploymentEvent {
        let mut checks = BTreeMap::new();
        let _ = checks.insert("pre".to_owned(), CheckResult::Healthy);
        DeploymentEvent::new(service, "prod", DeployStatus::Healthy, checks)
    }

    #[tokio::test]
    async fn register_activates_subscriber() {
        let hub = Hub::new(8, 4);
        let (sub, _rx) = hub.register().await.unwrap();
        assert_eq!(sub.state(), SessionState::Active);
        assert_eq!(hub.subscriber_count().await, 1);
    }

    #[tokio::test]
    async fn fan_out_reaches_every_subscriber() {
        let hub = Hub::new(8, 4);
        let mut receivers = Vec::new();
        for _ in 0..5 {
            let (_sub, rx) = hub.register().await.unwrap();
            receivers.push(rx);
        }

        hub.publish(&make_event("auth-service")).await;

        for rx in &mut receivers {
            let msg = rx.try_recv().expect("every subscriber receives the event");
            let parsed: serde_json::Value = serde_json::from_str(&msg).unwrap();
            assert_eq!(parsed["service"], "auth-service");
        }
    }

    #[tokio::test]
    async fn slow_consumer_is_isolated() {
        // Three subscribers with queue depth 1; two drain, one does not.
        let hub = Hub::new(8, 1);
        let (slow, mut slow_rx) = hub.register().await.unwrap();
        let (_fast_b, mut rx_b) = hub.register().await.unwrap();
        let (_fast_c, mut rx_c) = hub.register().await.unwrap();

        hub.publish(&make_event("e1")).await;
        // Fast subscribers drain between publishes; the slow one does not.
        let first_b = rx_b.try_recv().unwrap();
        let first_c = rx_c.try_recv().unwrap();
        hub.publish(&make_event("e2")).await;

        // Slow subscriber got only the first event; second was dropped.
        let slow_msg = slow_rx.try_recv().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&slow_msg).unwrap();
        assert_eq!(parsed["service"], "e1");
        assert!(slow_rx.try_recv().is_err());
        assert_eq!(slow.drop_count(), 1);
        assert_eq!(hub.dropped_total(), 1);

        // Fast subscribers received both, in order.
        let second_b = rx_b.try_recv().unwrap();
        let second_c = rx_c.try_recv().unwrap();
        for (first, second) in [(first_b, second_b), (first_c, second_c)] {
            let p1: serde_json::Value = serde_json::from_str(&first).unwrap();
            let p2: serde_json::Value = serde_json::from_str(&second).unwrap();
            assert_eq!(p1["service"], "e1");
            assert_eq!(p2["service"], "e2");
        }
    }

    #[tokio::test]
    async fn fifo_per_subscriber() {
        let hub = Hub::new(4, 16);
        let (_sub, mut rx) = hub.register().await.unwrap();

        for name in ["e1", "e2", "e3"] {
            hub.publish(&make_event(name)).await;
        }

        for expected in ["e1", "e2", "e3"] {
            let msg = rx.try_recv().unwrap();
            let parsed: serde_json::Value = serde_json::from_str(&msg).unwrap();
            assert_eq!(parsed["service"], expected);
        }
    }

    #[tokio::test]
    async fn capacity_rejection_leaves_existing_untouched() {
        let hub = Hub::new(2, 4);
        let (_a, mut rx_a) = hub.register().await.unwrap();
        let (_b, mut rx_b) = hub.register().await.unwrap();

        let err = hub.register().await.unwrap_err();
        assert_matches!(err, HubError::CapacityExceeded { max: 2 });
        assert_eq!(hub.subscriber_count().await, 2);

        // Existing subscribers still receive events.
        hub.publish(&make_event("after-reject")).await;
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let hub = Hub::new(4, 4);
        let (sub, _rx) = hub.register().await.unwrap();
        let id = sub.id.clone();

        assert!(hub.unregister(&id).await);
        assert!(!hub.unregister(&id).await);
        assert!(!hub.unregister(&id).await);
        assert_eq!(hub.subscriber_count().await, 0);
        assert_eq!(sub.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn unregister_unknown_id_is_noop() {
        let hub = Hub::new(4, 4);
        assert!(!hub.unregister(&SubscriberId::from("no_such")).await);
    }

    #[tokio::test]
    async fn publish_to_empty_hub() {
        let hub = Hub::new(4, 4);
        // Should not panic or block.
        hub.publish(&make_event("nobody-home")).await;
        assert_eq!(hub.published_total(), 1);
    }

    #[tokio::test]
    async fn publish_after_receiver_dropped_is_benign() {
        let hub = Hub::new(4, 4);
        let (sub, rx) = hub.register().await.unwrap();
        drop(rx);

        hub.publish(&make_event("into-the-void")).await;
        // Closed queue is not a slow-consumer drop.
        assert_eq!(sub.drop_count(), 0);
        assert_eq!(hub.dropped_total(), 0);
    }

    #[tokio::test]
    async fn unregistered_subscriber_stops_receiving() {
        let hub = Hub::new(4, 4);
        let (sub, mut rx) = hub.register().await.unwrap();
        let (_other, mut other_rx) = hub.register().await.unwrap();

        assert!(hub.unregister(&sub.id).await);
        hub.publish(&make_event("late")).await;

        assert!(rx.try_recv().is_err());
        assert!(other_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn concurrent_registrations_then_publish() {
        let hub = Arc::new(Hub::new(64, 4));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let hub = hub.clone();
            handles.push(tokio::spawn(async move { hub.register().await.unwrap() }));
        }
        let mut receivers = Vec::new();
        for handle in handles {
            let (_sub, rx) = handle.await.unwrap();
            receivers.push(rx);
        }
        assert_eq!(hub.subscriber_count().await, 16);

        hub.publish(&make_event("broadcast")).await;
        for rx in &mut receivers {
            assert!(rx.try_recv().is_ok());
        }
    }

    #[tokio::test]
    async fn wire_format_is_exact() {
        let hub = Hub::new(4, 4);
        let (_sub, mut rx) = hub.register().await.unwrap();
        hub.publish(&make_event("auth-service")).await;

        let msg = rx.try_recv().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&msg).unwrap();
        let obj = parsed.as_object().unwrap();
        assert_eq!(obj.len(), 6);
        assert!(obj.contains_key("id"));
        assert!(obj.contains_key("service"));
        assert!(obj.contains_key("environment"));
        assert!(obj.contains_key("status"));
        assert!(obj.contains_key("health_checks"));
        assert!(obj.contains_key("timestamp"));
        assert_eq!(parsed["status"], "healthy");
    }
}

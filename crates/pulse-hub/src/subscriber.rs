//! Subscriber connection state and session lifecycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use pulse_core::SubscriberId;
use tokio::sync::mpsc;

/// Lifecycle of a subscriber session.
///
/// ```text
/// Connecting ──register──▶ Active ──shutdown──▶ Draining ──▶ Closed
///                            │                                 ▲
///                            └──write error / liveness timeout─┘
/// ```
///
/// `Closed` is terminal; every teardown path converges on it exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Connection accepted, not yet registered with the hub.
    Connecting,
    /// Registered; the send loop is delivering events.
    Active,
    /// Server shutdown in progress; flushing queued events with a bounded
    /// timeout.
    Draining,
    /// Terminal. All resources released.
    Closed,
}

/// Outcome of a non-blocking enqueue attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The event was queued for delivery.
    Delivered,
    /// The queue was full; the event was dropped for this subscriber only.
    Dropped,
    /// The queue receiver is gone (subscriber torn down mid-fan-out).
    /// A benign race, not counted as a drop.
    Closed,
}

/// One connected subscriber.
///
/// Owned by the hub registry for its lifetime. The subscriber owns its
/// bounded outbound queue; the session's send loop owns the receiver half.
#[derive(Debug)]
pub struct Subscriber {
    /// Unique session identifier.
    pub id: SubscriberId,
    /// Bounded send channel to the session's WebSocket write task.
    tx: mpsc::Sender<Arc<str>>,
    /// When this subscriber was registered.
    pub connected_at: Instant,
    /// Whether the client has responded since the last heartbeat check.
    pub is_alive: AtomicBool,
    /// When the last Pong (or any activity) was received.
    last_pong: Mutex<Instant>,
    /// Count of events dropped due to a full queue.
    dropped_events: AtomicU64,
    /// Session lifecycle state.
    state: Mutex<SessionState>,
}

impl Subscriber {
    /// Create a new subscriber in the `Connecting` state.
    pub fn new(id: SubscriberId, tx: mpsc::Sender<Arc<str>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_events: AtomicU64::new(0),
            state: Mutex::new(SessionState::Connecting),
        }
    }

    /// Attempt to enqueue a serialized event without blocking.
    ///
    /// A full queue drops the event for this subscriber only and increments
    /// the dropped-event counter.
    pub fn enqueue(&self, message: Arc<str>) -> EnqueueOutcome {
        match self.tx.try_send(message) {
            Ok(()) => EnqueueOutcome::Delivered,
            Err(mpsc::error::TrySendError::Full(_)) => {
                let _ = self.dropped_events.fetch_add(1, Ordering::Relaxed);
                EnqueueOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => EnqueueOutcome::Closed,
        }
    }

    /// Total events dropped for this subscriber.
    pub fn drop_count(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    // ── Liveness ────────────────────────────────────────────────────────

    /// Mark the subscriber as alive (pong or other activity received).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Duration since the last pong (or registration).
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Check and reset the alive flag for the heartbeat monitor.
    ///
    /// Returns `true` if the subscriber was alive since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    // ── State machine ───────────────────────────────────────────────────

    /// Current session state.
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// `Connecting → Active` on successful registration.
    ///
    /// Returns `false` if the session is not in `Connecting`.
    pub fn activate(&self) -> bool {
        let mut state = self.state.lock();
        if *state == SessionState::Connecting {
            *state = SessionState::Active;
            true
        } else {
            false
        }
    }

    /// `Active → Draining` on server shutdown.
    ///
    /// Returns `false` if the session is not in `Active` (a session already
    /// closing skips the drain phase).
    pub fn begin_drain(&self) -> bool {
        let mut state = self.state.lock();
        if *state == SessionState::Active {
            *state = SessionState::Draining;
            true
        } else {
            false
        }
    }

    /// Transition to the terminal `Closed` state.
    ///
    /// Idempotent: returns `true` only for the call that performed the
    /// transition, `false` if already closed.
    pub fn close(&self) -> bool {
        let mut state = self.state.lock();
        if *state == SessionState::Closed {
            false
        } else {
            *state = SessionState::Closed;
            true
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn make_subscriber() -> (Subscriber, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(32);
        (Subscriber::new(SubscriberId::from("sub_1"), tx), rx)
    }

    #[test]
    fn starts_connecting_and_alive() {
        let (sub, _rx) = make_subscriber();
        assert_eq!(sub.state(), SessionState::Connecting);
        assert!(sub.is_alive.load(Ordering::Relaxed));
        assert_eq!(sub.drop_count(), 0);
    }

    #[tokio::test]
    async fn enqueue_delivers_in_order() {
        let (sub, mut rx) = make_subscriber();
        for i in 0..3 {
            let outcome = sub.enqueue(Arc::from(format!("e{i}")));
            assert_eq!(outcome, EnqueueOutcome::Delivered);
        }
        for i in 0..3 {
            let msg = rx.recv().await.unwrap();
            assert_eq!(&*msg, &format!("e{i}"));
        }
    }

    #[tokio::test]
    async fn full_queue_drops_and_counts() {
        let (tx, _rx) = mpsc::channel(1);
        let sub = Subscriber::new(SubscriberId::new(), tx);
        assert_eq!(sub.enqueue(Arc::from("first")), EnqueueOutcome::Delivered);
        assert_eq!(sub.enqueue(Arc::from("second")), EnqueueOutcome::Dropped);
        assert_eq!(sub.enqueue(Arc::from("third")), EnqueueOutcome::Dropped);
        assert_eq!(sub.drop_count(), 2);
    }

    #[tokio::test]
    async fn closed_queue_is_not_a_drop() {
        let (tx, rx) = mpsc::channel(4);
        let sub = Subscriber::new(SubscriberId::new(), tx);
        drop(rx);
        assert_eq!(sub.enqueue(Arc::from("late")), EnqueueOutcome::Closed);
        assert_eq!(sub.drop_count(), 0);
    }

    #[test]
    fn mark_alive_and_check() {
        let (sub, _rx) = make_subscriber();
        assert!(sub.check_alive());
        // After check, flag was reset
        assert!(!sub.check_alive());
        sub.mark_alive();
        assert!(sub.check_alive());
    }

    #[test]
    fn last_pong_updates_on_mark_alive() {
        let (sub, _rx) = make_subscriber();
        std::thread::sleep(Duration::from_millis(10));
        let before = sub.last_pong_elapsed();
        sub.mark_alive();
        assert!(sub.last_pong_elapsed() < before);
    }

    #[test]
    fn lifecycle_happy_path() {
        let (sub, _rx) = make_subscriber();
        assert!(sub.activate());
        assert_eq!(sub.state(), SessionState::Active);
        assert!(sub.begin_drain());
        assert_eq!(sub.state(), SessionState::Draining);
        assert!(sub.close());
        assert_eq!(sub.state(), SessionState::Closed);
    }

    #[test]
    fn active_closes_directly_on_failure() {
        let (sub, _rx) = make_subscriber();
        assert!(sub.activate());
        assert!(sub.close());
        assert_eq!(sub.state(), SessionState::Closed);
    }

    #[test]
    fn activate_only_from_connecting() {
        let (sub, _rx) = make_subscriber();
        assert!(sub.activate());
        assert!(!sub.activate());
    }

    #[test]
    fn drain_only_from_active() {
        let (sub, _rx) = make_subscriber();
        // Not yet active
        assert!(!sub.begin_drain());
        assert!(sub.activate());
        assert!(sub.close());
        // Already closed
        assert!(!sub.begin_drain());
    }

    #[test]
    fn close_is_idempotent() {
        let (sub, _rx) = make_subscriber();
        assert!(sub.close());
        assert!(!sub.close());
        assert!(!sub.close());
        assert_eq!(sub.state(), SessionState::Closed);
    }

    #[test]
    fn closed_is_terminal() {
        let (sub, _rx) = make_subscriber();
        let _ = sub.close();
        assert!(!sub.activate());
        assert!(!sub.begin_drain());
        assert_eq!(sub.state(), SessionState::Closed);
    }

    #[test]
    fn age_increases() {
        let (sub, _rx) = make_subscriber();
        let a = sub.age();
        std::thread::sleep(Duration::from_millis(10));
        assert!(sub.age() > a);
    }
}

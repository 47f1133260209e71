//! Error hierarchy for the Pulse broadcaster.
//!
//! Two small [`thiserror`] enums cover the failure domains:
//!
//! - [`HubError`]: registration failures at the hub boundary
//! - [`SessionError`]: fatal per-session conditions
//!
//! Slow-consumer drops are deliberately *not* errors — they are a counter
//! increment and a trace line, recovered locally. No error in one session
//! ever propagates to the hub or to another session.

use thiserror::Error;

/// Errors returned by hub operations.
#[derive(Debug, Error)]
pub enum HubError {
    /// Registration rejected because the subscriber limit was reached.
    /// Existing subscribers are unaffected; no eviction takes place.
    #[error("subscriber capacity exceeded (max {max})")]
    CapacityExceeded {
        /// The configured maximum subscriber count.
        max: usize,
    },
}

/// Fatal conditions terminating a single subscriber session.
///
/// Both variants are terminal for the affected session only: the session
/// is unregistered and its resources released, and the connection is never
/// retried server-side.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Writing to the peer failed (reset, broken pipe, closed socket).
    #[error("websocket write failed: {0}")]
    WriteFailure(String),

    /// The peer stopped answering heartbeat pings within the timeout window.
    #[error("liveness timeout: no pong within the configured window")]
    LivenessTimeout,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

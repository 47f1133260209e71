//! # pulse-hub
//!
//! The broadcast core of the Pulse deployment-status service:
//!
//! - [`Hub`]: owns the subscriber registry, accepts published events, and
//!   fans them out with per-subscriber backpressure
//! - [`Subscriber`]: one connected client — bounded outbound queue, liveness
//!   state, and an explicit session state machine
//! - [`heartbeat`]: ping/pong liveness monitoring with a cancellation token
//!
//! The hub never blocks a publisher: enqueueing is `try_send` with a
//! drop-on-full policy, so one slow consumer cannot stall delivery to the
//! rest.

#![deny(unsafe_code)]

pub mod heartbeat;
pub mod hub;
pub mod subscriber;

pub use heartbeat::{HeartbeatResult, run_heartbeat};
pub use hub::Hub;
pub use subscriber::{EnqueueOutcome, SessionState, Subscriber};

//! # pulse-server
//!
//! Axum HTTP + `WebSocket` server for the Pulse broadcaster.
//!
//! - `/ws/deploy`: WebSocket egress — one JSON `DeploymentEvent` per message
//! - `/health`: JSON health check with live subscriber counters
//! - `/metrics`: Prometheus text endpoint
//! - Graceful shutdown via `tokio::signal` + `CancellationToken`
//!
//! The hub ingress (`Hub::publish`) is exposed through
//! [`server::PulseServer::hub`]; the event source is an in-process
//! collaborator, not a network protocol.

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod metrics;
pub mod server;
pub mod session;
pub mod shutdown;

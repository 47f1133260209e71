//! # pulse-core
//!
//! Foundation types for the Pulse deployment-status broadcaster.
//!
//! This crate provides the shared vocabulary the other Pulse crates depend on:
//!
//! - **Branded IDs**: `EventId`, `SubscriberId` as newtypes for type safety
//! - **Events**: `DeploymentEvent` with status and health-check enums
//! - **Errors**: `HubError` / `SessionError` hierarchy via `thiserror`

#![deny(unsafe_code)]

pub mod errors;
pub mod events;
pub mod ids;

pub use errors::{HubError, SessionError};
pub use events::{CheckResult, DeployStatus, DeploymentEvent};
pub use ids::{EventId, SubscriberId};

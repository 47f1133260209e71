//! Deployment-status event types.
//!
//! [`DeploymentEvent`] is the single value that flows through the system:
//! constructed by an event source, published into the hub, serialized once,
//! and fanned out read-only to every subscriber. It is never mutated after
//! construction.
//!
//! # Wire format
//!
//! Each event is one JSON object with exactly these fields:
//!
//! ```json
//! {
//!   "id": "0192d9e3-...-uuid",
//!   "service": "auth-service",
//!   "environment": "prod",
//!   "status": "healthy",
//!   "health_checks": { "pre": "healthy", "post": "healthy" },
//!   "timestamp": 1735689600
//! }
//! ```

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::ids::EventId;

/// Overall status of a deployment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStatus {
    /// Deployment completed and all checks pass.
    Healthy,
    /// Deployment is serving but some checks fail.
    Degraded,
    /// Deployment failed.
    Failed,
    /// Deployment is still rolling out.
    InProgress,
}

/// Result of a single health-check phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckResult {
    /// The check passed.
    Healthy,
    /// The check produced warnings.
    Degraded,
    /// The check failed.
    Failed,
}

/// An immutable deployment-status event.
///
/// `health_checks` maps a check-phase name (e.g. `"pre"`, `"post"`) to its
/// result. A `BTreeMap` keeps serialization order stable for clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentEvent {
    /// Unique event identifier (UUID string). Opaque to the hub; clients
    /// may use it for dedup.
    pub id: EventId,
    /// Service name.
    pub service: String,
    /// Environment name (e.g. `"prod"`, `"staging"`).
    pub environment: String,
    /// Overall deployment status.
    pub status: DeployStatus,
    /// Per-phase health-check results.
    pub health_checks: BTreeMap<String, CheckResult>,
    /// Unix timestamp in seconds.
    pub timestamp: i64,
}

impl DeploymentEvent {
    /// Create a new event with a fresh ID and the current wall-clock time.
    #[must_use]
    pub fn new(
        service: impl Into<String>,
        environment: impl Into<String>,
        status: DeployStatus,
        health_checks: BTreeMap<String, CheckResult>,
    ) -> Self {
        Self {
            id: EventId::new(),
            service: service.into(),
            environment: environment.into(),
            status,
            health_checks,
            timestamp: Utc::now().timestamp(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

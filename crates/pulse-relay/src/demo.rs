//! Synthetic deployment feed for demos and local dashboard development.
//!
//! Cycles through a fixed roster of services and statuses so the output is
//! predictable without being constant. Real deployments publish through
//! `Hub::publish` directly; this module exists so the server is interesting
//! to watch with nothing else wired up.

use std::collections::BTreeMap;

use pulse_core::{CheckResult, DeployStatus, DeploymentEvent};

const SERVICES: &[&str] = &[
    "auth-service",
    "billing",
    "user-api",
    "notifications",
    "search-indexer",
];

const ENVIRONMENTS: &[&str] = &["production", "staging"];

const STATUSES: &[DeployStatus] = &[
    DeployStatus::InProgress,
    DeployStatus::Healthy,
    DeployStatus::Healthy,
    DeployStatus::Degraded,
    DeployStatus::Healthy,
    DeployStatus::Failed,
];

/// Deterministic rotation over services, environments, and statuses.
pub struct DemoFeed {
    tick: usize,
}

impl DemoFeed {
    /// Create a feed starting from the first rotation slot.
    pub fn new() -> Self {
        Self { tick: 0 }
    }

    /// Produce the next synthetic event.
    pub fn next_event(&mut self) -> DeploymentEvent {
        let service = SERVICES[self.tick % SERVICES.len()];
        let environment = ENVIRONMENTS[(self.tick / SERVICES.len()) % ENVIRONMENTS.len()];
        let status = STATUSES[self.tick % STATUSES.len()];
        self.tick += 1;

        let mut checks = BTreeMap::new();
        let _ = checks.insert("pre_deploy".to_owned(), CheckResult::Healthy);
        let _ = checks.insert("post_deploy".to_owned(), post_deploy_check(status));

        DeploymentEvent::new(service, environment, status, checks)
    }
}

impl Default for DemoFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// The post-deploy check mirrors the deployment status.
fn post_deploy_check(status: DeployStatus) -> CheckResult {
    match status {
        DeployStatus::Healthy | DeployStatus::InProgress => CheckResult::Healthy,
        DeployStatus::Degraded => CheckResult::Degraded,
        DeployStatus::Failed => CheckResult::Failed,
    }
}

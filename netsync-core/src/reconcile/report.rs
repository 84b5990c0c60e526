//! Outcome of one reconciliation pass.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::context::PassContext;

#[derive(Debug, Clone, Default, Serialize)]
pub struct PassReport {
    pub pass_id: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub platform_networks: usize,
    pub controller_networks: usize,
    pub networks_created: usize,
    pub networks_deleted: usize,
    pub vms_created: usize,
    pub vms_deleted: usize,
    /// Matched VMs whose missing address object was created.
    pub vms_repaired: usize,
    pub agents_updated: usize,
    /// Agent notifications that did not reach the agent. The notifier keeps
    /// the desired state and replays it on reconnect.
    pub agent_failures: usize,
    /// Controller actions abandoned this pass.
    pub failures: Vec<String>,
}

impl PassReport {
    pub fn new(pass: &PassContext) -> Self {
        Self {
            pass_id: pass.pass_id.clone(),
            started_at: pass.started_at,
            ..Default::default()
        }
    }

    /// Controller actions applied.
    pub fn actions(&self) -> usize {
        self.networks_created
            + self.networks_deleted
            + self.vms_created
            + self.vms_deleted
            + self.vms_repaired
    }

    pub fn is_converged(&self) -> bool {
        self.failures.is_empty() && self.agent_failures == 0
    }

    pub fn record_failure(&mut self, failure: String) {
        self.failures.push(failure);
    }

    pub fn finish(&mut self) {
        let elapsed = Utc::now() - self.started_at;
        self.duration_ms = elapsed.num_milliseconds().max(0) as u64;
    }
}

//! Per-agent health state.

use peanut_core::Timestamp;
use serde::{Deserialize, Serialize};

/// Health classification from the latest probe or call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Probe returned 2xx, or the last call succeeded.
    Online,
    /// The backend is unreachable.
    Offline,
    /// Reachable but misbehaving (non-2xx probe or failed call).
    Degraded,
    /// Taken out of rotation by an operator.
    Maintenance,
}

/// The one health row each agent owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentHealth {
    /// The owning agent (also the record key).
    pub id: String,
    /// Current classification.
    pub status: HealthStatus,
    /// Latency of the most recent probe or call, in milliseconds.
    pub latency_ms: u64,
    /// `(request_count - error_count) / request_count`, 1.0 when idle.
    pub success_rate: f64,
    /// Dispatches attempted against this agent.
    pub request_count: u64,
    /// Dispatches that failed.
    pub error_count: u64,
    /// When the row was last refreshed.
    pub last_checked_at: Timestamp,
    /// Free-text detail from the last probe.
    pub details: String,
}

impl AgentHealth {
    /// The row created alongside a new agent: offline until probed.
    #[must_use]
    pub fn initial(agent_id: impl Into<String>) -> Self {
        Self {
            id: agent_id.into(),
            status: HealthStatus::Offline,
            latency_ms: 0,
            success_rate: 1.0,
            request_count: 0,
            error_count: 0,
            last_checked_at: Timestamp::now(),
            details: "not yet probed".to_string(),
        }
    }

    /// Snapshot updated by a probe; counters are preserved.
    #[must_use]
    pub fn observe_probe(
        mut self,
        status: HealthStatus,
        latency_ms: u64,
        details: impl Into<String>,
    ) -> Self {
        self.status = status;
        self.latency_ms = latency_ms;
        self.details = details.into();
        self.last_checked_at = Timestamp::now();
        self.success_rate = Self::rate(self.request_count, self.error_count);
        self
    }

    /// Snapshot updated by a dispatch outcome.
    #[must_use]
    pub fn observe_call(mut self, success: bool, latency_ms: u64) -> Self {
        self.request_count = self.request_count.saturating_add(1);
        if !success {
            self.error_count = self.error_count.saturating_add(1);
        }
        self.status = if success {
            HealthStatus::Online
        } else {
            HealthStatus::Degraded
        };
        self.latency_ms = latency_ms;
        self.last_checked_at = Timestamp::now();
        self.success_rate = Self::rate(self.request_count, self.error_count);
        self
    }

    #[allow(clippy::cast_precision_loss)]
    fn rate(request_count: u64, error_count: u64) -> f64 {
        if request_count == 0 {
            1.0
        } else {
            request_count.saturating_sub(error_count) as f64 / request_count as f64
        }
    }
}

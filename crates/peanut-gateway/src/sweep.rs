//! The background health sweep.

use peanut_agents::Orchestrator;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Spawn the 30-second health sweep over all registered agents.
///
/// The returned handle can be aborted at shutdown; probe failures are
/// logged inside the sweep and never end it.
pub fn spawn_health_sweep(orchestrator: Orchestrator) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        // The immediate first tick probes the pool right after boot.
        loop {
            ticker.tick().await;
            debug!("running agent health sweep");
            orchestrator.probe_all().await;
        }
    })
}

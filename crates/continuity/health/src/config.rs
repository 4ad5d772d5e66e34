//! Health checking configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the health check service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    /// Interval between full check cycles.
    pub check_interval: Duration,

    /// Per-probe timeout; a timed-out probe counts as a failure.
    pub probe_timeout: Duration,

    /// Latency above this is classified as degraded.
    pub latency_threshold_ms: u64,

    /// Consecutive failures before a service is unhealthy.
    pub failure_threshold: u32,

    /// Consecutive failures before a service is offline.
    pub offline_threshold: u32,

    /// Hours a snapshot stays in the rolling windows.
    pub snapshot_retention_hours: u32,

    /// Upper bound on probes in flight at once.
    pub max_concurrent_probes: usize,

    /// Capacity of the health event broadcast channel.
    pub event_capacity: usize,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            latency_threshold_ms: 500,
            failure_threshold: 3,
            offline_threshold: 6,
            snapshot_retention_hours: 24,
            max_concurrent_probes: 8,
            event_capacity: 1024,
        }
    }
}

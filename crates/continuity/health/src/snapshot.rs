//! Point-in-time health snapshots and rolling windows.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use continuity_types::{HealthStatus, ServiceHealth, ServiceId, SnapshotId};
use serde::{Deserialize, Serialize};

/// Immutable aggregate of one check cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// Unique snapshot ID.
    pub snapshot_id: SnapshotId,

    /// Time the cycle completed.
    pub timestamp: DateTime<Utc>,

    /// Worst status among constituent services.
    pub overall_status: HealthStatus,

    /// Per-service health at this instant.
    pub services: HashMap<ServiceId, ServiceHealth>,

    /// Services classified healthy.
    pub healthy_count: u32,

    /// Services classified degraded.
    pub degraded_count: u32,

    /// Services classified unhealthy.
    pub unhealthy_count: u32,

    /// Services classified offline.
    pub offline_count: u32,

    /// Mean probe latency across services this cycle.
    pub avg_latency_ms: f64,
}

impl HealthSnapshot {
    /// Aggregate a snapshot from per-service records.
    ///
    /// `overall_status` is the maximum (worst) status present; an empty
    /// registry aggregates to healthy.
    pub fn from_services(services: HashMap<ServiceId, ServiceHealth>) -> Self {
        let mut healthy = 0u32;
        let mut degraded = 0u32;
        let mut unhealthy = 0u32;
        let mut offline = 0u32;
        let mut latency_sum = 0u64;

        for health in services.values() {
            match health.status {
                HealthStatus::Healthy => healthy += 1,
                HealthStatus::Degraded => degraded += 1,
                HealthStatus::Unhealthy => unhealthy += 1,
                HealthStatus::Offline => offline += 1,
            }
            latency_sum += health.latency_ms;
        }

        let overall_status = services
            .values()
            .map(|h| h.status)
            .max()
            .unwrap_or(HealthStatus::Healthy);

        let avg_latency_ms = if services.is_empty() {
            0.0
        } else {
            latency_sum as f64 / services.len() as f64
        };

        Self {
            snapshot_id: SnapshotId::generate(),
            timestamp: Utc::now(),
            overall_status,
            services,
            healthy_count: healthy,
            degraded_count: degraded,
            unhealthy_count: unhealthy,
            offline_count: offline,
            avg_latency_ms,
        }
    }
}

/// Rolling snapshot window with retention-based pruning.
#[derive(Debug, Default)]
pub struct SnapshotWindow {
    snapshots: Vec<HealthSnapshot>,
}

impl SnapshotWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a snapshot and drop everything past retention.
    pub fn push(&mut self, snapshot: HealthSnapshot, retention_hours: u32) {
        self.snapshots.push(snapshot);
        let cutoff = Utc::now() - Duration::hours(i64::from(retention_hours));
        self.snapshots.retain(|s| s.timestamp >= cutoff);
    }

    /// Latest snapshot, if any cycle has run.
    pub fn current(&self) -> Option<&HealthSnapshot> {
        self.snapshots.last()
    }

    /// Snapshots within the trailing `hours`.
    pub fn within_hours(&self, hours: u32) -> Vec<HealthSnapshot> {
        let cutoff = Utc::now() - Duration::hours(i64::from(hours));
        self.snapshots
            .iter()
            .filter(|s| s.timestamp >= cutoff)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

/// Lifetime check counters for one service.
///
/// Snapshots get pruned; these do not, so the uptime report can still speak
/// for the full monitoring history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckCounters {
    pub total_checks: u64,
    pub healthy_checks: u64,
    pub latency_sum_ms: u64,
}

impl CheckCounters {
    pub fn record(&mut self, status: HealthStatus, latency_ms: u64) {
        self.total_checks += 1;
        if status == HealthStatus::Healthy {
            self.healthy_checks += 1;
        }
        self.latency_sum_ms += latency_ms;
    }

    pub fn uptime_percent(&self) -> f64 {
        if self.total_checks == 0 {
            100.0
        } else {
            self.healthy_checks as f64 / self.total_checks as f64 * 100.0
        }
    }
}

/// Per-service uptime over a report window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceUptime {
    pub service_name: String,
    pub checks_in_window: u64,
    pub healthy_in_window: u64,
    pub uptime_percent: f64,
    pub avg_latency_ms: f64,
    pub lifetime_checks: u64,
    pub lifetime_uptime_percent: f64,
}

/// Uptime report over the trailing `period_hours`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UptimeReport {
    pub period_hours: u32,
    pub generated_at: DateTime<Utc>,
    pub services: HashMap<ServiceId, ServiceUptime>,
}

impl UptimeReport {
    /// Build a report from windowed snapshots plus lifetime counters.
    pub fn build(
        period_hours: u32,
        snapshots: &[HealthSnapshot],
        counters: &HashMap<ServiceId, (String, CheckCounters)>,
    ) -> Self {
        let mut services = HashMap::new();

        for (service_id, (name, lifetime)) in counters {
            let mut checks = 0u64;
            let mut healthy = 0u64;
            let mut latency_sum = 0u64;

            for snapshot in snapshots {
                if let Some(health) = snapshot.services.get(service_id) {
                    checks += 1;
                    if health.status == HealthStatus::Healthy {
                        healthy += 1;
                    }
                    latency_sum += health.latency_ms;
                }
            }

            let uptime_percent = if checks == 0 {
                100.0
            } else {
                healthy as f64 / checks as f64 * 100.0
            };
            let avg_latency_ms = if checks == 0 {
                0.0
            } else {
                latency_sum as f64 / checks as f64
            };

            services.insert(
                service_id.clone(),
                ServiceUptime {
                    service_name: name.clone(),
                    checks_in_window: checks,
                    healthy_in_window: healthy,
                    uptime_percent,
                    avg_latency_ms,
                    lifetime_checks: lifetime.total_checks,
                    lifetime_uptime_percent: lifetime.uptime_percent(),
                },
            );
        }

        Self {
            period_hours,
            generated_at: Utc::now(),
            services,
        }
    }
}

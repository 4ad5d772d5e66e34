//! Service classification and per-endpoint health records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ServiceId;

/// Category of backing service being monitored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    /// Entity graph store.
    GraphDb,

    /// Full-text search index.
    SearchIndex,

    /// Cache layer.
    Cache,

    /// Message broker.
    MessageBroker,

    /// External federal records endpoint (NCIC-style).
    FederalRecords,

    /// External federal watchlist endpoint.
    FederalWatchlist,
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceType::GraphDb => write!(f, "graph_db"),
            ServiceType::SearchIndex => write!(f, "search_index"),
            ServiceType::Cache => write!(f, "cache"),
            ServiceType::MessageBroker => write!(f, "message_broker"),
            ServiceType::FederalRecords => write!(f, "federal_records"),
            ServiceType::FederalWatchlist => write!(f, "federal_watchlist"),
        }
    }
}

/// Health status of one monitored endpoint.
///
/// Ordered by severity: `Healthy < Degraded < Unhealthy < Offline`, so the
/// worst status in a set is simply the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Responding within latency budget.
    Healthy,

    /// Responding but slower than the latency threshold.
    Degraded,

    /// Consecutive failures crossed the failure threshold.
    Unhealthy,

    /// Unreachable beyond the offline window.
    Offline,
}

impl HealthStatus {
    /// Whether the status counts as a failure for threshold tracking.
    pub fn is_failure(&self) -> bool {
        matches!(self, HealthStatus::Unhealthy | HealthStatus::Offline)
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
            HealthStatus::Offline => write!(f, "offline"),
        }
    }
}

/// Point-in-time health record for one monitored endpoint.
///
/// Mutated only by the health check service on each probe cycle; everything
/// downstream sees it as a value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    /// Endpoint being monitored.
    pub service_id: ServiceId,

    /// Category of the service.
    pub service_type: ServiceType,

    /// Human-readable name.
    pub service_name: String,

    /// Current classified status.
    pub status: HealthStatus,

    /// Latency of the last probe in milliseconds.
    pub latency_ms: u64,

    /// Error from the last failed probe, if any.
    pub error_message: Option<String>,

    /// Consecutive probe failures.
    pub consecutive_failures: u32,

    /// Time of the last probe.
    pub last_checked: DateTime<Utc>,
}

impl ServiceHealth {
    /// Create an initial record for a newly registered service.
    pub fn new(service_id: ServiceId, service_type: ServiceType, service_name: impl Into<String>) -> Self {
        Self {
            service_id,
            service_type,
            service_name: service_name.into(),
            status: HealthStatus::Healthy,
            latency_ms: 0,
            error_message: None,
            consecutive_failures: 0,
            last_checked: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_ordering_worst_is_max() {
        let statuses = [
            HealthStatus::Degraded,
            HealthStatus::Healthy,
            HealthStatus::Offline,
            HealthStatus::Unhealthy,
        ];
        assert_eq!(statuses.iter().max(), Some(&HealthStatus::Offline));
        assert!(HealthStatus::Healthy < HealthStatus::Degraded);
        assert!(HealthStatus::Unhealthy < HealthStatus::Offline);
    }

    #[test]
    fn test_failure_classification() {
        assert!(!HealthStatus::Healthy.is_failure());
        assert!(!HealthStatus::Degraded.is_failure());
        assert!(HealthStatus::Unhealthy.is_failure());
        assert!(HealthStatus::Offline.is_failure());
    }
}

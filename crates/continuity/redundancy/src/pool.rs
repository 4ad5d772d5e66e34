//! Connection pool and instance state.

use chrono::{DateTime, Utc};
use continuity_types::{InstanceId, PoolId};
use serde::{Deserialize, Serialize};

/// Redundancy tier of a pool.
///
/// Determines how continuously the secondary is kept ready to take over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedundancyMode {
    /// Continuous replication, secondary connected, near-instant failover.
    Hot,

    /// Periodic replication; failover connects the secondary first.
    Warm,

    /// No background replication; failover is an operator bring-up.
    Cold,
}

impl std::fmt::Display for RedundancyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RedundancyMode::Hot => write!(f, "hot"),
            RedundancyMode::Warm => write!(f, "warm"),
            RedundancyMode::Cold => write!(f, "cold"),
        }
    }
}

/// Role of an instance within its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceRole {
    Primary,
    Secondary,
    Standby,
}

/// Connection lifecycle state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Reconnecting,

    /// Retries exhausted; requires operator intervention.
    Failed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Reconnecting => write!(f, "reconnecting"),
            ConnectionState::Failed => write!(f, "failed"),
        }
    }
}

/// One member of a redundancy pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub instance_id: InstanceId,
    pub endpoint: String,
    pub role: InstanceRole,
    pub state: ConnectionState,
    pub is_healthy: bool,

    /// When this instance last participated in a successful sync.
    pub last_sync_at: Option<DateTime<Utc>>,

    /// Consecutive failed sync passes against this instance.
    pub reconnect_attempts: u32,
}

impl ServiceInstance {
    pub fn new(endpoint: impl Into<String>, role: InstanceRole) -> Self {
        Self {
            instance_id: InstanceId::generate(),
            endpoint: endpoint.into(),
            role,
            state: ConnectionState::Disconnected,
            is_healthy: true,
            last_sync_at: None,
            reconnect_attempts: 0,
        }
    }

    /// Whether the instance can accept traffic right now.
    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Connected && self.is_healthy
    }
}

/// A primary/secondary pair serving one backing service.
///
/// Owned exclusively by the redundancy manager; everything else sees clones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionPool {
    pub pool_id: PoolId,
    pub service_name: String,
    pub mode: RedundancyMode,
    pub primary: ServiceInstance,
    pub secondary: ServiceInstance,

    /// Which instance traffic currently routes to.
    pub active_instance_id: InstanceId,
}

impl ConnectionPool {
    pub fn new(
        pool_id: PoolId,
        service_name: impl Into<String>,
        primary_endpoint: impl Into<String>,
        secondary_endpoint: impl Into<String>,
        mode: RedundancyMode,
    ) -> Self {
        let primary = ServiceInstance::new(primary_endpoint, InstanceRole::Primary);
        let secondary_role = match mode {
            RedundancyMode::Cold => InstanceRole::Standby,
            _ => InstanceRole::Secondary,
        };
        let secondary = ServiceInstance::new(secondary_endpoint, secondary_role);
        let active_instance_id = primary.instance_id.clone();
        Self {
            pool_id,
            service_name: service_name.into(),
            mode,
            primary,
            secondary,
            active_instance_id,
        }
    }

    /// The instance currently serving traffic.
    pub fn active_instance(&self) -> &ServiceInstance {
        if self.active_instance_id == self.secondary.instance_id {
            &self.secondary
        } else {
            &self.primary
        }
    }

    /// The instance not serving traffic.
    pub fn standby_instance(&self) -> &ServiceInstance {
        if self.active_instance_id == self.secondary.instance_id {
            &self.primary
        } else {
            &self.secondary
        }
    }

    /// Whether traffic currently routes to the secondary.
    pub fn is_failed_over(&self) -> bool {
        self.active_instance_id == self.secondary.instance_id
    }
}

/// Immutable record of one replication pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEvent {
    pub pool_id: PoolId,
    pub timestamp: DateTime<Utc>,
    pub from_instance: InstanceId,
    pub to_instance: InstanceId,
    pub records_synced: u64,
    pub duration_ms: u64,
    pub success: bool,
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_starts_on_primary() {
        let pool = ConnectionPool::new(
            PoolId::new("cache-pool"),
            "redis",
            "redis://a:6379",
            "redis://b:6379",
            RedundancyMode::Hot,
        );
        assert!(!pool.is_failed_over());
        assert_eq!(pool.active_instance().endpoint, "redis://a:6379");
        assert_eq!(pool.standby_instance().endpoint, "redis://b:6379");
        assert_eq!(pool.secondary.role, InstanceRole::Secondary);
    }

    #[test]
    fn test_cold_secondary_is_standby() {
        let pool = ConnectionPool::new(
            PoolId::new("archive-pool"),
            "archive",
            "pg://a:5432",
            "pg://b:5432",
            RedundancyMode::Cold,
        );
        assert_eq!(pool.secondary.role, InstanceRole::Standby);
    }

    #[test]
    fn test_instance_readiness() {
        let mut instance = ServiceInstance::new("redis://a:6379", InstanceRole::Primary);
        assert!(!instance.is_ready());
        instance.state = ConnectionState::Connected;
        assert!(instance.is_ready());
        instance.is_healthy = false;
        assert!(!instance.is_ready());
    }
}

//! Engine-level configuration.

use continuity_audit::AuditConfig;
use continuity_failover::FailoverConfig;
use continuity_health::HealthCheckConfig;
use continuity_redundancy::RedundancyConfig;
use serde::{Deserialize, Serialize};

/// Configuration for every component of the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub health: HealthCheckConfig,
    pub failover: FailoverConfig,
    pub redundancy: RedundancyConfig,
    pub audit: AuditConfig,

    /// Actor name written to audit entries produced by the engine itself.
    pub actor: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            health: HealthCheckConfig::default(),
            failover: FailoverConfig::default(),
            redundancy: RedundancyConfig::default(),
            audit: AuditConfig::default(),
            actor: "continuity-engine".to_string(),
        }
    }
}

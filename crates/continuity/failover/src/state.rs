//! Failover state machine types.

use chrono::{DateTime, Utc};
use continuity_types::{EventId, ServiceType};
use serde::{Deserialize, Serialize};

/// Continuity state of one service type.
///
/// Normal → Degraded → Failover → Emergency, with a recovery edge back to
/// Normal from any non-Normal state once health is restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailoverState {
    /// Primary serving traffic, no failures in window.
    Normal,

    /// Failures observed but below the activation threshold.
    Degraded,

    /// Fallback target is active.
    Failover,

    /// Fallback is failing too.
    Emergency,
}

impl std::fmt::Display for FailoverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailoverState::Normal => write!(f, "normal"),
            FailoverState::Degraded => write!(f, "degraded"),
            FailoverState::Failover => write!(f, "failover"),
            FailoverState::Emergency => write!(f, "emergency"),
        }
    }
}

/// Immutable record of one state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverEvent {
    /// Unique event ID.
    pub event_id: EventId,

    /// Time of the transition.
    pub timestamp: DateTime<Utc>,

    /// Service type that transitioned.
    pub service_type: ServiceType,

    /// State before.
    pub from_state: FailoverState,

    /// State after.
    pub to_state: FailoverState,

    /// Why the transition happened.
    pub trigger_reason: String,

    /// Whether thresholds (rather than an operator) drove it.
    pub auto_triggered: bool,

    /// Seconds spent failed over, populated on recovery transitions.
    pub recovery_time_seconds: Option<f64>,
}

impl FailoverEvent {
    pub fn new(
        service_type: ServiceType,
        from_state: FailoverState,
        to_state: FailoverState,
        trigger_reason: impl Into<String>,
        auto_triggered: bool,
    ) -> Self {
        Self {
            event_id: EventId::generate(),
            timestamp: Utc::now(),
            service_type,
            from_state,
            to_state,
            trigger_reason: trigger_reason.into(),
            auto_triggered,
            recovery_time_seconds: None,
        }
    }

    pub fn with_recovery_time(mut self, seconds: f64) -> Self {
        self.recovery_time_seconds = Some(seconds);
        self
    }
}

/// Redundancy routing for one service type.
///
/// Created at registration and reused across failover cycles; only the
/// activation fields mutate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceFallback {
    /// Service type this fallback covers.
    pub service_type: ServiceType,

    /// Endpoint normally serving traffic.
    pub primary_target: String,

    /// Endpoint traffic is redirected to on failover.
    pub fallback_target: String,

    /// Whether the fallback is currently serving.
    pub is_active: bool,

    /// When the fallback was last activated.
    pub activated_at: Option<DateTime<Utc>>,

    /// Operations currently buffered for replay.
    pub buffered_operations: u64,
}

impl ServiceFallback {
    pub fn new(
        service_type: ServiceType,
        primary_target: impl Into<String>,
        fallback_target: impl Into<String>,
    ) -> Self {
        Self {
            service_type,
            primary_target: primary_target.into(),
            fallback_target: fallback_target.into(),
            is_active: false,
            activated_at: None,
            buffered_operations: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_recovery_time() {
        let event = FailoverEvent::new(
            ServiceType::Cache,
            FailoverState::Failover,
            FailoverState::Normal,
            "health restored",
            true,
        )
        .with_recovery_time(12.5);

        assert_eq!(event.recovery_time_seconds, Some(12.5));
        assert_eq!(event.to_state, FailoverState::Normal);
    }

    #[test]
    fn test_fallback_starts_inactive() {
        let fallback =
            ServiceFallback::new(ServiceType::Cache, "redis://a:6379", "redis://b:6379");
        assert!(!fallback.is_active);
        assert!(fallback.activated_at.is_none());
        assert_eq!(fallback.buffered_operations, 0);
    }
}

//! Failover decision configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Whether failover triggers on thresholds or only by operator action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailoverMode {
    /// Threshold breaches activate fallbacks without an operator.
    Automatic,

    /// Only `manual_failover` activates fallbacks.
    Manual,
}

impl std::fmt::Display for FailoverMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailoverMode::Automatic => write!(f, "automatic"),
            FailoverMode::Manual => write!(f, "manual"),
        }
    }
}

/// Configuration for the failover manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverConfig {
    /// Consecutive failure reports before a fallback activates.
    pub failure_threshold: u32,

    /// Consecutive healthy reports before automatic recovery.
    pub recovery_threshold: u32,

    /// Cap on buffered operations per service type; overflow drops oldest.
    pub buffer_max_size: usize,

    /// Minimum dwell time in failover before recovery may run.
    pub cooldown: Duration,

    /// Automatic vs. operator-driven activation.
    pub mode: FailoverMode,

    /// Whether healthy fallbacks recover back to the primary on their own.
    pub auto_recovery_enabled: bool,

    /// Capacity of the failover event broadcast channel.
    pub event_capacity: usize,

    /// Cap on the retained event history; overflow drops oldest.
    pub max_retained_events: usize,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_threshold: 2,
            buffer_max_size: 1000,
            cooldown: Duration::from_secs(60),
            mode: FailoverMode::Automatic,
            auto_recovery_enabled: true,
            event_capacity: 1024,
            max_retained_events: 1024,
        }
    }
}

//! Redundancy pool configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the redundancy manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedundancyConfig {
    /// Tick interval driving hot pool replication.
    pub hot_sync_interval: Duration,

    /// Replication interval for warm pools.
    pub sync_interval: Duration,

    /// Deadline for establishing an instance connection.
    pub connect_timeout: Duration,

    /// Deadline for one replication pass.
    pub sync_timeout: Duration,

    /// Failed sync passes tolerated before an instance is marked failed.
    pub max_reconnect_attempts: u32,

    /// Capacity of the redundancy event broadcast channel.
    pub event_capacity: usize,

    /// Cap on the retained sync event history; overflow drops oldest.
    pub max_retained_events: usize,
}

impl Default for RedundancyConfig {
    fn default() -> Self {
        Self {
            hot_sync_interval: Duration::from_secs(5),
            sync_interval: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            sync_timeout: Duration::from_secs(30),
            max_reconnect_attempts: 3,
            event_capacity: 1024,
            max_retained_events: 1024,
        }
    }
}

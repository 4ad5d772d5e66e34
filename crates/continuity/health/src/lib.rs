//! # Continuity Health - Periodic Health Checking
//!
//! Probes registered backing services (graph store, search index, cache,
//! message broker, federal endpoints) through caller-supplied adapters,
//! classifies each as healthy, degraded, unhealthy, or offline, and publishes
//! aggregated snapshots on a broadcast channel.
//!
//! ## Key Components
//!
//! - [`HealthCheckService`]: registration, the check cycle, and the loop
//! - [`HealthSnapshot`]: immutable per-cycle aggregate (worst status wins)
//! - [`UptimeReport`]: windowed uptime and latency per service
//! - [`HealthEvent`]: broadcast stream downstream layers subscribe to
//!
//! ## Failure Semantics
//!
//! Individual probe failures are recorded, never raised: a check cycle
//! always completes and always produces exactly one snapshot, even when
//! every monitored service is unreachable.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod monitor;
pub mod snapshot;

pub use config::HealthCheckConfig;
pub use error::{HealthError, HealthResult};
pub use monitor::{HealthCheckService, HealthEvent, HealthMetrics, HealthServiceStatus};
pub use snapshot::{CheckCounters, HealthSnapshot, ServiceUptime, SnapshotWindow, UptimeReport};

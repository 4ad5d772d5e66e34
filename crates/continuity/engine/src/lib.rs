//! # Continuity Engine - Composition Root
//!
//! Wires the four continuity components into one explicitly constructed,
//! dependency-injected engine:
//!
//! - [`continuity_health::HealthCheckService`] probes backing services
//! - [`continuity_failover::FailoverManager`] decides when a service type
//!   fails over to its fallback
//! - [`continuity_redundancy::RedundancyManager`] keeps redundant instance
//!   pairs replicated and switches pools
//! - [`continuity_audit::OpsAuditLog`] records every transition in a
//!   tamper-evident hash chain
//!
//! Components communicate over broadcast channels; the engine owns the
//! bridge tasks that forward probe results into failover decisions, drive
//! linked pool switches, and write everything to the audit log.

#![deny(unsafe_code)]

pub mod config;
pub mod engine;

pub use config::EngineConfig;
pub use engine::{ContinuityEngine, EngineStatus};

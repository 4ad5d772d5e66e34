//! # Continuity Types - Shared Types for the Operational Continuity Engine
//!
//! Strongly-typed identifiers, service health records, and the client
//! adapter boundary shared by every continuity crate.
//!
//! The engine monitors backing services (graph store, search index, cache,
//! message broker, federal endpoints), fails traffic over to redundant
//! instances, and audits every transition. This crate defines the vocabulary
//! the other crates speak:
//!
//! - [`ServiceId`], [`PoolId`], [`InstanceId`] and friends: UUID/string
//!   newtypes for type-safe identifiers
//! - [`ServiceType`] / [`HealthStatus`] / [`ServiceHealth`]: per-endpoint
//!   health classification
//! - [`ServiceAdapter`] / [`PoolTransport`]: the narrow probe/connect/sync
//!   contract callers implement for each monitored service

#![deny(unsafe_code)]

pub mod adapter;
pub mod ids;
pub mod service;

pub use adapter::{
    AdapterError, AdapterResult, PoolTransport, ProbeOutcome, ServiceAdapter, StaticAdapter,
    StaticTransport,
};
pub use ids::{EntryId, EventId, InstanceId, PoolId, ServiceId, SnapshotId};
pub use service::{HealthStatus, ServiceHealth, ServiceType};

//! # Continuity Redundancy - Hot/Warm/Cold Pool Management
//!
//! Keeps a redundant instance pair behind each backing service and replicates
//! data between them according to the pool's tier:
//!
//! - **Hot**: continuous replication with the secondary connected, so a
//!   failover is just a routing switch
//! - **Warm**: periodic replication; failover connects the secondary first
//! - **Cold**: no background replication; failover is an operator bring-up
//!
//! Pool state has a single writer (the [`RedundancyManager`]); everything
//! else consumes cloned snapshots or broadcast [`RedundancyEvent`]s. Failed
//! sync passes retry up to a limit before the instance is marked failed and
//! escalated.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod manager;
pub mod pool;

pub use config::RedundancyConfig;
pub use error::{RedundancyError, RedundancyResult};
pub use manager::{RedundancyEvent, RedundancyManager, RedundancyMetrics, RedundancyStatus};
pub use pool::{ConnectionPool, ConnectionState, InstanceRole, RedundancyMode, ServiceInstance, SyncEvent};

//! # Continuity Failover - Debounced Failover Decisions
//!
//! The decision layer of the Operational Continuity Engine. Consumes health
//! updates from the monitoring layer, applies a debounced threshold policy to
//! decide when a service type fails over to its registered fallback target,
//! buffers operations during the transition, and drives automatic or manual
//! recovery back to the primary.
//!
//! Per service type the state machine is Normal → Degraded → Failover →
//! Emergency, with a recovery edge back to Normal. A cooldown enforces a
//! minimum dwell time in failover so a brief healthy blip cannot flap the
//! fallback off again; recoveries that arrive early are deferred, not
//! discarded.

#![deny(unsafe_code)]

pub mod buffer;
pub mod config;
pub mod error;
pub mod manager;
pub mod state;

pub use buffer::{BufferedOperation, OperationBuffer};
pub use config::{FailoverConfig, FailoverMode};
pub use error::{FailoverError, FailoverResult};
pub use manager::{
    FailoverManager, FailoverMetrics, FailoverSignal, FailoverStatus, NoOpReplayer,
    OperationReplayer,
};
pub use state::{FailoverEvent, FailoverState, ServiceFallback};

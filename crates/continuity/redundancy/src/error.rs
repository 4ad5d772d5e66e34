//! Error types for the redundancy crate.

use continuity_types::PoolId;
use thiserror::Error;

/// Errors returned to direct callers of pool operations.
#[derive(Debug, Error)]
pub enum RedundancyError {
    /// No pool registered under the given ID.
    #[error("pool not found: {0}")]
    PoolNotFound(PoolId),

    /// A pool is already registered under the given ID.
    #[error("pool already registered: {0}")]
    AlreadyRegistered(PoolId),

    /// The sync target has exhausted its retries and is marked failed.
    #[error("instance {endpoint} in pool {pool_id} is marked failed")]
    InstanceFailed { pool_id: PoolId, endpoint: String },
}

/// Result type for redundancy operations.
pub type RedundancyResult<T> = Result<T, RedundancyError>;

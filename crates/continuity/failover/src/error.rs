//! Error types for the failover crate.

use continuity_types::ServiceType;
use thiserror::Error;

/// Errors returned to direct callers of failover operations.
///
/// Threshold and probe failures never surface here; they are absorbed into
/// state. Only invalid manual operations are reported synchronously.
#[derive(Debug, Error)]
pub enum FailoverError {
    /// No fallback registered for the service type.
    #[error("no fallback registered for service type {0}")]
    NoFallbackRegistered(ServiceType),

    /// A fallback is already registered for the service type.
    #[error("fallback already registered for service type {0}")]
    AlreadyRegistered(ServiceType),

    /// Fallback is already active; failover would be a no-op.
    #[error("fallback already active for service type {0}")]
    AlreadyActive(ServiceType),

    /// No active failover to recover from or buffer against.
    #[error("no active failover for service type {0}")]
    NotActive(ServiceType),
}

/// Result type for failover operations.
pub type FailoverResult<T> = Result<T, FailoverError>;

//! Error types for the health crate.

use continuity_types::ServiceId;
use thiserror::Error;

/// Errors that can occur during health check operations.
///
/// Probe failures are deliberately NOT errors; they are recorded into the
/// service's health record and the check cycle keeps going.
#[derive(Debug, Error)]
pub enum HealthError {
    /// Service is not registered.
    #[error("service not found: {0}")]
    ServiceNotFound(ServiceId),

    /// Service ID is already registered.
    #[error("service already registered: {0}")]
    AlreadyRegistered(ServiceId),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type for health operations.
pub type HealthResult<T> = Result<T, HealthError>;

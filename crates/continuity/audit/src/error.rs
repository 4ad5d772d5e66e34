//! Error types for the audit crate.

use thiserror::Error;

/// Errors that can occur while writing or reading the audit trail.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Durable sink I/O failed.
    #[error("audit sink i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Entry could not be serialized or parsed.
    #[error("audit serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A persisted entry failed verification on load.
    #[error("corrupt audit record at line {line}: {reason}")]
    CorruptRecord { line: usize, reason: String },
}

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;

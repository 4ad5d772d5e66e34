//! # Continuity Audit - Chain-of-Custody Audit Trail
//!
//! Append-only, hash-chained record of every continuity-relevant event:
//! health checks, failovers, recoveries, redundancy syncs, diagnostics, and
//! escalations.
//!
//! Each entry's hash covers its own fields plus the previous entry's hash,
//! so altering any stored record breaks the chain at a detectable index.
//! This is the property CJIS-style compliance review leans on: history can
//! expire under retention, but it cannot be silently rewritten.
//!
//! ## Key Components
//!
//! - [`OpsAuditLog`]: the single-writer log with typed helpers and queries
//! - [`verify_chain`] / [`ChainVerificationResult`]: independent verification
//! - [`AuditSink`]: durable mirrors ([`MemoryAuditSink`], [`FileAuditSink`])
//! - [`ComplianceReport`]: trailing-window export for external tooling

#![deny(unsafe_code)]

pub mod chain;
pub mod entry;
pub mod error;
pub mod log;
pub mod sink;

pub use chain::{verify_chain, ChainVerificationResult, IntegrityChain};
pub use entry::{AuditAction, AuditSeverity, OpsAuditEntry, PendingEntry, GENESIS_HASH};
pub use error::{AuditError, AuditResult};
pub use log::{AuditConfig, AuditMetrics, AuditStatus, ComplianceReport, OpsAuditLog};
pub use sink::{AuditSink, FileAuditSink, MemoryAuditSink};

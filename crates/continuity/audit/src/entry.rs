//! Audit entry types and hashing.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use continuity_types::EntryId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Fixed `previous_hash` of the first entry in a chain.
pub const GENESIS_HASH: &str = "genesis";

/// Continuity-relevant action recorded in the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    HealthCheck,
    Failover,
    Recovery,
    RedundancySync,
    Diagnostic,
    Escalation,
    ConfigChange,
    ManualOverride,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditAction::HealthCheck => write!(f, "health_check"),
            AuditAction::Failover => write!(f, "failover"),
            AuditAction::Recovery => write!(f, "recovery"),
            AuditAction::RedundancySync => write!(f, "redundancy_sync"),
            AuditAction::Diagnostic => write!(f, "diagnostic"),
            AuditAction::Escalation => write!(f, "escalation"),
            AuditAction::ConfigChange => write!(f, "config_change"),
            AuditAction::ManualOverride => write!(f, "manual_override"),
        }
    }
}

/// Severity of an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for AuditSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditSeverity::Debug => write!(f, "debug"),
            AuditSeverity::Info => write!(f, "info"),
            AuditSeverity::Warning => write!(f, "warning"),
            AuditSeverity::Error => write!(f, "error"),
            AuditSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// One immutable, hash-chained audit record.
///
/// `entry_hash` covers the identifying fields plus `previous_hash`, so any
/// alteration of a stored entry (or reordering of the chain) is detectable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsAuditEntry {
    /// Unique entry ID.
    pub entry_id: EntryId,

    /// Time the entry was written.
    pub timestamp: DateTime<Utc>,

    /// Action that occurred.
    pub action: AuditAction,

    /// Severity of the event.
    pub severity: AuditSeverity,

    /// Human-readable description.
    pub description: String,

    /// Component or operator responsible.
    pub actor: String,

    /// Structured context for the event.
    pub metadata: HashMap<String, serde_json::Value>,

    /// Hash of the previous entry (genesis constant for the first).
    pub previous_hash: String,

    /// Hash of this entry.
    pub entry_hash: String,
}

impl OpsAuditEntry {
    /// Recompute the hash this entry should carry.
    pub fn compute_hash(&self) -> String {
        hash_fields(
            &self.entry_id,
            &self.timestamp,
            &self.action,
            &self.description,
            &self.actor,
            &self.metadata,
            &self.previous_hash,
        )
    }

    /// Whether the stored hash still matches the entry's contents.
    pub fn verify(&self) -> bool {
        self.entry_hash == self.compute_hash()
    }
}

/// An entry that has been composed but not yet linked into the chain.
///
/// Only the log's single writer may finalize it, which is what keeps
/// `previous_hash` linkage from ever being raced.
#[derive(Debug, Clone)]
pub struct PendingEntry {
    pub entry_id: EntryId,
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub severity: AuditSeverity,
    pub description: String,
    pub actor: String,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl PendingEntry {
    /// Compose a new pending entry.
    pub fn new(
        action: AuditAction,
        severity: AuditSeverity,
        description: impl Into<String>,
        actor: impl Into<String>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            entry_id: EntryId::generate(),
            timestamp: Utc::now(),
            action,
            severity,
            description: description.into(),
            actor: actor.into(),
            metadata,
        }
    }

    /// Link into the chain behind `previous_hash` and seal the entry hash.
    pub fn finalize(self, previous_hash: String) -> OpsAuditEntry {
        let entry_hash = hash_fields(
            &self.entry_id,
            &self.timestamp,
            &self.action,
            &self.description,
            &self.actor,
            &self.metadata,
            &previous_hash,
        );

        OpsAuditEntry {
            entry_id: self.entry_id,
            timestamp: self.timestamp,
            action: self.action,
            severity: self.severity,
            description: self.description,
            actor: self.actor,
            metadata: self.metadata,
            previous_hash,
            entry_hash,
        }
    }
}

fn hash_fields(
    entry_id: &EntryId,
    timestamp: &DateTime<Utc>,
    action: &AuditAction,
    description: &str,
    actor: &str,
    metadata: &HashMap<String, serde_json::Value>,
    previous_hash: &str,
) -> String {
    // Metadata keys are sorted so the digest is independent of map order.
    let mut keys: Vec<&String> = metadata.keys().collect();
    keys.sort();
    let metadata_repr: String = keys
        .iter()
        .map(|k| format!("{}={}", k, metadata[*k]))
        .collect::<Vec<_>>()
        .join(",");

    let hash_input = format!(
        "{}{}{}{}{}{}{}",
        entry_id,
        timestamp.to_rfc3339(),
        action,
        description,
        actor,
        metadata_repr,
        previous_hash,
    );

    let mut hasher = Sha256::new();
    hasher.update(hash_input.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(description: &str) -> PendingEntry {
        PendingEntry::new(
            AuditAction::HealthCheck,
            AuditSeverity::Info,
            description,
            "health-check-service",
            HashMap::new(),
        )
    }

    #[test]
    fn test_finalize_seals_hash() {
        let entry = pending("cycle completed").finalize(GENESIS_HASH.to_string());
        assert_eq!(entry.previous_hash, GENESIS_HASH);
        assert!(!entry.entry_hash.is_empty());
        assert_eq!(entry.compute_hash(), entry.entry_hash);
    }

    #[test]
    fn test_chained_entries_link() {
        let first = pending("first").finalize(GENESIS_HASH.to_string());
        let second = pending("second").finalize(first.entry_hash.clone());
        assert_eq!(second.previous_hash, first.entry_hash);
        assert_ne!(second.entry_hash, first.entry_hash);
    }

    #[test]
    fn test_tampered_description_changes_hash() {
        let mut entry = pending("original").finalize(GENESIS_HASH.to_string());
        entry.description = "rewritten".to_string();
        assert_ne!(entry.compute_hash(), entry.entry_hash);
    }

    #[test]
    fn test_metadata_order_is_canonical() {
        let mut m1 = HashMap::new();
        m1.insert("a".to_string(), serde_json::json!(1));
        m1.insert("b".to_string(), serde_json::json!(2));
        let mut m2 = HashMap::new();
        m2.insert("b".to_string(), serde_json::json!(2));
        m2.insert("a".to_string(), serde_json::json!(1));

        let p = pending("meta");
        let mut p1 = p.clone();
        p1.metadata = m1;
        let mut p2 = p;
        p2.metadata = m2;

        let e1 = p1.finalize(GENESIS_HASH.to_string());
        let e2 = p2.finalize(GENESIS_HASH.to_string());
        assert_eq!(e1.entry_hash, e2.entry_hash);
    }
}

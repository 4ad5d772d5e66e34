//! Integrity chain cursor and verification.

use serde::{Deserialize, Serialize};

use crate::entry::{OpsAuditEntry, GENESIS_HASH};

/// Tail cursor for the hash chain.
///
/// Owned exclusively by the log's writer; everything else verifies against
/// copies of the entries.
#[derive(Debug, Clone)]
pub struct IntegrityChain {
    last_hash: String,
    entry_count: u64,
}

impl IntegrityChain {
    /// Start a fresh chain at the genesis hash.
    pub fn new() -> Self {
        Self {
            last_hash: GENESIS_HASH.to_string(),
            entry_count: 0,
        }
    }

    /// Resume a chain from persisted state.
    pub fn from_state(last_hash: String, entry_count: u64) -> Self {
        Self {
            last_hash,
            entry_count,
        }
    }

    /// Hash the next entry must carry as `previous_hash`.
    pub fn previous_hash(&self) -> String {
        self.last_hash.clone()
    }

    /// Advance the cursor past a newly written entry.
    pub fn advance(&mut self, entry: &OpsAuditEntry) {
        self.last_hash = entry.entry_hash.clone();
        self.entry_count += 1;
    }

    /// Cumulative number of entries ever written.
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Hash at the head of the chain.
    pub fn head_hash(&self) -> &str {
        &self.last_hash
    }
}

impl Default for IntegrityChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a front-to-back chain walk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainVerificationResult {
    /// Whether every hash and link checked out.
    pub valid: bool,

    /// Number of entries examined.
    pub total_entries: usize,

    /// Entries verified before stopping.
    pub verified_entries: usize,

    /// Index of the first broken entry, if any.
    pub broken_at: Option<usize>,

    /// What broke, if anything.
    pub message: Option<String>,
}

impl ChainVerificationResult {
    fn intact(total: usize) -> Self {
        Self {
            valid: true,
            total_entries: total,
            verified_entries: total,
            broken_at: None,
            message: None,
        }
    }

    fn broken(total: usize, index: usize, message: String) -> Self {
        Self {
            valid: false,
            total_entries: total,
            verified_entries: index,
            broken_at: Some(index),
            message: Some(message),
        }
    }
}

/// Walk `entries` front to back, recomputing each hash and checking linkage.
///
/// The first entry's `previous_hash` is not required to be the genesis
/// constant: retention pruning legitimately drops the head of the chain, and
/// the remaining window still verifies internally.
pub fn verify_chain(entries: &[OpsAuditEntry]) -> ChainVerificationResult {
    for (i, entry) in entries.iter().enumerate() {
        if !entry.verify() {
            return ChainVerificationResult::broken(
                entries.len(),
                i,
                format!("entry {} has a recomputed hash mismatch", entry.entry_id),
            );
        }

        if i > 0 {
            let expected_prev = &entries[i - 1].entry_hash;
            if &entry.previous_hash != expected_prev {
                return ChainVerificationResult::broken(
                    entries.len(),
                    i,
                    format!("entry {} does not link to its predecessor", entry.entry_id),
                );
            }
        }
    }

    ChainVerificationResult::intact(entries.len())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::entry::{AuditAction, AuditSeverity, PendingEntry};

    fn build_chain(n: usize) -> Vec<OpsAuditEntry> {
        let mut chain = IntegrityChain::new();
        let mut entries = Vec::new();
        for i in 0..n {
            let entry = PendingEntry::new(
                AuditAction::Diagnostic,
                AuditSeverity::Debug,
                format!("entry {}", i),
                "test",
                HashMap::new(),
            )
            .finalize(chain.previous_hash());
            chain.advance(&entry);
            entries.push(entry);
        }
        entries
    }

    #[test]
    fn test_untouched_chain_is_valid() {
        let entries = build_chain(5);
        let result = verify_chain(&entries);
        assert!(result.valid);
        assert_eq!(result.total_entries, 5);
        assert_eq!(result.verified_entries, 5);
        assert!(result.broken_at.is_none());
    }

    #[test]
    fn test_empty_chain_is_valid() {
        let result = verify_chain(&[]);
        assert!(result.valid);
        assert_eq!(result.total_entries, 0);
    }

    #[test]
    fn test_altered_description_is_detected() {
        let mut entries = build_chain(4);
        entries[2].description = "tampered".to_string();
        let result = verify_chain(&entries);
        assert!(!result.valid);
        assert_eq!(result.broken_at, Some(2));
    }

    #[test]
    fn test_altered_entry_hash_is_detected() {
        let mut entries = build_chain(4);
        entries[1].entry_hash = "0000".to_string();
        let result = verify_chain(&entries);
        assert!(!result.valid);
        // The rewritten hash fails recomputation at its own index.
        assert_eq!(result.broken_at, Some(1));
    }

    #[test]
    fn test_pruned_window_still_verifies() {
        let entries = build_chain(6);
        let window = &entries[2..];
        assert!(verify_chain(window).valid);
    }
}

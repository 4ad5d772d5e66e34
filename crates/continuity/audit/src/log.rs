//! The operational audit log.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::chain::{verify_chain, ChainVerificationResult, IntegrityChain};
use crate::entry::{AuditAction, AuditSeverity, OpsAuditEntry, PendingEntry};
use crate::error::AuditResult;
use crate::sink::AuditSink;

/// Configuration for the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Days an entry stays queryable before retention expiry.
    pub retention_days: u32,

    /// Capacity of the entry broadcast channel.
    pub event_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            retention_days: 365,
            event_capacity: 1024,
        }
    }
}

/// State owned by the single logical writer.
struct Writer {
    chain: IntegrityChain,
    sink: Option<Arc<dyn AuditSink>>,
}

/// Append-only, hash-chained record of continuity events.
///
/// Writes are serialized through one async lock so `previous_hash` linkage is
/// never raced; readers work from a copy-on-read snapshot of the retained
/// window. Chain order, not wall-clock time, is the canonical ordering.
pub struct OpsAuditLog {
    config: AuditConfig,
    writer: Mutex<Writer>,
    entries: RwLock<Vec<OpsAuditEntry>>,
    event_tx: broadcast::Sender<OpsAuditEntry>,
    total_entries: AtomicU64,
    critical_entries: AtomicU64,
    pruned_entries: AtomicU64,
}

impl OpsAuditLog {
    /// Create an in-memory log.
    pub fn new(config: AuditConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            config,
            writer: Mutex::new(Writer {
                chain: IntegrityChain::new(),
                sink: None,
            }),
            entries: RwLock::new(Vec::new()),
            event_tx,
            total_entries: AtomicU64::new(0),
            critical_entries: AtomicU64::new(0),
            pruned_entries: AtomicU64::new(0),
        }
    }

    /// Create a log that mirrors every entry into a durable sink, resuming
    /// the chain from whatever the sink already holds.
    pub async fn with_sink(config: AuditConfig, sink: Arc<dyn AuditSink>) -> AuditResult<Self> {
        let existing = sink.read_all().await?;
        let chain = match existing.last() {
            Some(last) => {
                IntegrityChain::from_state(last.entry_hash.clone(), existing.len() as u64)
            }
            None => IntegrityChain::new(),
        };

        let log = Self::new(config);
        log.total_entries
            .store(existing.len() as u64, Ordering::SeqCst);
        log.critical_entries.store(
            existing
                .iter()
                .filter(|e| e.severity == AuditSeverity::Critical)
                .count() as u64,
            Ordering::SeqCst,
        );
        *log.entries.write() = existing;
        {
            let mut writer = log.writer.lock().await;
            writer.chain = chain;
            writer.sink = Some(sink);
        }
        log.prune_expired();
        Ok(log)
    }

    /// Subscribe to finalized entries as they are written.
    pub fn subscribe(&self) -> broadcast::Receiver<OpsAuditEntry> {
        self.event_tx.subscribe()
    }

    /// Append one entry to the chain.
    pub async fn log_entry(
        &self,
        action: AuditAction,
        severity: AuditSeverity,
        description: impl Into<String>,
        actor: impl Into<String>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> AuditResult<OpsAuditEntry> {
        let pending = PendingEntry::new(action, severity, description, actor, metadata);

        let entry = {
            let mut writer = self.writer.lock().await;
            let entry = pending.finalize(writer.chain.previous_hash());
            writer.chain.advance(&entry);
            if let Some(sink) = writer.sink.clone() {
                sink.append(&entry).await?;
            }
            // The retained window must be appended in chain order, so the
            // push happens before the writer lock is released.
            self.entries.write().push(entry.clone());
            entry
        };
        self.prune_expired();

        self.total_entries.fetch_add(1, Ordering::SeqCst);
        if entry.severity == AuditSeverity::Critical {
            self.critical_entries.fetch_add(1, Ordering::SeqCst);
        }

        match entry.severity {
            AuditSeverity::Critical | AuditSeverity::Error => warn!(
                action = %entry.action,
                severity = %entry.severity,
                actor = %entry.actor,
                "{}", entry.description
            ),
            AuditSeverity::Warning => info!(
                action = %entry.action,
                actor = %entry.actor,
                "{}", entry.description
            ),
            _ => debug!(
                action = %entry.action,
                actor = %entry.actor,
                "{}", entry.description
            ),
        }

        let _ = self.event_tx.send(entry.clone());
        Ok(entry)
    }

    /// Record a completed health check cycle.
    pub async fn log_health_check(
        &self,
        description: impl Into<String>,
        actor: impl Into<String>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> AuditResult<OpsAuditEntry> {
        self.log_entry(
            AuditAction::HealthCheck,
            AuditSeverity::Info,
            description,
            actor,
            metadata,
        )
        .await
    }

    /// Record a failover activation.
    pub async fn log_failover(
        &self,
        description: impl Into<String>,
        actor: impl Into<String>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> AuditResult<OpsAuditEntry> {
        self.log_entry(
            AuditAction::Failover,
            AuditSeverity::Warning,
            description,
            actor,
            metadata,
        )
        .await
    }

    /// Record a recovery back to the primary.
    pub async fn log_recovery(
        &self,
        description: impl Into<String>,
        actor: impl Into<String>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> AuditResult<OpsAuditEntry> {
        self.log_entry(
            AuditAction::Recovery,
            AuditSeverity::Info,
            description,
            actor,
            metadata,
        )
        .await
    }

    /// Record a completed replication pass.
    pub async fn log_redundancy_sync(
        &self,
        description: impl Into<String>,
        actor: impl Into<String>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> AuditResult<OpsAuditEntry> {
        self.log_entry(
            AuditAction::RedundancySync,
            AuditSeverity::Info,
            description,
            actor,
            metadata,
        )
        .await
    }

    /// Record a diagnostic finding.
    pub async fn log_diagnostic_event(
        &self,
        description: impl Into<String>,
        actor: impl Into<String>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> AuditResult<OpsAuditEntry> {
        self.log_entry(
            AuditAction::Diagnostic,
            AuditSeverity::Debug,
            description,
            actor,
            metadata,
        )
        .await
    }

    /// Record an operator-facing escalation.
    pub async fn log_escalation(
        &self,
        description: impl Into<String>,
        actor: impl Into<String>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> AuditResult<OpsAuditEntry> {
        self.log_entry(
            AuditAction::Escalation,
            AuditSeverity::Critical,
            description,
            actor,
            metadata,
        )
        .await
    }

    /// Most recent entries, newest first.
    pub fn get_recent_entries(&self, limit: usize) -> Vec<OpsAuditEntry> {
        let entries = self.entries.read();
        entries.iter().rev().take(limit).cloned().collect()
    }

    /// All retained entries for one action, in chain order.
    pub fn get_entries_by_action(&self, action: &AuditAction) -> Vec<OpsAuditEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| &e.action == action)
            .cloned()
            .collect()
    }

    /// All retained entries at one severity, in chain order.
    pub fn get_entries_by_severity(&self, severity: AuditSeverity) -> Vec<OpsAuditEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.severity == severity)
            .cloned()
            .collect()
    }

    /// Walk the retained window recomputing every hash and link.
    pub fn verify_chain_integrity(&self) -> ChainVerificationResult {
        let snapshot = self.entries.read().clone();
        verify_chain(&snapshot)
    }

    /// Summarize the trailing `days` window for external audit tooling.
    pub fn generate_compliance_report(&self, days: u32) -> ComplianceReport {
        let cutoff = Utc::now() - Duration::days(i64::from(days));
        let entries = self.entries.read();

        let mut by_action: HashMap<String, u64> = HashMap::new();
        let mut by_severity: HashMap<String, u64> = HashMap::new();
        let mut total = 0u64;

        for entry in entries.iter().filter(|e| e.timestamp >= cutoff) {
            total += 1;
            *by_action.entry(entry.action.to_string()).or_insert(0) += 1;
            *by_severity.entry(entry.severity.to_string()).or_insert(0) += 1;
        }

        ComplianceReport {
            period_days: days,
            generated_at: Utc::now(),
            total_entries: total,
            entries_by_action: by_action,
            entries_by_severity: by_severity,
        }
    }

    /// Cumulative counters.
    pub fn get_metrics(&self) -> AuditMetrics {
        AuditMetrics {
            total_entries: self.total_entries.load(Ordering::SeqCst),
            retained_entries: self.entries.read().len() as u64,
            critical_entries: self.critical_entries.load(Ordering::SeqCst),
            pruned_entries: self.pruned_entries.load(Ordering::SeqCst),
        }
    }

    /// Structured status for observability consumers.
    pub fn get_status(&self) -> AuditStatus {
        let verification = self.verify_chain_integrity();
        let last_entry_at = self.entries.read().last().map(|e| e.timestamp);
        AuditStatus {
            running: true,
            retained_entries: verification.total_entries as u64,
            total_entries: self.total_entries.load(Ordering::SeqCst),
            chain_valid: verification.valid,
            last_entry_at,
        }
    }

    /// Drop entries past retention. Counters keep the full history.
    fn prune_expired(&self) {
        let cutoff = Utc::now() - Duration::days(i64::from(self.config.retention_days));
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.timestamp >= cutoff);
        let dropped = before - entries.len();
        if dropped > 0 {
            self.pruned_entries
                .fetch_add(dropped as u64, Ordering::SeqCst);
            debug!(dropped, "Pruned expired audit entries");
        }
    }
}

/// Compliance export for the trailing window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub period_days: u32,
    pub generated_at: DateTime<Utc>,
    pub total_entries: u64,
    pub entries_by_action: HashMap<String, u64>,
    pub entries_by_severity: HashMap<String, u64>,
}

/// Cumulative audit counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditMetrics {
    pub total_entries: u64,
    pub retained_entries: u64,
    pub critical_entries: u64,
    pub pruned_entries: u64,
}

/// Structured status snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditStatus {
    pub running: bool,
    pub retained_entries: u64,
    pub total_entries: u64,
    pub chain_valid: bool,
    pub last_entry_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{FileAuditSink, MemoryAuditSink};

    fn meta(pairs: &[(&str, serde_json::Value)]) -> HashMap<String, serde_json::Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_entries_chain_in_write_order() {
        let log = OpsAuditLog::new(AuditConfig::default());

        let first = log
            .log_health_check("cycle 1", "health-check-service", HashMap::new())
            .await
            .unwrap();
        let second = log
            .log_failover("cache failover", "failover-manager", HashMap::new())
            .await
            .unwrap();

        assert_eq!(second.previous_hash, first.entry_hash);
        assert!(log.verify_chain_integrity().valid);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_keep_chain_order() {
        let log = Arc::new(OpsAuditLog::new(AuditConfig::default()));

        let mut handles = Vec::new();
        for task in 0..8 {
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    log.log_diagnostic_event(
                        format!("writer {} entry {}", task, i),
                        "stress",
                        HashMap::new(),
                    )
                    .await
                    .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let result = log.verify_chain_integrity();
        assert!(result.valid, "chain broken at {:?}", result.broken_at);
        assert_eq!(result.total_entries, 400);
        assert_eq!(log.get_metrics().total_entries, 400);
    }

    #[tokio::test]
    async fn test_typed_helper_severities() {
        let log = OpsAuditLog::new(AuditConfig::default());

        let check = log
            .log_health_check("ok", "hc", HashMap::new())
            .await
            .unwrap();
        let failover = log
            .log_failover("tripped", "fm", HashMap::new())
            .await
            .unwrap();
        let escalation = log
            .log_escalation("sync retries exhausted", "rm", HashMap::new())
            .await
            .unwrap();

        assert_eq!(check.severity, AuditSeverity::Info);
        assert_eq!(failover.severity, AuditSeverity::Warning);
        assert_eq!(escalation.severity, AuditSeverity::Critical);
    }

    #[tokio::test]
    async fn test_tampering_is_reported_with_index() {
        let log = OpsAuditLog::new(AuditConfig::default());
        for i in 0..5 {
            log.log_diagnostic_event(format!("entry {}", i), "test", HashMap::new())
                .await
                .unwrap();
        }

        assert!(log.verify_chain_integrity().valid);

        log.entries.write()[3].description = "rewritten".to_string();
        let result = log.verify_chain_integrity();
        assert!(!result.valid);
        assert_eq!(result.broken_at, Some(3));
    }

    #[tokio::test]
    async fn test_queries_by_action_and_severity() {
        let log = OpsAuditLog::new(AuditConfig::default());
        log.log_health_check("a", "hc", HashMap::new()).await.unwrap();
        log.log_failover("b", "fm", HashMap::new()).await.unwrap();
        log.log_failover("c", "fm", HashMap::new()).await.unwrap();

        assert_eq!(log.get_entries_by_action(&AuditAction::Failover).len(), 2);
        assert_eq!(
            log.get_entries_by_severity(AuditSeverity::Warning).len(),
            2
        );

        let recent = log.get_recent_entries(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].description, "c");
    }

    #[tokio::test]
    async fn test_compliance_report_counts_sum() {
        let log = OpsAuditLog::new(AuditConfig::default());
        log.log_health_check("a", "hc", HashMap::new()).await.unwrap();
        log.log_recovery("b", "fm", meta(&[("recovery_time_seconds", serde_json::json!(4))]))
            .await
            .unwrap();
        log.log_escalation("c", "rm", HashMap::new()).await.unwrap();

        let report = log.generate_compliance_report(7);
        assert_eq!(report.total_entries, 3);
        assert_eq!(
            report.entries_by_action.values().sum::<u64>(),
            report.total_entries
        );
        assert_eq!(
            report.entries_by_severity.values().sum::<u64>(),
            report.total_entries
        );
    }

    #[tokio::test]
    async fn test_status_reports_chain_health() {
        let log = OpsAuditLog::new(AuditConfig::default());
        log.log_health_check("a", "hc", HashMap::new()).await.unwrap();

        let status = log.get_status();
        assert!(status.running);
        assert!(status.chain_valid);
        assert_eq!(status.total_entries, 1);
        assert!(status.last_entry_at.is_some());
    }

    #[tokio::test]
    async fn test_memory_sink_mirror() {
        let sink = Arc::new(MemoryAuditSink::new());
        let log = OpsAuditLog::with_sink(AuditConfig::default(), sink.clone())
            .await
            .unwrap();

        log.log_health_check("mirrored", "hc", HashMap::new())
            .await
            .unwrap();
        assert_eq!(sink.entry_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_file_sink_resumes_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        {
            let sink = Arc::new(FileAuditSink::open(path.clone()).await.unwrap());
            let log = OpsAuditLog::with_sink(AuditConfig::default(), sink)
                .await
                .unwrap();
            log.log_health_check("before restart", "hc", HashMap::new())
                .await
                .unwrap();
        }

        let sink = Arc::new(FileAuditSink::open(path).await.unwrap());
        let log = OpsAuditLog::with_sink(AuditConfig::default(), sink)
            .await
            .unwrap();
        log.log_health_check("after restart", "hc", HashMap::new())
            .await
            .unwrap();

        let result = log.verify_chain_integrity();
        assert!(result.valid);
        assert_eq!(result.total_entries, 2);
    }
}

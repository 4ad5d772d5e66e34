//! Durable mirrors for the audit trail.
//!
//! The log itself owns the chain cursor and the queryable in-memory window;
//! sinks only receive already-finalized entries, append-only.

use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::entry::OpsAuditEntry;
use crate::error::{AuditError, AuditResult};

/// Append-only store for finalized audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append a finalized entry.
    async fn append(&self, entry: &OpsAuditEntry) -> AuditResult<()>;

    /// Read every stored entry in write order.
    async fn read_all(&self) -> AuditResult<Vec<OpsAuditEntry>>;

    /// Number of entries stored.
    async fn entry_count(&self) -> AuditResult<u64>;
}

/// In-memory sink for tests.
pub struct MemoryAuditSink {
    entries: RwLock<Vec<OpsAuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, entry: &OpsAuditEntry) -> AuditResult<()> {
        self.entries.write().push(entry.clone());
        Ok(())
    }

    async fn read_all(&self) -> AuditResult<Vec<OpsAuditEntry>> {
        Ok(self.entries.read().clone())
    }

    async fn entry_count(&self) -> AuditResult<u64> {
        Ok(self.entries.read().len() as u64)
    }
}

/// Append-only JSONL file sink.
///
/// Survives process restarts: reopening the same path resumes the chain from
/// the last persisted entry.
pub struct FileAuditSink {
    path: PathBuf,
    count: RwLock<u64>,
}

impl FileAuditSink {
    /// Open (or create) the sink at `path`.
    pub async fn open(path: PathBuf) -> AuditResult<Self> {
        let count = if path.exists() {
            Self::load(&path).await?.len() as u64
        } else {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            0
        };

        Ok(Self {
            path,
            count: RwLock::new(count),
        })
    }

    /// Hash and count of the last persisted entry, for chain resumption.
    pub async fn tail_state(&self) -> AuditResult<Option<(String, u64)>> {
        let entries = Self::load(&self.path).await?;
        Ok(entries
            .last()
            .map(|e| (e.entry_hash.clone(), entries.len() as u64)))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    async fn load(path: &PathBuf) -> AuditResult<Vec<OpsAuditEntry>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(path).await?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut entries = Vec::new();
        let mut line_no = 0usize;

        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            let entry: OpsAuditEntry =
                serde_json::from_str(&line).map_err(|e| AuditError::CorruptRecord {
                    line: line_no,
                    reason: e.to_string(),
                })?;
            entries.push(entry);
        }

        Ok(entries)
    }
}

#[async_trait]
impl AuditSink for FileAuditSink {
    async fn append(&self, entry: &OpsAuditEntry) -> AuditResult<()> {
        let json = serde_json::to_string(entry)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(json.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;

        *self.count.write() += 1;
        Ok(())
    }

    async fn read_all(&self) -> AuditResult<Vec<OpsAuditEntry>> {
        Self::load(&self.path).await
    }

    async fn entry_count(&self) -> AuditResult<u64> {
        Ok(*self.count.read())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::chain::{verify_chain, IntegrityChain};
    use crate::entry::{AuditAction, AuditSeverity, PendingEntry};

    fn finalized(chain: &mut IntegrityChain, description: &str) -> OpsAuditEntry {
        let entry = PendingEntry::new(
            AuditAction::HealthCheck,
            AuditSeverity::Info,
            description,
            "test",
            HashMap::new(),
        )
        .finalize(chain.previous_hash());
        chain.advance(&entry);
        entry
    }

    #[tokio::test]
    async fn test_memory_sink_round_trip() {
        let sink = MemoryAuditSink::new();
        let mut chain = IntegrityChain::new();

        sink.append(&finalized(&mut chain, "one")).await.unwrap();
        sink.append(&finalized(&mut chain, "two")).await.unwrap();

        assert_eq!(sink.entry_count().await.unwrap(), 2);
        let entries = sink.read_all().await.unwrap();
        assert!(verify_chain(&entries).valid);
    }

    #[tokio::test]
    async fn test_file_sink_persists_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ops-audit.jsonl");

        {
            let sink = FileAuditSink::open(path.clone()).await.unwrap();
            let mut chain = IntegrityChain::new();
            sink.append(&finalized(&mut chain, "one")).await.unwrap();
            sink.append(&finalized(&mut chain, "two")).await.unwrap();
        }

        let sink = FileAuditSink::open(path).await.unwrap();
        assert_eq!(sink.entry_count().await.unwrap(), 2);

        let entries = sink.read_all().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(verify_chain(&entries).valid);

        let tail = sink.tail_state().await.unwrap().unwrap();
        assert_eq!(tail.0, entries[1].entry_hash);
        assert_eq!(tail.1, 2);
    }
}

//! Client adapter boundary.
//!
//! The engine never speaks a wire protocol itself. Callers supply an adapter
//! per monitored endpoint (and a transport per redundancy pool), and the
//! engine depends only on this narrow contract.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by caller-supplied adapters.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Endpoint refused or dropped the connection.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Probe or data movement exceeded its deadline.
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Anything else the adapter wants to report.
    #[error("adapter error: {0}")]
    Other(String),
}

/// Result type for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Outcome of a single successful probe.
#[derive(Debug, Clone, Copy)]
pub struct ProbeOutcome {
    /// Round-trip latency in milliseconds.
    pub latency_ms: u64,
}

/// Network client for one monitored endpoint.
#[async_trait]
pub trait ServiceAdapter: Send + Sync {
    /// Check the endpoint once, returning measured latency on success.
    async fn probe(&self) -> AdapterResult<ProbeOutcome>;

    /// Establish a connection to the endpoint.
    async fn connect(&self) -> AdapterResult<()>;

    /// Tear down the connection.
    async fn disconnect(&self) -> AdapterResult<()>;
}

/// Data-movement client for one redundancy pool.
///
/// `sync_records` copies pending state from one endpoint to the other and
/// reports how many records moved.
#[async_trait]
pub trait PoolTransport: Send + Sync {
    /// Connect an endpoint so it can accept traffic.
    async fn connect(&self, endpoint: &str) -> AdapterResult<()>;

    /// Disconnect an endpoint.
    async fn disconnect(&self, endpoint: &str) -> AdapterResult<()>;

    /// Replicate records from `from` to `to`, returning the record count.
    async fn sync_records(&self, from: &str, to: &str) -> AdapterResult<u64>;
}

/// Scripted adapter for tests and local development.
///
/// Returns a fixed latency until told to fail, then errors on every probe.
pub struct StaticAdapter {
    latency_ms: u64,
    failing: parking_lot::Mutex<Option<String>>,
}

impl StaticAdapter {
    /// Create a healthy adapter with the given probe latency.
    pub fn healthy(latency_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            latency_ms,
            failing: parking_lot::Mutex::new(None),
        })
    }

    /// Make every subsequent probe fail with the given message.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failing.lock() = Some(message.into());
    }

    /// Restore the adapter to healthy responses.
    pub fn recover(&self) {
        *self.failing.lock() = None;
    }
}

#[async_trait]
impl ServiceAdapter for StaticAdapter {
    async fn probe(&self) -> AdapterResult<ProbeOutcome> {
        if let Some(message) = self.failing.lock().clone() {
            return Err(AdapterError::ConnectionFailed(message));
        }
        Ok(ProbeOutcome {
            latency_ms: self.latency_ms,
        })
    }

    async fn connect(&self) -> AdapterResult<()> {
        if let Some(message) = self.failing.lock().clone() {
            return Err(AdapterError::ConnectionFailed(message));
        }
        Ok(())
    }

    async fn disconnect(&self) -> AdapterResult<()> {
        Ok(())
    }
}

/// Scripted pool transport that always succeeds.
pub struct StaticTransport {
    records_per_sync: u64,
    fail_sync: parking_lot::Mutex<bool>,
}

impl StaticTransport {
    pub fn new(records_per_sync: u64) -> Arc<Self> {
        Arc::new(Self {
            records_per_sync,
            fail_sync: parking_lot::Mutex::new(false),
        })
    }

    /// Make subsequent sync passes fail.
    pub fn fail_syncs(&self, fail: bool) {
        *self.fail_sync.lock() = fail;
    }
}

#[async_trait]
impl PoolTransport for StaticTransport {
    async fn connect(&self, _endpoint: &str) -> AdapterResult<()> {
        Ok(())
    }

    async fn disconnect(&self, _endpoint: &str) -> AdapterResult<()> {
        Ok(())
    }

    async fn sync_records(&self, _from: &str, _to: &str) -> AdapterResult<u64> {
        if *self.fail_sync.lock() {
            return Err(AdapterError::ConnectionFailed("sync refused".to_string()));
        }
        Ok(self.records_per_sync)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_adapter_toggles() {
        let adapter = StaticAdapter::healthy(12);
        let outcome = adapter.probe().await.unwrap();
        assert_eq!(outcome.latency_ms, 12);

        adapter.fail_with("connection refused");
        assert!(adapter.probe().await.is_err());

        adapter.recover();
        assert!(adapter.probe().await.is_ok());
    }

    #[tokio::test]
    async fn test_static_transport_sync() {
        let transport = StaticTransport::new(42);
        assert_eq!(transport.sync_records("a", "b").await.unwrap(), 42);

        transport.fail_syncs(true);
        assert!(transport.sync_records("a", "b").await.is_err());
    }
}

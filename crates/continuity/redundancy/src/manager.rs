//! Hot/warm/cold pool management and replication scheduling.
//!
//! One background loop ticks at the hot interval; hot pools replicate every
//! tick and warm pools when their sync interval has elapsed. Cold pools are
//! never synced in the background. Pool state is owned exclusively by this
//! manager; callers see cloned snapshots.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use continuity_types::{AdapterError, PoolId, PoolTransport};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::config::RedundancyConfig;
use crate::error::{RedundancyError, RedundancyResult};
use crate::pool::{ConnectionPool, ConnectionState, RedundancyMode, SyncEvent};

/// Signal broadcast to redundancy subscribers.
#[derive(Debug, Clone)]
pub enum RedundancyEvent {
    /// A pool was registered.
    PoolRegistered { pool_id: PoolId, mode: RedundancyMode },

    /// A replication pass completed, successfully or not.
    SyncCompleted(SyncEvent),

    /// Traffic switched to the secondary instance.
    FailedOver { pool_id: PoolId, to_endpoint: String },

    /// Traffic switched back to the primary instance.
    FailedBack { pool_id: PoolId },

    /// An instance exhausted its retries and requires operator attention.
    InstanceFailed { pool_id: PoolId, endpoint: String },
}

struct PoolEntry {
    pool: ConnectionPool,
    transport: Arc<dyn PoolTransport>,
    last_sync_attempt: Option<DateTime<Utc>>,
}

/// Snapshot of manager state for observability callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedundancyStatus {
    pub running: bool,
    pub registered_pools: u64,
    pub failed_over_pools: u64,
    pub failed_instances: u64,
    pub pool_modes: HashMap<String, RedundancyMode>,
    pub total_sync_events: u64,
}

/// Cumulative redundancy counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedundancyMetrics {
    pub total_syncs: u64,
    pub failed_syncs: u64,
    pub total_records_synced: u64,
    pub total_failovers: u64,
    pub total_failbacks: u64,
    pub escalations: u64,
}

/// Manages redundant instance pairs for backing services.
pub struct RedundancyManager {
    config: RedundancyConfig,
    pools: DashMap<PoolId, PoolEntry>,
    sync_events: RwLock<Vec<SyncEvent>>,
    event_tx: broadcast::Sender<RedundancyEvent>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
    running: AtomicBool,
    total_syncs: AtomicU64,
    failed_syncs: AtomicU64,
    total_records_synced: AtomicU64,
    total_failovers: AtomicU64,
    total_failbacks: AtomicU64,
    escalations: AtomicU64,
}

impl RedundancyManager {
    pub fn new(config: RedundancyConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            config,
            pools: DashMap::new(),
            sync_events: RwLock::new(Vec::new()),
            event_tx,
            loop_handle: Mutex::new(None),
            running: AtomicBool::new(false),
            total_syncs: AtomicU64::new(0),
            failed_syncs: AtomicU64::new(0),
            total_records_synced: AtomicU64::new(0),
            total_failovers: AtomicU64::new(0),
            total_failbacks: AtomicU64::new(0),
            escalations: AtomicU64::new(0),
        }
    }

    /// Subscribe to redundancy signals.
    pub fn subscribe(&self) -> broadcast::Receiver<RedundancyEvent> {
        self.event_tx.subscribe()
    }

    /// Register a primary/secondary pair.
    ///
    /// The primary is connected immediately; hot pools also connect the
    /// secondary so failover needs no reconnection delay. Connection failures
    /// are absorbed and leave the instance disconnected.
    pub async fn register_pool(
        &self,
        pool_id: PoolId,
        service_name: impl Into<String>,
        primary_endpoint: impl Into<String>,
        secondary_endpoint: impl Into<String>,
        mode: RedundancyMode,
        transport: Arc<dyn PoolTransport>,
    ) -> RedundancyResult<()> {
        if self.pools.contains_key(&pool_id) {
            return Err(RedundancyError::AlreadyRegistered(pool_id));
        }

        let mut pool = ConnectionPool::new(
            pool_id.clone(),
            service_name,
            primary_endpoint,
            secondary_endpoint,
            mode,
        );

        pool.primary.state = self.try_connect(&transport, &pool.primary.endpoint).await;
        if mode == RedundancyMode::Hot {
            pool.secondary.state = self.try_connect(&transport, &pool.secondary.endpoint).await;
        }

        info!(
            pool_id = %pool_id,
            mode = %mode,
            primary = %pool.primary.endpoint,
            secondary = %pool.secondary.endpoint,
            "Registered redundancy pool"
        );
        self.pools.insert(
            pool_id.clone(),
            PoolEntry {
                pool,
                transport,
                last_sync_attempt: None,
            },
        );
        let _ = self
            .event_tx
            .send(RedundancyEvent::PoolRegistered { pool_id, mode });
        Ok(())
    }

    /// Current state of a pool.
    pub fn get_pool(&self, pool_id: &PoolId) -> Option<ConnectionPool> {
        self.pools.get(pool_id).map(|e| e.pool.clone())
    }

    /// Switch traffic to the secondary instance.
    ///
    /// Succeeds only when the secondary ends up connected and healthy; warm
    /// and cold pools are connected first. Returns `Ok(false)` with no state
    /// mutation when the secondary cannot take traffic.
    #[instrument(skip(self))]
    pub async fn manual_failover(&self, pool_id: &PoolId) -> RedundancyResult<bool> {
        let (needs_connect, endpoint, transport) = {
            let entry = self
                .pools
                .get(pool_id)
                .ok_or_else(|| RedundancyError::PoolNotFound(pool_id.clone()))?;
            if entry.pool.is_failed_over() {
                return Ok(false);
            }
            if entry.pool.secondary.state == ConnectionState::Failed
                || !entry.pool.secondary.is_healthy
            {
                return Ok(false);
            }
            (
                entry.pool.secondary.state != ConnectionState::Connected,
                entry.pool.secondary.endpoint.clone(),
                entry.transport.clone(),
            )
        };

        if needs_connect && self.try_connect(&transport, &endpoint).await != ConnectionState::Connected
        {
            warn!(pool_id = %pool_id, endpoint = %endpoint, "Failover rejected, secondary unreachable");
            return Ok(false);
        }

        // The sync loop may have marked the secondary failed while the lock
        // was released for the connect, so the preconditions are re-checked
        // before any state is written.
        let mut entry = self
            .pools
            .get_mut(pool_id)
            .ok_or_else(|| RedundancyError::PoolNotFound(pool_id.clone()))?;
        if entry.pool.is_failed_over()
            || entry.pool.secondary.state == ConnectionState::Failed
            || !entry.pool.secondary.is_healthy
        {
            warn!(pool_id = %pool_id, "Failover rejected, secondary no longer eligible");
            return Ok(false);
        }
        if needs_connect {
            entry.pool.secondary.state = ConnectionState::Connected;
        }
        if !entry.pool.secondary.is_ready() {
            return Ok(false);
        }
        entry.pool.active_instance_id = entry.pool.secondary.instance_id.clone();
        self.total_failovers.fetch_add(1, Ordering::Relaxed);
        info!(pool_id = %pool_id, to = %endpoint, "Pool failed over to secondary");
        let _ = self.event_tx.send(RedundancyEvent::FailedOver {
            pool_id: pool_id.clone(),
            to_endpoint: endpoint,
        });
        Ok(true)
    }

    /// Switch traffic back to the primary instance.
    ///
    /// Requires the primary to be healthy again; reconnects it if needed.
    #[instrument(skip(self))]
    pub async fn manual_failback(&self, pool_id: &PoolId) -> RedundancyResult<bool> {
        let (needs_connect, endpoint, transport) = {
            let entry = self
                .pools
                .get(pool_id)
                .ok_or_else(|| RedundancyError::PoolNotFound(pool_id.clone()))?;
            if !entry.pool.is_failed_over() {
                return Ok(false);
            }
            if entry.pool.primary.state == ConnectionState::Failed || !entry.pool.primary.is_healthy
            {
                return Ok(false);
            }
            (
                entry.pool.primary.state != ConnectionState::Connected,
                entry.pool.primary.endpoint.clone(),
                entry.transport.clone(),
            )
        };

        if needs_connect && self.try_connect(&transport, &endpoint).await != ConnectionState::Connected
        {
            warn!(pool_id = %pool_id, endpoint = %endpoint, "Failback rejected, primary unreachable");
            return Ok(false);
        }

        // Same re-validation as failover: the primary may have been marked
        // failed while the connect was in flight.
        let mut entry = self
            .pools
            .get_mut(pool_id)
            .ok_or_else(|| RedundancyError::PoolNotFound(pool_id.clone()))?;
        if !entry.pool.is_failed_over()
            || entry.pool.primary.state == ConnectionState::Failed
            || !entry.pool.primary.is_healthy
        {
            warn!(pool_id = %pool_id, "Failback rejected, primary no longer eligible");
            return Ok(false);
        }
        if needs_connect {
            entry.pool.primary.state = ConnectionState::Connected;
        }
        if !entry.pool.primary.is_ready() {
            return Ok(false);
        }
        entry.pool.active_instance_id = entry.pool.primary.instance_id.clone();
        self.total_failbacks.fetch_add(1, Ordering::Relaxed);
        info!(pool_id = %pool_id, "Pool failed back to primary");
        let _ = self.event_tx.send(RedundancyEvent::FailedBack {
            pool_id: pool_id.clone(),
        });
        Ok(true)
    }

    /// Run one replication pass from the active instance to its standby.
    pub async fn sync_pool(&self, pool_id: &PoolId) -> RedundancyResult<SyncEvent> {
        let (from_endpoint, to_endpoint, from_id, to_id, transport) = {
            let mut entry = self
                .pools
                .get_mut(pool_id)
                .ok_or_else(|| RedundancyError::PoolNotFound(pool_id.clone()))?;
            let standby = entry.pool.standby_instance();
            if standby.state == ConnectionState::Failed {
                return Err(RedundancyError::InstanceFailed {
                    pool_id: pool_id.clone(),
                    endpoint: standby.endpoint.clone(),
                });
            }
            let active = entry.pool.active_instance();
            let snapshot = (
                active.endpoint.clone(),
                standby.endpoint.clone(),
                active.instance_id.clone(),
                standby.instance_id.clone(),
                entry.transport.clone(),
            );
            entry.last_sync_attempt = Some(Utc::now());
            snapshot
        };

        let started = std::time::Instant::now();
        let outcome = match tokio::time::timeout(
            self.config.sync_timeout,
            transport.sync_records(&from_endpoint, &to_endpoint),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(AdapterError::Timeout {
                timeout_ms: self.config.sync_timeout.as_millis() as u64,
            }),
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        let mut entry = self
            .pools
            .get_mut(pool_id)
            .ok_or_else(|| RedundancyError::PoolNotFound(pool_id.clone()))?;
        let event = match outcome {
            Ok(records) => {
                self.total_syncs.fetch_add(1, Ordering::Relaxed);
                self.total_records_synced.fetch_add(records, Ordering::Relaxed);
                let now = Utc::now();
                let pool = &mut entry.pool;
                for instance in [&mut pool.primary, &mut pool.secondary] {
                    instance.last_sync_at = Some(now);
                }
                let target = if to_id == entry.pool.secondary.instance_id {
                    &mut entry.pool.secondary
                } else {
                    &mut entry.pool.primary
                };
                target.reconnect_attempts = 0;
                if target.state == ConnectionState::Reconnecting {
                    target.state = ConnectionState::Connected;
                }
                debug!(pool_id = %pool_id, records, duration_ms, "Sync pass completed");
                SyncEvent {
                    pool_id: pool_id.clone(),
                    timestamp: now,
                    from_instance: from_id,
                    to_instance: to_id,
                    records_synced: records,
                    duration_ms,
                    success: true,
                    error_message: None,
                }
            }
            Err(e) => {
                self.failed_syncs.fetch_add(1, Ordering::Relaxed);
                let max_attempts = self.config.max_reconnect_attempts;
                let target = if to_id == entry.pool.secondary.instance_id {
                    &mut entry.pool.secondary
                } else {
                    &mut entry.pool.primary
                };
                target.reconnect_attempts += 1;
                target.state = ConnectionState::Reconnecting;
                warn!(
                    pool_id = %pool_id,
                    endpoint = %target.endpoint,
                    attempt = target.reconnect_attempts,
                    error = %e,
                    "Sync pass failed"
                );
                if target.reconnect_attempts >= max_attempts {
                    target.state = ConnectionState::Failed;
                    target.is_healthy = false;
                    self.escalations.fetch_add(1, Ordering::Relaxed);
                    error!(
                        pool_id = %pool_id,
                        endpoint = %target.endpoint,
                        "Instance marked failed after exhausting sync retries"
                    );
                    let _ = self.event_tx.send(RedundancyEvent::InstanceFailed {
                        pool_id: pool_id.clone(),
                        endpoint: target.endpoint.clone(),
                    });
                }
                SyncEvent {
                    pool_id: pool_id.clone(),
                    timestamp: Utc::now(),
                    from_instance: from_id,
                    to_instance: to_id,
                    records_synced: 0,
                    duration_ms,
                    success: false,
                    error_message: Some(e.to_string()),
                }
            }
        };
        drop(entry);

        {
            let mut events = self.sync_events.write();
            events.push(event.clone());
            let cap = self.config.max_retained_events.max(1);
            if events.len() > cap {
                let excess = events.len() - cap;
                events.drain(..excess);
            }
        }
        let _ = self
            .event_tx
            .send(RedundancyEvent::SyncCompleted(event.clone()));
        Ok(event)
    }

    /// Start the background replication loop.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let manager = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(manager.config.hot_sync_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                manager.run_sync_cycle().await;
            }
        });
        *self.loop_handle.lock() = Some(handle);
        info!("Redundancy manager started");
    }

    /// Stop the background replication loop.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.loop_handle.lock().take() {
            handle.abort();
        }
        info!("Redundancy manager stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Most recent sync events, newest first.
    pub fn get_recent_sync_events(&self, limit: usize) -> Vec<SyncEvent> {
        let events = self.sync_events.read();
        events.iter().rev().take(limit).cloned().collect()
    }

    pub fn get_status(&self) -> RedundancyStatus {
        let mut failed_over = 0u64;
        let mut failed_instances = 0u64;
        let mut pool_modes = HashMap::new();
        for entry in self.pools.iter() {
            pool_modes.insert(entry.key().to_string(), entry.pool.mode);
            if entry.pool.is_failed_over() {
                failed_over += 1;
            }
            for instance in [&entry.pool.primary, &entry.pool.secondary] {
                if instance.state == ConnectionState::Failed {
                    failed_instances += 1;
                }
            }
        }
        RedundancyStatus {
            running: self.is_running(),
            registered_pools: self.pools.len() as u64,
            failed_over_pools: failed_over,
            failed_instances,
            pool_modes,
            total_sync_events: self.sync_events.read().len() as u64,
        }
    }

    pub fn get_metrics(&self) -> RedundancyMetrics {
        RedundancyMetrics {
            total_syncs: self.total_syncs.load(Ordering::Relaxed),
            failed_syncs: self.failed_syncs.load(Ordering::Relaxed),
            total_records_synced: self.total_records_synced.load(Ordering::Relaxed),
            total_failovers: self.total_failovers.load(Ordering::Relaxed),
            total_failbacks: self.total_failbacks.load(Ordering::Relaxed),
            escalations: self.escalations.load(Ordering::Relaxed),
        }
    }

    async fn try_connect(
        &self,
        transport: &Arc<dyn PoolTransport>,
        endpoint: &str,
    ) -> ConnectionState {
        match tokio::time::timeout(self.config.connect_timeout, transport.connect(endpoint)).await
        {
            Ok(Ok(())) => ConnectionState::Connected,
            Ok(Err(e)) => {
                warn!(endpoint = %endpoint, error = %e, "Connection attempt failed");
                ConnectionState::Disconnected
            }
            Err(_) => {
                warn!(endpoint = %endpoint, "Connection attempt timed out");
                ConnectionState::Disconnected
            }
        }
    }

    /// One scheduler tick: hot pools sync every tick, warm pools when their
    /// interval has elapsed, cold pools never.
    async fn run_sync_cycle(&self) {
        let now = Utc::now();
        let due: Vec<PoolId> = self
            .pools
            .iter()
            .filter(|entry| {
                if entry.pool.standby_instance().state == ConnectionState::Failed {
                    return false;
                }
                match entry.pool.mode {
                    RedundancyMode::Hot => true,
                    RedundancyMode::Warm => entry.last_sync_attempt.map_or(true, |at| {
                        (now - at).to_std().unwrap_or_default() >= self.config.sync_interval
                    }),
                    RedundancyMode::Cold => false,
                }
            })
            .map(|entry| entry.key().clone())
            .collect();

        for pool_id in due {
            if let Err(e) = self.sync_pool(&pool_id).await {
                debug!(pool_id = %pool_id, error = %e, "Skipped sync pass");
            }
        }
    }
}

impl Drop for RedundancyManager {
    fn drop(&mut self) {
        if let Some(handle) = self.loop_handle.lock().take() {
            handle.abort();
        }
    }
}

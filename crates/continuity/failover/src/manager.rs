//! Debounced failover decisions per service type.
//!
//! Consumes [`ServiceHealth`] updates, applies the threshold policy from
//! [`FailoverConfig`], activates registered fallbacks, buffers operations
//! while a fallback is serving, and replays them on recovery. Transitions
//! within one service type are serialized by the per-key map entry; distinct
//! service types proceed concurrently.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use continuity_types::{AdapterResult, HealthStatus, ServiceHealth, ServiceType};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::buffer::{BufferedOperation, OperationBuffer};
use crate::config::{FailoverConfig, FailoverMode};
use crate::error::{FailoverError, FailoverResult};
use crate::state::{FailoverEvent, FailoverState, ServiceFallback};

/// Signal broadcast to failover subscribers.
#[derive(Debug, Clone)]
pub enum FailoverSignal {
    /// A state transition occurred.
    Transition(FailoverEvent),

    /// The operation buffer overflowed and dropped its oldest entry.
    BufferOverflow {
        service_type: ServiceType,
        dropped_total: u64,
    },

    /// Buffered operations were replayed against the restored primary.
    OperationsReplayed {
        service_type: ServiceType,
        replayed: u64,
    },
}

/// Replays buffered operations against a restored primary.
///
/// Injected at construction so callers control how operations reach the
/// primary; replay failures are absorbed and logged, never raised.
#[async_trait]
pub trait OperationReplayer: Send + Sync {
    async fn replay(
        &self,
        service_type: ServiceType,
        operations: Vec<BufferedOperation>,
    ) -> AdapterResult<u64>;
}

/// Replayer that acknowledges operations without sending them anywhere.
pub struct NoOpReplayer;

#[async_trait]
impl OperationReplayer for NoOpReplayer {
    async fn replay(
        &self,
        _service_type: ServiceType,
        operations: Vec<BufferedOperation>,
    ) -> AdapterResult<u64> {
        Ok(operations.len() as u64)
    }
}

/// Per-service-type failover state.
struct TypeEntry {
    state: FailoverState,
    fallback: ServiceFallback,
    failure_count: u32,
    fallback_success_count: u32,
    buffer: OperationBuffer,
    pending_recovery: bool,
}

/// Snapshot of manager state for observability callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverStatus {
    pub mode: FailoverMode,
    pub active_failovers: u64,
    pub service_states: HashMap<String, FailoverState>,
    pub buffered_operations: u64,
    pub total_events: u64,
}

/// Cumulative failover counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverMetrics {
    pub registered_fallbacks: u64,
    pub active_failovers: u64,
    pub total_failovers: u64,
    pub total_recoveries: u64,
    pub buffer_overflows: u64,
    pub deferred_recoveries: u64,
}

/// The failover decision layer.
pub struct FailoverManager {
    config: FailoverConfig,
    entries: DashMap<ServiceType, TypeEntry>,
    events: RwLock<Vec<FailoverEvent>>,
    event_tx: broadcast::Sender<FailoverSignal>,
    replayer: Arc<dyn OperationReplayer>,
    total_failovers: AtomicU64,
    total_recoveries: AtomicU64,
    buffer_overflows: AtomicU64,
    deferred_recoveries: AtomicU64,
}

/// Recovery outcome carried out of the entry lock so replay can await freely.
struct RecoveryJob {
    operations: Vec<BufferedOperation>,
}

impl FailoverManager {
    pub fn new(config: FailoverConfig) -> Self {
        Self::with_replayer(config, Arc::new(NoOpReplayer))
    }

    pub fn with_replayer(config: FailoverConfig, replayer: Arc<dyn OperationReplayer>) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            config,
            entries: DashMap::new(),
            events: RwLock::new(Vec::new()),
            event_tx,
            replayer,
            total_failovers: AtomicU64::new(0),
            total_recoveries: AtomicU64::new(0),
            buffer_overflows: AtomicU64::new(0),
            deferred_recoveries: AtomicU64::new(0),
        }
    }

    /// Subscribe to failover signals.
    pub fn subscribe(&self) -> broadcast::Receiver<FailoverSignal> {
        self.event_tx.subscribe()
    }

    /// Register a fallback target for a service type.
    pub fn register_fallback(
        &self,
        service_type: ServiceType,
        primary_target: impl Into<String>,
        fallback_target: impl Into<String>,
    ) -> FailoverResult<()> {
        if self.entries.contains_key(&service_type) {
            return Err(FailoverError::AlreadyRegistered(service_type));
        }
        let fallback = ServiceFallback::new(service_type, primary_target, fallback_target);
        info!(
            service_type = %service_type,
            primary = %fallback.primary_target,
            fallback = %fallback.fallback_target,
            "Registered fallback"
        );
        self.entries.insert(
            service_type,
            TypeEntry {
                state: FailoverState::Normal,
                fallback,
                failure_count: 0,
                fallback_success_count: 0,
                buffer: OperationBuffer::new(self.config.buffer_max_size),
                pending_recovery: false,
            },
        );
        Ok(())
    }

    /// Current fallback routing for a service type.
    pub fn get_fallback(&self, service_type: ServiceType) -> Option<ServiceFallback> {
        self.entries.get(&service_type).map(|e| e.fallback.clone())
    }

    /// Current state for a service type.
    pub fn get_state(&self, service_type: ServiceType) -> Option<FailoverState> {
        self.entries.get(&service_type).map(|e| e.state)
    }

    /// Consume one health update.
    ///
    /// Failure reports advance the failure counter toward activation; healthy
    /// reports advance the success counter toward recovery. Service types
    /// with no registered fallback are ignored.
    pub async fn process_health_update(&self, health: &ServiceHealth) {
        let service_type = health.service_type;
        let job = {
            let Some(mut entry) = self.entries.get_mut(&service_type) else {
                return;
            };
            if health.status.is_failure() {
                self.on_failure_report(&mut entry, health);
                None
            } else if health.status == HealthStatus::Healthy {
                self.on_healthy_report(&mut entry, true)
            } else {
                // Degraded neither advances nor resets the counters.
                None
            }
        };
        if let Some(job) = job {
            self.replay_operations(service_type, job.operations).await;
        }
    }

    /// Activate a fallback by operator action, bypassing thresholds.
    #[instrument(skip(self, reason))]
    pub fn manual_failover(
        &self,
        service_type: ServiceType,
        reason: impl Into<String>,
    ) -> FailoverResult<FailoverEvent> {
        let mut entry = self
            .entries
            .get_mut(&service_type)
            .ok_or(FailoverError::NoFallbackRegistered(service_type))?;
        if entry.fallback.is_active {
            return Err(FailoverError::AlreadyActive(service_type));
        }
        Ok(self.activate(&mut entry, reason.into(), false))
    }

    /// Recover back to the primary by operator action, bypassing thresholds
    /// and cooldown. Buffered operations are replayed before returning.
    #[instrument(skip(self, reason))]
    pub async fn manual_recovery(
        &self,
        service_type: ServiceType,
        reason: impl Into<String>,
    ) -> FailoverResult<FailoverEvent> {
        let (event, operations) = {
            let mut entry = self
                .entries
                .get_mut(&service_type)
                .ok_or(FailoverError::NoFallbackRegistered(service_type))?;
            if !entry.fallback.is_active {
                return Err(FailoverError::NotActive(service_type));
            }
            self.deactivate(&mut entry, reason.into(), false)
        };
        self.replay_operations(service_type, operations).await;
        Ok(event)
    }

    /// Buffer an operation for replay after recovery.
    ///
    /// Only valid while the service type's fallback is active. Overflow drops
    /// the oldest buffered entry and counts an overflow; it is not an error.
    pub fn buffer_operation(
        &self,
        service_type: ServiceType,
        operation_type: impl Into<String>,
        operation_data: serde_json::Value,
    ) -> FailoverResult<()> {
        let mut entry = self
            .entries
            .get_mut(&service_type)
            .ok_or(FailoverError::NoFallbackRegistered(service_type))?;
        if !entry.fallback.is_active {
            return Err(FailoverError::NotActive(service_type));
        }
        let dropped = entry.buffer.push(operation_type, operation_data);
        entry.fallback.buffered_operations = entry.buffer.len() as u64;
        if dropped.is_some() {
            let dropped_total = self.buffer_overflows.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                service_type = %service_type,
                dropped_total,
                "Operation buffer overflow, dropped oldest entry"
            );
            let _ = self.event_tx.send(FailoverSignal::BufferOverflow {
                service_type,
                dropped_total,
            });
        }
        Ok(())
    }

    /// Most recent transition events, newest first.
    pub fn get_recent_events(&self, limit: usize) -> Vec<FailoverEvent> {
        let events = self.events.read();
        events.iter().rev().take(limit).cloned().collect()
    }

    pub fn get_status(&self) -> FailoverStatus {
        let mut service_states = HashMap::new();
        let mut active = 0u64;
        let mut buffered = 0u64;
        for entry in self.entries.iter() {
            service_states.insert(entry.key().to_string(), entry.state);
            if entry.fallback.is_active {
                active += 1;
            }
            buffered += entry.buffer.len() as u64;
        }
        FailoverStatus {
            mode: self.config.mode,
            active_failovers: active,
            service_states,
            buffered_operations: buffered,
            total_events: self.events.read().len() as u64,
        }
    }

    pub fn get_metrics(&self) -> FailoverMetrics {
        let active = self
            .entries
            .iter()
            .filter(|e| e.fallback.is_active)
            .count() as u64;
        FailoverMetrics {
            registered_fallbacks: self.entries.len() as u64,
            active_failovers: active,
            total_failovers: self.total_failovers.load(Ordering::Relaxed),
            total_recoveries: self.total_recoveries.load(Ordering::Relaxed),
            buffer_overflows: self.buffer_overflows.load(Ordering::Relaxed),
            deferred_recoveries: self.deferred_recoveries.load(Ordering::Relaxed),
        }
    }

    fn on_failure_report(&self, entry: &mut TypeEntry, health: &ServiceHealth) {
        entry.failure_count += 1;
        entry.fallback_success_count = 0;
        debug!(
            service_type = %health.service_type,
            failure_count = entry.failure_count,
            status = %health.status,
            "Failure reported"
        );

        if entry.fallback.is_active {
            // Fallback itself is failing.
            if entry.failure_count >= self.config.failure_threshold
                && entry.state == FailoverState::Failover
            {
                self.transition(
                    entry,
                    FailoverState::Emergency,
                    format!("fallback target unhealthy: {}", health.service_id),
                    true,
                    None,
                );
            }
            return;
        }

        if entry.failure_count >= self.config.failure_threshold {
            if self.config.mode == FailoverMode::Automatic {
                let reason = format!(
                    "{} consecutive failures on {}",
                    entry.failure_count, health.service_id
                );
                self.activate(entry, reason, true);
            }
        } else if entry.state == FailoverState::Normal {
            self.transition(
                entry,
                FailoverState::Degraded,
                format!("failure reported by {}", health.service_id),
                true,
                None,
            );
        }
    }

    fn on_healthy_report(&self, entry: &mut TypeEntry, auto: bool) -> Option<RecoveryJob> {
        entry.failure_count = 0;

        if !entry.fallback.is_active {
            if entry.state == FailoverState::Degraded {
                self.transition(
                    entry,
                    FailoverState::Normal,
                    "health restored below threshold".to_string(),
                    auto,
                    None,
                );
            }
            return None;
        }

        entry.fallback_success_count += 1;
        if !self.config.auto_recovery_enabled
            || entry.fallback_success_count < self.config.recovery_threshold
        {
            return None;
        }

        let dwell = entry
            .fallback
            .activated_at
            .map(|at| (Utc::now() - at).to_std().unwrap_or_default())
            .unwrap_or_default();
        if dwell < self.config.cooldown {
            if !entry.pending_recovery {
                entry.pending_recovery = true;
                self.deferred_recoveries.fetch_add(1, Ordering::Relaxed);
                info!(
                    service_type = %entry.fallback.service_type,
                    dwell_ms = dwell.as_millis() as u64,
                    cooldown_ms = self.config.cooldown.as_millis() as u64,
                    "Recovery deferred until cooldown elapses"
                );
            }
            return None;
        }

        let reason = format!(
            "{} consecutive healthy reports on fallback",
            entry.fallback_success_count
        );
        let (_, operations) = self.deactivate(entry, reason, auto);
        Some(RecoveryJob { operations })
    }

    /// Flip the fallback active and move to Failover state.
    fn activate(&self, entry: &mut TypeEntry, reason: String, auto: bool) -> FailoverEvent {
        entry.fallback.is_active = true;
        entry.fallback.activated_at = Some(Utc::now());
        entry.failure_count = 0;
        entry.fallback_success_count = 0;
        entry.pending_recovery = false;
        self.total_failovers.fetch_add(1, Ordering::Relaxed);
        info!(
            service_type = %entry.fallback.service_type,
            fallback = %entry.fallback.fallback_target,
            auto_triggered = auto,
            "Failover activated"
        );
        self.transition(entry, FailoverState::Failover, reason, auto, None)
    }

    /// Deactivate the fallback and return buffered operations for replay.
    fn deactivate(
        &self,
        entry: &mut TypeEntry,
        reason: String,
        auto: bool,
    ) -> (FailoverEvent, Vec<BufferedOperation>) {
        let operations = entry.buffer.drain();
        let recovery_seconds = entry
            .fallback
            .activated_at
            .map(|at| (Utc::now() - at).num_milliseconds().max(0) as f64 / 1000.0)
            .unwrap_or(0.0);
        entry.fallback.is_active = false;
        entry.fallback.buffered_operations = 0;
        entry.failure_count = 0;
        entry.fallback_success_count = 0;
        entry.pending_recovery = false;
        self.total_recoveries.fetch_add(1, Ordering::Relaxed);
        info!(
            service_type = %entry.fallback.service_type,
            recovery_seconds,
            buffered = operations.len(),
            "Recovered to primary"
        );
        let event = self.transition(
            entry,
            FailoverState::Normal,
            reason,
            auto,
            Some(recovery_seconds),
        );
        (event, operations)
    }

    fn transition(
        &self,
        entry: &mut TypeEntry,
        to_state: FailoverState,
        reason: String,
        auto: bool,
        recovery_seconds: Option<f64>,
    ) -> FailoverEvent {
        let mut event = FailoverEvent::new(
            entry.fallback.service_type,
            entry.state,
            to_state,
            reason,
            auto,
        );
        if let Some(seconds) = recovery_seconds {
            event = event.with_recovery_time(seconds);
        }
        entry.state = to_state;
        {
            let mut events = self.events.write();
            events.push(event.clone());
            let cap = self.config.max_retained_events.max(1);
            if events.len() > cap {
                let excess = events.len() - cap;
                events.drain(..excess);
            }
        }
        let _ = self.event_tx.send(FailoverSignal::Transition(event.clone()));
        event
    }

    async fn replay_operations(
        &self,
        service_type: ServiceType,
        operations: Vec<BufferedOperation>,
    ) {
        if operations.is_empty() {
            return;
        }
        let count = operations.len();
        match self.replayer.replay(service_type, operations).await {
            Ok(replayed) => {
                info!(service_type = %service_type, replayed, "Replayed buffered operations");
                let _ = self.event_tx.send(FailoverSignal::OperationsReplayed {
                    service_type,
                    replayed,
                });
            }
            Err(e) => {
                warn!(
                    service_type = %service_type,
                    count,
                    error = %e,
                    "Failed to replay buffered operations"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use continuity_types::{HealthStatus, ServiceId};
    use parking_lot::Mutex;

    use super::*;

    fn health(status: HealthStatus) -> ServiceHealth {
        let mut h = ServiceHealth::new(
            ServiceId::new("redis-1"),
            ServiceType::Cache,
            "primary cache",
        );
        h.status = status;
        h
    }

    fn fast_config() -> FailoverConfig {
        FailoverConfig {
            cooldown: Duration::ZERO,
            ..FailoverConfig::default()
        }
    }

    struct RecordingReplayer {
        seen: Mutex<Vec<BufferedOperation>>,
    }

    #[async_trait]
    impl OperationReplayer for RecordingReplayer {
        async fn replay(
            &self,
            _service_type: ServiceType,
            operations: Vec<BufferedOperation>,
        ) -> AdapterResult<u64> {
            let count = operations.len() as u64;
            self.seen.lock().extend(operations);
            Ok(count)
        }
    }

    #[tokio::test]
    async fn test_auto_failover_fires_once_per_window() {
        let manager = FailoverManager::new(fast_config());
        manager
            .register_fallback(ServiceType::Cache, "redis://a:6379", "redis://b:6379")
            .unwrap();

        for _ in 0..3 {
            manager.process_health_update(&health(HealthStatus::Unhealthy)).await;
        }
        assert_eq!(manager.get_state(ServiceType::Cache), Some(FailoverState::Failover));
        assert_eq!(manager.get_status().active_failovers, 1);

        // Continued failures must not activate again.
        for _ in 0..5 {
            manager.process_health_update(&health(HealthStatus::Offline)).await;
        }
        let activations = manager
            .get_recent_events(100)
            .iter()
            .filter(|e| e.to_state == FailoverState::Failover && e.auto_triggered)
            .count();
        assert_eq!(activations, 1);
        assert_eq!(manager.get_metrics().total_failovers, 1);
    }

    #[tokio::test]
    async fn test_sustained_fallback_failures_escalate_to_emergency() {
        let manager = FailoverManager::new(fast_config());
        manager
            .register_fallback(ServiceType::Cache, "redis://a:6379", "redis://b:6379")
            .unwrap();

        for _ in 0..6 {
            manager.process_health_update(&health(HealthStatus::Unhealthy)).await;
        }
        assert_eq!(manager.get_state(ServiceType::Cache), Some(FailoverState::Emergency));
    }

    #[tokio::test]
    async fn test_recovery_replays_buffered_operations_in_order() {
        let replayer = Arc::new(RecordingReplayer {
            seen: Mutex::new(Vec::new()),
        });
        let manager = FailoverManager::with_replayer(fast_config(), replayer.clone());
        manager
            .register_fallback(ServiceType::Cache, "redis://a:6379", "redis://b:6379")
            .unwrap();

        for _ in 0..3 {
            manager.process_health_update(&health(HealthStatus::Unhealthy)).await;
        }
        for i in 0..4 {
            manager
                .buffer_operation(ServiceType::Cache, "write", serde_json::json!({ "seq": i }))
                .unwrap();
        }

        for _ in 0..2 {
            manager.process_health_update(&health(HealthStatus::Healthy)).await;
        }

        assert_eq!(manager.get_state(ServiceType::Cache), Some(FailoverState::Normal));
        let events = manager.get_recent_events(1);
        assert_eq!(events[0].to_state, FailoverState::Normal);
        assert!(events[0].recovery_time_seconds.is_some());

        let seen = replayer.seen.lock();
        assert_eq!(seen.len(), 4);
        for (i, op) in seen.iter().enumerate() {
            assert_eq!(op.operation_data["seq"], i);
        }
    }

    #[tokio::test]
    async fn test_recovery_deferred_until_cooldown_elapses() {
        let config = FailoverConfig {
            cooldown: Duration::from_millis(100),
            ..FailoverConfig::default()
        };
        let manager = FailoverManager::new(config);
        manager
            .register_fallback(ServiceType::Cache, "redis://a:6379", "redis://b:6379")
            .unwrap();

        for _ in 0..3 {
            manager.process_health_update(&health(HealthStatus::Unhealthy)).await;
        }
        for _ in 0..2 {
            manager.process_health_update(&health(HealthStatus::Healthy)).await;
        }
        // Still inside the cooldown window.
        assert_eq!(manager.get_state(ServiceType::Cache), Some(FailoverState::Failover));
        assert_eq!(manager.get_metrics().deferred_recoveries, 1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        manager.process_health_update(&health(HealthStatus::Healthy)).await;
        assert_eq!(manager.get_state(ServiceType::Cache), Some(FailoverState::Normal));
        assert_eq!(manager.get_metrics().total_recoveries, 1);
    }

    #[tokio::test]
    async fn test_manual_failover_and_recovery() {
        let manager = FailoverManager::new(fast_config());

        assert!(matches!(
            manager.manual_failover(ServiceType::Cache, "drill"),
            Err(FailoverError::NoFallbackRegistered(_))
        ));

        manager
            .register_fallback(ServiceType::Cache, "redis://a:6379", "redis://b:6379")
            .unwrap();

        let event = manager.manual_failover(ServiceType::Cache, "drill").unwrap();
        assert!(!event.auto_triggered);
        assert_eq!(event.to_state, FailoverState::Failover);

        assert!(matches!(
            manager.manual_failover(ServiceType::Cache, "drill again"),
            Err(FailoverError::AlreadyActive(_))
        ));

        let recovery = manager
            .manual_recovery(ServiceType::Cache, "drill complete")
            .await
            .unwrap();
        assert!(!recovery.auto_triggered);
        assert_eq!(recovery.to_state, FailoverState::Normal);
        assert!(recovery.recovery_time_seconds.is_some());

        assert!(matches!(
            manager.manual_recovery(ServiceType::Cache, "nothing active").await,
            Err(FailoverError::NotActive(_))
        ));
    }

    #[tokio::test]
    async fn test_buffer_overflow_counts_and_drops_oldest() {
        let config = FailoverConfig {
            buffer_max_size: 2,
            cooldown: Duration::ZERO,
            ..FailoverConfig::default()
        };
        let manager = FailoverManager::new(config);
        manager
            .register_fallback(ServiceType::Cache, "redis://a:6379", "redis://b:6379")
            .unwrap();

        assert!(matches!(
            manager.buffer_operation(ServiceType::Cache, "write", serde_json::json!({})),
            Err(FailoverError::NotActive(_))
        ));

        manager.manual_failover(ServiceType::Cache, "drill").unwrap();
        for i in 0..3 {
            manager
                .buffer_operation(ServiceType::Cache, "write", serde_json::json!({ "seq": i }))
                .unwrap();
        }

        assert_eq!(manager.get_metrics().buffer_overflows, 1);
        let fallback = manager.get_fallback(ServiceType::Cache).unwrap();
        assert_eq!(fallback.buffered_operations, 2);
    }

    #[tokio::test]
    async fn test_single_failure_degrades_then_heals() {
        let manager = FailoverManager::new(fast_config());
        manager
            .register_fallback(ServiceType::SearchIndex, "es://a:9200", "es://b:9200")
            .unwrap();

        manager
            .process_health_update(&{
                let mut h = health(HealthStatus::Unhealthy);
                h.service_type = ServiceType::SearchIndex;
                h
            })
            .await;
        assert_eq!(
            manager.get_state(ServiceType::SearchIndex),
            Some(FailoverState::Degraded)
        );

        manager
            .process_health_update(&{
                let mut h = health(HealthStatus::Healthy);
                h.service_type = ServiceType::SearchIndex;
                h
            })
            .await;
        assert_eq!(
            manager.get_state(ServiceType::SearchIndex),
            Some(FailoverState::Normal)
        );
        assert_eq!(manager.get_metrics().total_failovers, 0);
    }

    #[tokio::test]
    async fn test_zero_event_capacity_is_clamped() {
        let config = FailoverConfig {
            event_capacity: 0,
            ..fast_config()
        };
        let manager = FailoverManager::new(config);
        let _rx = manager.subscribe();
        manager
            .register_fallback(ServiceType::Cache, "redis://a:6379", "redis://b:6379")
            .unwrap();
        manager.manual_failover(ServiceType::Cache, "drill").unwrap();
    }

    #[tokio::test]
    async fn test_event_history_is_bounded() {
        let config = FailoverConfig {
            max_retained_events: 2,
            ..fast_config()
        };
        let manager = FailoverManager::new(config);
        manager
            .register_fallback(ServiceType::Cache, "redis://a:6379", "redis://b:6379")
            .unwrap();

        for _ in 0..3 {
            manager.manual_failover(ServiceType::Cache, "drill").unwrap();
            manager
                .manual_recovery(ServiceType::Cache, "drill complete")
                .await
                .unwrap();
        }

        assert_eq!(manager.get_status().total_events, 2);
        let events = manager.get_recent_events(100);
        assert_eq!(events.len(), 2);
        // Oldest events were dropped, the newest transitions survive.
        assert_eq!(events[0].to_state, FailoverState::Normal);
        assert_eq!(events[1].to_state, FailoverState::Failover);
    }

    #[tokio::test]
    async fn test_manual_mode_never_auto_activates() {
        let config = FailoverConfig {
            mode: FailoverMode::Manual,
            cooldown: Duration::ZERO,
            ..FailoverConfig::default()
        };
        let manager = FailoverManager::new(config);
        manager
            .register_fallback(ServiceType::Cache, "redis://a:6379", "redis://b:6379")
            .unwrap();

        for _ in 0..10 {
            manager.process_health_update(&health(HealthStatus::Offline)).await;
        }
        assert_ne!(manager.get_state(ServiceType::Cache), Some(FailoverState::Failover));
        assert_eq!(manager.get_status().active_failovers, 0);
    }
}

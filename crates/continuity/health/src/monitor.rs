//! The health check service.
//!
//! Periodically probes every registered backing service through its
//! caller-supplied adapter, classifies the result, and publishes aggregated
//! snapshots. Probe failures are absorbed into state; a check cycle always
//! completes and always yields exactly one snapshot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use continuity_types::{
    AdapterError, HealthStatus, ProbeOutcome, ServiceAdapter, ServiceHealth, ServiceId,
    ServiceType,
};

use crate::config::HealthCheckConfig;
use crate::error::{HealthError, HealthResult};
use crate::snapshot::{CheckCounters, HealthSnapshot, SnapshotWindow, UptimeReport};

/// Events emitted by the health check service.
#[derive(Debug, Clone)]
pub enum HealthEvent {
    /// Service was registered for monitoring.
    ServiceRegistered(ServiceId),

    /// Service was unregistered.
    ServiceUnregistered(ServiceId),

    /// One probe finished and the service's record was updated.
    ProbeCompleted(ServiceHealth),

    /// A service's classified status changed.
    StatusChanged {
        service_id: ServiceId,
        old_status: HealthStatus,
        new_status: HealthStatus,
    },

    /// A full check cycle produced a snapshot.
    SnapshotPublished(HealthSnapshot),
}

struct MonitoredService {
    health: ServiceHealth,
    endpoint: String,
    adapter: Arc<dyn ServiceAdapter>,
}

/// Periodic health checker for registered backing services.
pub struct HealthCheckService {
    config: HealthCheckConfig,

    /// Registered services and their latest health records.
    services: DashMap<ServiceId, MonitoredService>,

    /// Lifetime per-service counters, removed with the service.
    counters: DashMap<ServiceId, (String, CheckCounters)>,

    /// Rolling snapshot window.
    snapshots: RwLock<SnapshotWindow>,

    /// Event broadcaster.
    event_tx: broadcast::Sender<HealthEvent>,

    /// Background loop handle.
    loop_handle: Mutex<Option<JoinHandle<()>>>,

    running: AtomicBool,
    total_checks: AtomicU64,
}

impl HealthCheckService {
    /// Create a new health check service.
    pub fn new(config: HealthCheckConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            config,
            services: DashMap::new(),
            counters: DashMap::new(),
            snapshots: RwLock::new(SnapshotWindow::new()),
            event_tx,
            loop_handle: Mutex::new(None),
            running: AtomicBool::new(false),
            total_checks: AtomicU64::new(0),
        }
    }

    /// Subscribe to health events.
    pub fn subscribe(&self) -> broadcast::Receiver<HealthEvent> {
        self.event_tx.subscribe()
    }

    /// Register a service for monitoring.
    #[instrument(skip(self, adapter))]
    pub fn register_service(
        &self,
        service_id: ServiceId,
        service_type: ServiceType,
        service_name: impl Into<String> + std::fmt::Debug,
        endpoint: impl Into<String> + std::fmt::Debug,
        adapter: Arc<dyn ServiceAdapter>,
    ) -> HealthResult<()> {
        if self.services.contains_key(&service_id) {
            return Err(HealthError::AlreadyRegistered(service_id));
        }

        let service_name = service_name.into();
        info!(service_id = %service_id, service_type = %service_type, "Registering service for health checks");

        self.counters.insert(
            service_id.clone(),
            (service_name.clone(), CheckCounters::default()),
        );
        self.services.insert(
            service_id.clone(),
            MonitoredService {
                health: ServiceHealth::new(service_id.clone(), service_type, service_name),
                endpoint: endpoint.into(),
                adapter,
            },
        );

        let _ = self
            .event_tx
            .send(HealthEvent::ServiceRegistered(service_id));
        Ok(())
    }

    /// Unregister a service from monitoring.
    #[instrument(skip(self))]
    pub fn unregister_service(&self, service_id: &ServiceId) -> HealthResult<()> {
        if self.services.remove(service_id).is_none() {
            return Err(HealthError::ServiceNotFound(service_id.clone()));
        }
        self.counters.remove(service_id);

        info!(service_id = %service_id, "Unregistered service");
        let _ = self
            .event_tx
            .send(HealthEvent::ServiceUnregistered(service_id.clone()));
        Ok(())
    }

    /// Number of registered services.
    pub fn registered_count(&self) -> usize {
        self.services.len()
    }

    /// Probe every registered service and publish one snapshot.
    ///
    /// Probes run concurrently up to `max_concurrent_probes`; a slow or
    /// unreachable service never delays the others past its own timeout.
    #[instrument(skip(self))]
    pub async fn perform_full_check(&self) -> HealthSnapshot {
        let targets: Vec<(ServiceId, Arc<dyn ServiceAdapter>)> = self
            .services
            .iter()
            .map(|r| (r.key().clone(), r.value().adapter.clone()))
            .collect();

        let timeout = self.config.probe_timeout;
        let mut results: Vec<(ServiceId, Result<ProbeOutcome, AdapterError>)> = Vec::new();

        for chunk in targets.chunks(self.config.max_concurrent_probes.max(1)) {
            let probes = chunk.iter().map(|(id, adapter)| {
                let id = id.clone();
                let adapter = adapter.clone();
                async move {
                    let outcome = match tokio::time::timeout(timeout, adapter.probe()).await {
                        Ok(result) => result,
                        Err(_) => Err(AdapterError::Timeout {
                            timeout_ms: timeout.as_millis() as u64,
                        }),
                    };
                    (id, outcome)
                }
            });
            results.extend(join_all(probes).await);
        }

        let mut snapshot_services = HashMap::new();
        for (service_id, outcome) in results {
            if let Some(mut entry) = self.services.get_mut(&service_id) {
                let old_status = entry.health.status;
                self.classify(&mut entry.health, outcome);
                let health = entry.health.clone();
                drop(entry);

                if let Some(mut counters) = self.counters.get_mut(&service_id) {
                    counters.1.record(health.status, health.latency_ms);
                }

                if old_status != health.status {
                    info!(
                        service_id = %service_id,
                        old_status = %old_status,
                        new_status = %health.status,
                        "Service status changed"
                    );
                    let _ = self.event_tx.send(HealthEvent::StatusChanged {
                        service_id: service_id.clone(),
                        old_status,
                        new_status: health.status,
                    });
                }

                let _ = self
                    .event_tx
                    .send(HealthEvent::ProbeCompleted(health.clone()));
                snapshot_services.insert(service_id, health);
            }
        }

        let snapshot = HealthSnapshot::from_services(snapshot_services);
        self.snapshots
            .write()
            .push(snapshot.clone(), self.config.snapshot_retention_hours);
        self.total_checks.fetch_add(1, Ordering::SeqCst);

        debug!(
            overall = %snapshot.overall_status,
            services = snapshot.services.len(),
            avg_latency_ms = snapshot.avg_latency_ms,
            "Check cycle completed"
        );
        let _ = self
            .event_tx
            .send(HealthEvent::SnapshotPublished(snapshot.clone()));

        snapshot
    }

    /// Map a probe outcome onto the service's health record.
    fn classify(&self, health: &mut ServiceHealth, outcome: Result<ProbeOutcome, AdapterError>) {
        health.last_checked = Utc::now();

        match outcome {
            Ok(probe) => {
                health.consecutive_failures = 0;
                health.error_message = None;
                health.latency_ms = probe.latency_ms;
                health.status = if probe.latency_ms > self.config.latency_threshold_ms {
                    HealthStatus::Degraded
                } else {
                    HealthStatus::Healthy
                };
            }
            Err(err) => {
                health.consecutive_failures += 1;
                health.error_message = Some(err.to_string());
                health.latency_ms = 0;
                health.status = if health.consecutive_failures >= self.config.offline_threshold {
                    HealthStatus::Offline
                } else if health.consecutive_failures >= self.config.failure_threshold {
                    HealthStatus::Unhealthy
                } else {
                    // Failing but not yet past the threshold.
                    HealthStatus::Degraded
                };
                warn!(
                    service_id = %health.service_id,
                    consecutive_failures = health.consecutive_failures,
                    status = %health.status,
                    "Probe failed"
                );
            }
        }
    }

    /// Latest snapshot, if a cycle has run.
    pub fn get_current_snapshot(&self) -> Option<HealthSnapshot> {
        self.snapshots.read().current().cloned()
    }

    /// Snapshots from the trailing hour.
    pub fn get_1h_snapshots(&self) -> Vec<HealthSnapshot> {
        self.snapshots.read().within_hours(1)
    }

    /// Snapshots from the trailing 24 hours.
    pub fn get_24h_snapshots(&self) -> Vec<HealthSnapshot> {
        self.snapshots.read().within_hours(24)
    }

    /// Latest health record for one service.
    pub fn get_service_health(&self, service_id: &ServiceId) -> Option<ServiceHealth> {
        self.services.get(service_id).map(|r| r.health.clone())
    }

    /// Endpoint a service was registered with.
    pub fn get_service_endpoint(&self, service_id: &ServiceId) -> Option<String> {
        self.services.get(service_id).map(|r| r.endpoint.clone())
    }

    /// Uptime report over the trailing `hours`.
    pub fn get_uptime_report(&self, hours: u32) -> UptimeReport {
        let snapshots = self.snapshots.read().within_hours(hours);
        let counters: HashMap<ServiceId, (String, CheckCounters)> = self
            .counters
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        UptimeReport::build(hours, &snapshots, &counters)
    }

    /// Cumulative counters.
    pub fn get_metrics(&self) -> HealthMetrics {
        HealthMetrics {
            total_checks: self.total_checks.load(Ordering::SeqCst),
            registered_services: self.services.len() as u64,
            retained_snapshots: self.snapshots.read().len() as u64,
        }
    }

    /// Structured status for observability consumers.
    pub fn get_status(&self) -> HealthServiceStatus {
        let snapshots = self.snapshots.read();
        let current = snapshots.current();
        HealthServiceStatus {
            running: self.running.load(Ordering::SeqCst),
            registered_services: self.services.len() as u64,
            overall_status: current.map(|s| s.overall_status),
            last_check_at: current.map(|s| s.timestamp),
        }
    }

    /// Spawn the periodic check loop.
    pub fn start(self: &Arc<Self>) {
        let mut handle = self.loop_handle.lock();
        if handle.is_some() {
            return;
        }

        info!(
            interval_ms = self.config.check_interval.as_millis() as u64,
            "Starting health check loop"
        );
        self.running.store(true, Ordering::SeqCst);

        let service = Arc::clone(self);
        *handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(service.config.check_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                service.perform_full_check().await;
            }
        }));
    }

    /// Stop the periodic check loop.
    pub fn stop(&self) {
        if let Some(handle) = self.loop_handle.lock().take() {
            handle.abort();
        }
        self.running.store(false, Ordering::SeqCst);
        info!("Stopped health check loop");
    }
}

impl Drop for HealthCheckService {
    fn drop(&mut self) {
        if let Some(handle) = self.loop_handle.lock().take() {
            handle.abort();
        }
    }
}

/// Cumulative health check counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthMetrics {
    pub total_checks: u64,
    pub registered_services: u64,
    pub retained_snapshots: u64,
}

/// Structured status snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthServiceStatus {
    pub running: bool,
    pub registered_services: u64,
    pub overall_status: Option<HealthStatus>,
    pub last_check_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use continuity_types::StaticAdapter;

    fn service() -> HealthCheckService {
        HealthCheckService::new(HealthCheckConfig {
            failure_threshold: 3,
            offline_threshold: 5,
            latency_threshold_ms: 100,
            ..HealthCheckConfig::default()
        })
    }

    #[tokio::test]
    async fn test_register_and_check() {
        let svc = service();
        let adapter = StaticAdapter::healthy(20);
        svc.register_service(
            ServiceId::new("redis-1"),
            ServiceType::Cache,
            "redis primary",
            "redis://cache-1:6379",
            adapter,
        )
        .unwrap();

        let snapshot = svc.perform_full_check().await;
        assert_eq!(snapshot.overall_status, HealthStatus::Healthy);
        assert_eq!(snapshot.healthy_count, 1);
        assert_eq!(svc.get_metrics().total_checks, 1);
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let svc = service();
        let id = ServiceId::new("neo4j-1");
        svc.register_service(
            id.clone(),
            ServiceType::GraphDb,
            "graph",
            "bolt://graph:7687",
            StaticAdapter::healthy(5),
        )
        .unwrap();

        let err = svc.register_service(
            id,
            ServiceType::GraphDb,
            "graph",
            "bolt://graph:7687",
            StaticAdapter::healthy(5),
        );
        assert!(matches!(err, Err(HealthError::AlreadyRegistered(_))));
    }

    #[tokio::test]
    async fn test_high_latency_is_degraded() {
        let svc = service();
        svc.register_service(
            ServiceId::new("es-1"),
            ServiceType::SearchIndex,
            "search",
            "http://search:9200",
            StaticAdapter::healthy(250),
        )
        .unwrap();

        let snapshot = svc.perform_full_check().await;
        assert_eq!(snapshot.overall_status, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn test_failures_escalate_to_unhealthy_then_offline() {
        let svc = service();
        let adapter = StaticAdapter::healthy(10);
        let id = ServiceId::new("kafka-1");
        svc.register_service(
            id.clone(),
            ServiceType::MessageBroker,
            "broker",
            "kafka://broker:9092",
            adapter.clone(),
        )
        .unwrap();

        adapter.fail_with("connection refused");
        for _ in 0..2 {
            svc.perform_full_check().await;
        }
        assert_eq!(
            svc.get_service_health(&id).unwrap().status,
            HealthStatus::Degraded
        );

        svc.perform_full_check().await;
        assert_eq!(
            svc.get_service_health(&id).unwrap().status,
            HealthStatus::Unhealthy
        );

        for _ in 0..2 {
            svc.perform_full_check().await;
        }
        let health = svc.get_service_health(&id).unwrap();
        assert_eq!(health.status, HealthStatus::Offline);
        assert_eq!(health.consecutive_failures, 5);
    }

    #[tokio::test]
    async fn test_recovery_resets_failure_count() {
        let svc = service();
        let adapter = StaticAdapter::healthy(10);
        let id = ServiceId::new("redis-1");
        svc.register_service(
            id.clone(),
            ServiceType::Cache,
            "cache",
            "redis://cache:6379",
            adapter.clone(),
        )
        .unwrap();

        adapter.fail_with("connection refused");
        for _ in 0..3 {
            svc.perform_full_check().await;
        }
        assert!(svc.get_service_health(&id).unwrap().status.is_failure());

        adapter.recover();
        svc.perform_full_check().await;
        let health = svc.get_service_health(&id).unwrap();
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.consecutive_failures, 0);
        assert!(health.error_message.is_none());
    }

    #[tokio::test]
    async fn test_cycle_completes_with_all_services_down() {
        let svc = service();
        for i in 0..3 {
            let adapter = StaticAdapter::healthy(10);
            adapter.fail_with("network partition");
            svc.register_service(
                ServiceId::new(format!("svc-{}", i)),
                ServiceType::Cache,
                format!("svc {}", i),
                "redis://down:6379",
                adapter,
            )
            .unwrap();
        }

        let snapshot = svc.perform_full_check().await;
        assert_eq!(snapshot.services.len(), 3);
        assert_eq!(snapshot.healthy_count, 0);
    }

    #[tokio::test]
    async fn test_uptime_report() {
        let svc = service();
        let adapter = StaticAdapter::healthy(10);
        let id = ServiceId::new("redis-1");
        svc.register_service(
            id.clone(),
            ServiceType::Cache,
            "cache",
            "redis://cache:6379",
            adapter.clone(),
        )
        .unwrap();

        svc.perform_full_check().await;
        adapter.fail_with("refused");
        svc.perform_full_check().await;
        adapter.recover();
        svc.perform_full_check().await;
        svc.perform_full_check().await;

        let report = svc.get_uptime_report(1);
        let uptime = report.services.get(&id).unwrap();
        assert_eq!(uptime.checks_in_window, 4);
        assert_eq!(uptime.healthy_in_window, 3);
        assert_eq!(uptime.uptime_percent, 75.0);
        assert_eq!(uptime.lifetime_checks, 4);
    }

    #[tokio::test]
    async fn test_unregister_removes_counters_from_uptime_report() {
        let svc = service();
        let kept = ServiceId::new("redis-1");
        let removed = ServiceId::new("redis-2");
        for id in [&kept, &removed] {
            svc.register_service(
                id.clone(),
                ServiceType::Cache,
                id.to_string(),
                "redis://cache:6379",
                StaticAdapter::healthy(10),
            )
            .unwrap();
        }

        svc.perform_full_check().await;
        svc.unregister_service(&removed).unwrap();
        svc.perform_full_check().await;

        let report = svc.get_uptime_report(1);
        assert!(report.services.contains_key(&kept));
        assert!(!report.services.contains_key(&removed));
        assert_eq!(svc.registered_count(), 1);
    }

    #[tokio::test]
    async fn test_subscriber_sees_status_change() {
        let svc = service();
        let adapter = StaticAdapter::healthy(10);
        let id = ServiceId::new("redis-1");
        svc.register_service(
            id.clone(),
            ServiceType::Cache,
            "cache",
            "redis://cache:6379",
            adapter.clone(),
        )
        .unwrap();

        let mut rx = svc.subscribe();
        svc.perform_full_check().await;

        // Registered healthy, so the first cycle emits probe + snapshot only.
        let mut saw_snapshot = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, HealthEvent::SnapshotPublished(_)) {
                saw_snapshot = true;
            }
        }
        assert!(saw_snapshot);
    }
}

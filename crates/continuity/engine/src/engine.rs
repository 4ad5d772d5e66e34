//! The engine composition root.
//!
//! Explicitly constructed and dependency-injected; an application holds one
//! (or several, in tests) and drives its lifecycle with `start`/`stop`. The
//! engine owns the bridge tasks that move events between components:
//!
//! - health probe results feed the failover manager
//! - automatic failover and recovery transitions switch the linked
//!   redundancy pool
//! - every component's events are written to the audit log, which alone
//!   holds the hash chain write cursor

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use continuity_audit::{AuditAction, AuditSeverity, AuditStatus, OpsAuditLog};
use continuity_failover::{FailoverManager, FailoverSignal, FailoverState, FailoverStatus};
use continuity_health::{HealthCheckService, HealthEvent, HealthServiceStatus};
use continuity_redundancy::{RedundancyEvent, RedundancyManager, RedundancyStatus};
use continuity_types::{PoolId, ServiceType};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::EngineConfig;

/// Combined status of every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub running: bool,
    pub health: HealthServiceStatus,
    pub failover: FailoverStatus,
    pub redundancy: RedundancyStatus,
    pub audit: AuditStatus,
}

/// The operational continuity engine.
///
/// Owns one instance of each component and the bridge tasks connecting them.
/// Shut down with [`stop`](Self::stop); dropping the engine aborts any
/// remaining bridge tasks.
pub struct ContinuityEngine {
    health: Arc<HealthCheckService>,
    failover: Arc<FailoverManager>,
    redundancy: Arc<RedundancyManager>,
    audit: Arc<OpsAuditLog>,
    actor: String,
    pool_links: DashMap<ServiceType, PoolId>,
    bridge_handles: Mutex<Vec<JoinHandle<()>>>,
    running: AtomicBool,
}

impl ContinuityEngine {
    /// Build an engine with fresh components from configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self::from_parts(
            Arc::new(HealthCheckService::new(config.health)),
            Arc::new(FailoverManager::new(config.failover)),
            Arc::new(RedundancyManager::new(config.redundancy)),
            Arc::new(OpsAuditLog::new(config.audit)),
            config.actor,
        )
    }

    /// Build an engine from caller-constructed components.
    ///
    /// Used when a component needs a non-default collaborator, such as a
    /// replayer on the failover manager or a persistent audit sink.
    pub fn from_parts(
        health: Arc<HealthCheckService>,
        failover: Arc<FailoverManager>,
        redundancy: Arc<RedundancyManager>,
        audit: Arc<OpsAuditLog>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            health,
            failover,
            redundancy,
            audit,
            actor: actor.into(),
            pool_links: DashMap::new(),
            bridge_handles: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
        }
    }

    pub fn health(&self) -> &Arc<HealthCheckService> {
        &self.health
    }

    pub fn failover(&self) -> &Arc<FailoverManager> {
        &self.failover
    }

    pub fn redundancy(&self) -> &Arc<RedundancyManager> {
        &self.redundancy
    }

    pub fn audit(&self) -> &Arc<OpsAuditLog> {
        &self.audit
    }

    /// Route automatic failover and recovery of a service type through a
    /// redundancy pool.
    pub fn link_pool(&self, service_type: ServiceType, pool_id: PoolId) {
        self.pool_links.insert(service_type, pool_id);
    }

    /// Start components and bridge tasks.
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut handles = vec![
            self.spawn_health_bridge(),
            self.spawn_failover_bridge(),
            self.spawn_redundancy_bridge(),
        ];
        self.bridge_handles.lock().append(&mut handles);

        self.health.start();
        self.redundancy.start();

        if let Err(e) = self
            .audit
            .log_entry(
                AuditAction::ConfigChange,
                AuditSeverity::Info,
                "continuity engine started",
                self.actor.clone(),
                HashMap::new(),
            )
            .await
        {
            warn!(error = %e, "Failed to audit engine start");
        }
        info!("Continuity engine started");
    }

    /// Stop components and bridge tasks.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        self.health.stop();
        self.redundancy.stop();
        for handle in self.bridge_handles.lock().drain(..) {
            handle.abort();
        }

        if let Err(e) = self
            .audit
            .log_entry(
                AuditAction::ConfigChange,
                AuditSeverity::Info,
                "continuity engine stopped",
                self.actor.clone(),
                HashMap::new(),
            )
            .await
        {
            warn!(error = %e, "Failed to audit engine stop");
        }
        info!("Continuity engine stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn get_status(&self) -> EngineStatus {
        EngineStatus {
            running: self.is_running(),
            health: self.health.get_status(),
            failover: self.failover.get_status(),
            redundancy: self.redundancy.get_status(),
            audit: self.audit.get_status(),
        }
    }

    /// Health events feed the failover manager and the audit log.
    fn spawn_health_bridge(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        let mut rx = self.health.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(HealthEvent::ProbeCompleted(health)) => {
                        engine.failover.process_health_update(&health).await;
                    }
                    Ok(HealthEvent::StatusChanged {
                        service_id,
                        old_status,
                        new_status,
                    }) => {
                        let metadata = HashMap::from([
                            ("service_id".to_string(), serde_json::json!(service_id.to_string())),
                            ("old_status".to_string(), serde_json::json!(old_status.to_string())),
                            ("new_status".to_string(), serde_json::json!(new_status.to_string())),
                        ]);
                        if let Err(e) = engine
                            .audit
                            .log_diagnostic_event(
                                format!("service {service_id} changed {old_status} -> {new_status}"),
                                engine.actor.clone(),
                                metadata,
                            )
                            .await
                        {
                            warn!(error = %e, "Failed to audit status change");
                        }
                    }
                    Ok(HealthEvent::SnapshotPublished(snapshot)) => {
                        let metadata = HashMap::from([
                            (
                                "snapshot_id".to_string(),
                                serde_json::json!(snapshot.snapshot_id.to_string()),
                            ),
                            (
                                "overall_status".to_string(),
                                serde_json::json!(snapshot.overall_status.to_string()),
                            ),
                            (
                                "service_count".to_string(),
                                serde_json::json!(snapshot.services.len()),
                            ),
                        ]);
                        if let Err(e) = engine
                            .audit
                            .log_health_check(
                                format!(
                                    "health check cycle completed, overall {}",
                                    snapshot.overall_status
                                ),
                                engine.actor.clone(),
                                metadata,
                            )
                            .await
                        {
                            warn!(error = %e, "Failed to audit health check");
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Health bridge lagged behind event stream");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Failover transitions switch the linked pool and are written to audit.
    fn spawn_failover_bridge(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        let mut rx = self.failover.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(FailoverSignal::Transition(event)) => {
                        engine.handle_failover_transition(&event).await;
                    }
                    Ok(FailoverSignal::BufferOverflow {
                        service_type,
                        dropped_total,
                    }) => {
                        let metadata = HashMap::from([
                            (
                                "service_type".to_string(),
                                serde_json::json!(service_type.to_string()),
                            ),
                            ("dropped_total".to_string(), serde_json::json!(dropped_total)),
                        ]);
                        if let Err(e) = engine
                            .audit
                            .log_entry(
                                AuditAction::Diagnostic,
                                AuditSeverity::Warning,
                                format!("operation buffer overflow for {service_type}"),
                                engine.actor.clone(),
                                metadata,
                            )
                            .await
                        {
                            warn!(error = %e, "Failed to audit buffer overflow");
                        }
                    }
                    Ok(FailoverSignal::OperationsReplayed {
                        service_type,
                        replayed,
                    }) => {
                        let metadata = HashMap::from([
                            (
                                "service_type".to_string(),
                                serde_json::json!(service_type.to_string()),
                            ),
                            ("replayed".to_string(), serde_json::json!(replayed)),
                        ]);
                        if let Err(e) = engine
                            .audit
                            .log_diagnostic_event(
                                format!("replayed {replayed} buffered operations for {service_type}"),
                                engine.actor.clone(),
                                metadata,
                            )
                            .await
                        {
                            warn!(error = %e, "Failed to audit operation replay");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Failover bridge lagged behind event stream");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Redundancy sync and escalation events are written to audit.
    fn spawn_redundancy_bridge(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        let mut rx = self.redundancy.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(RedundancyEvent::SyncCompleted(sync)) => {
                        let metadata = HashMap::from([
                            ("pool_id".to_string(), serde_json::json!(sync.pool_id.to_string())),
                            ("records_synced".to_string(), serde_json::json!(sync.records_synced)),
                            ("duration_ms".to_string(), serde_json::json!(sync.duration_ms)),
                            ("success".to_string(), serde_json::json!(sync.success)),
                        ]);
                        let description = if sync.success {
                            format!(
                                "synced {} records for pool {}",
                                sync.records_synced, sync.pool_id
                            )
                        } else {
                            format!(
                                "sync failed for pool {}: {}",
                                sync.pool_id,
                                sync.error_message.as_deref().unwrap_or("unknown")
                            )
                        };
                        if let Err(e) = engine
                            .audit
                            .log_redundancy_sync(description, engine.actor.clone(), metadata)
                            .await
                        {
                            warn!(error = %e, "Failed to audit sync pass");
                        }
                    }
                    Ok(RedundancyEvent::InstanceFailed { pool_id, endpoint }) => {
                        let metadata = HashMap::from([
                            ("pool_id".to_string(), serde_json::json!(pool_id.to_string())),
                            ("endpoint".to_string(), serde_json::json!(endpoint.clone())),
                        ]);
                        if let Err(e) = engine
                            .audit
                            .log_escalation(
                                format!("instance {endpoint} in pool {pool_id} marked failed"),
                                engine.actor.clone(),
                                metadata,
                            )
                            .await
                        {
                            warn!(error = %e, "Failed to audit instance failure");
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Redundancy bridge lagged behind event stream");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    async fn handle_failover_transition(&self, event: &continuity_failover::FailoverEvent) {
        let metadata = HashMap::from([
            (
                "service_type".to_string(),
                serde_json::json!(event.service_type.to_string()),
            ),
            ("from_state".to_string(), serde_json::json!(event.from_state.to_string())),
            ("to_state".to_string(), serde_json::json!(event.to_state.to_string())),
            ("auto_triggered".to_string(), serde_json::json!(event.auto_triggered)),
        ]);

        let audit_result = match (event.to_state, event.auto_triggered) {
            (FailoverState::Failover, true) => {
                self.audit
                    .log_failover(event.trigger_reason.clone(), self.actor.clone(), metadata)
                    .await
            }
            (FailoverState::Normal, true) if event.recovery_time_seconds.is_some() => {
                self.audit
                    .log_recovery(event.trigger_reason.clone(), self.actor.clone(), metadata)
                    .await
            }
            (FailoverState::Emergency, _) => {
                self.audit
                    .log_escalation(
                        format!("emergency for {}: {}", event.service_type, event.trigger_reason),
                        self.actor.clone(),
                        metadata,
                    )
                    .await
            }
            (_, false) => {
                self.audit
                    .log_entry(
                        AuditAction::ManualOverride,
                        AuditSeverity::Warning,
                        event.trigger_reason.clone(),
                        self.actor.clone(),
                        metadata,
                    )
                    .await
            }
            _ => {
                self.audit
                    .log_diagnostic_event(
                        format!(
                            "{} transitioned {} -> {}",
                            event.service_type, event.from_state, event.to_state
                        ),
                        self.actor.clone(),
                        metadata,
                    )
                    .await
            }
        };
        if let Err(e) = audit_result {
            warn!(error = %e, "Failed to audit failover transition");
        }

        // Drive the linked redundancy pool alongside the logical failover.
        let linked = self
            .pool_links
            .get(&event.service_type)
            .map(|p| p.value().clone());
        if let Some(pool_id) = linked {
            let result = match event.to_state {
                FailoverState::Failover => self.redundancy.manual_failover(&pool_id).await,
                FailoverState::Normal if event.from_state == FailoverState::Failover
                    || event.from_state == FailoverState::Emergency =>
                {
                    self.redundancy.manual_failback(&pool_id).await
                }
                _ => Ok(true),
            };
            match result {
                Ok(true) => {}
                Ok(false) => {
                    warn!(pool_id = %pool_id, to_state = %event.to_state, "Linked pool switch rejected");
                }
                Err(e) => {
                    warn!(pool_id = %pool_id, error = %e, "Linked pool switch failed");
                }
            }
        }
    }
}

impl Drop for ContinuityEngine {
    fn drop(&mut self) {
        for handle in self.bridge_handles.lock().drain(..) {
            handle.abort();
        }
    }
}

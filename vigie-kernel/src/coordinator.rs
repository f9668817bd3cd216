/**
 * POLL CYCLE COORDINATOR - Un balayage complet du parc
 *
 * RÔLE :
 * Lit le registre une fois, interroge chaque (serveur, composant) en
 * parallèle borné, classe les valeurs, puis remet TOUT le lot au sink en un
 * seul appel.
 *
 * INVARIANTS :
 * - l'échec d'un composant ne stoppe jamais le cycle (observation Critical "N/A"),
 *   y compris un panic pendant son poll
 * - aucune écriture avant la fin de tous les polls
 * - sink en erreur → lot entier abandonné, rien de partiel
 * - toutes les observations d'un cycle partagent cycle_id et horodatage
 */

use crate::classifier::ClassificationTable;
use crate::models::{Component, HealthStatus, MetricObservation, Target, NO_DATA};
use crate::registry::TargetRegistry;
use crate::sink::MetricSink;
use crate::snmp::{FetchError, SnmpClient};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use time::{OffsetDateTime, UtcOffset};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const DEFAULT_MAX_CONCURRENT_POLLS: usize = 16;

/// Origine du déclenchement d'un cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Timer,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum CycleOutcome {
    Committed,
    NothingToPoll,
    RegistryFailed(String),
    SinkFailed(String),
}

impl CycleOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, CycleOutcome::RegistryFailed(_) | CycleOutcome::SinkFailed(_))
    }
}

/// Résumé d'un cycle : logs et /system/health uniquement, jamais persisté
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleSummary {
    pub cycle_id: Uuid,
    pub trigger: Trigger,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    pub targets_seen: usize,
    pub components_attempted: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub duration_ms: u64,
    pub outcome: CycleOutcome,
}

struct PollResult {
    observation: MetricObservation,
    fetched: bool,
}

impl PollResult {
    fn no_data(cycle_id: Uuid, timestamp: OffsetDateTime, target: &Target, component: &Component) -> Self {
        Self {
            observation: MetricObservation::new(
                cycle_id,
                timestamp,
                target,
                component,
                NO_DATA.to_string(),
                HealthStatus::Critical,
            ),
            fetched: false,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}

pub struct PollCoordinator {
    registry: Arc<dyn TargetRegistry>,
    sink: Arc<dyn MetricSink>,
    client: SnmpClient,
    classifier: Arc<ClassificationTable>,
    max_concurrent_polls: usize,
    report_offset: UtcOffset,
}

impl PollCoordinator {
    pub fn new(
        registry: Arc<dyn TargetRegistry>,
        sink: Arc<dyn MetricSink>,
        client: SnmpClient,
        classifier: Arc<ClassificationTable>,
    ) -> Self {
        Self {
            registry,
            sink,
            client,
            classifier,
            max_concurrent_polls: DEFAULT_MAX_CONCURRENT_POLLS,
            report_offset: UtcOffset::UTC,
        }
    }

    pub fn with_max_concurrent_polls(mut self, max: usize) -> Self {
        self.max_concurrent_polls = max.max(1);
        self
    }

    /// Décalage horaire des horodatages écrits (WIB = +7 dans la config par défaut)
    pub fn with_report_offset(mut self, offset: UtcOffset) -> Self {
        self.report_offset = offset;
        self
    }

    pub fn registry(&self) -> &Arc<dyn TargetRegistry> {
        &self.registry
    }

    async fn poll_component(
        &self,
        cycle_id: Uuid,
        timestamp: OffsetDateTime,
        target: &Target,
        component: &Component,
    ) -> PollResult {
        match self.client.fetch(target, component).await {
            Ok(value) => {
                let status = self
                    .classifier
                    .classify(&target.brand, component.category, Some(&value));
                PollResult {
                    observation: MetricObservation::new(cycle_id, timestamp, target, component, value, status),
                    fetched: true,
                }
            }
            Err(e) => {
                if e.responded() {
                    warn!(server = %target.name, component = %component.name, oid = %component.oid, kind = e.kind(), error = %e, "SNMP error status");
                } else if matches!(e, FetchError::Configuration(_)) {
                    error!(server = %target.name, component = %component.name, error = %e, "SNMP misconfigured");
                } else {
                    warn!(server = %target.name, ip = %target.ip, component = %component.name, kind = e.kind(), error = %e, "SNMP no response");
                }
                PollResult::no_data(cycle_id, timestamp, target, component)
            }
        }
    }

    /// Un panic dans le poll d'un composant devient une observation N/A
    async fn poll_isolated(
        &self,
        cycle_id: Uuid,
        timestamp: OffsetDateTime,
        target: &Target,
        component: &Component,
    ) -> PollResult {
        match AssertUnwindSafe(self.poll_component(cycle_id, timestamp, target, component))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => {
                error!(
                    %cycle_id,
                    server = %target.name,
                    component = %component.name,
                    panic = panic_message(payload.as_ref()),
                    "component poll panicked"
                );
                PollResult::no_data(cycle_id, timestamp, target, component)
            }
        }
    }

    pub async fn run_cycle(&self, trigger: Trigger) -> CycleSummary {
        let cycle_id = Uuid::new_v4();
        let started = Instant::now();
        let started_at = OffsetDateTime::now_utc().to_offset(self.report_offset);
        info!(%cycle_id, ?trigger, "Starting SNMP polling for all servers/components");

        let mut summary = CycleSummary {
            cycle_id,
            trigger,
            started_at,
            targets_seen: 0,
            components_attempted: 0,
            success_count: 0,
            error_count: 0,
            duration_ms: 0,
            outcome: CycleOutcome::NothingToPoll,
        };

        let targets = match self.registry.list_targets().await {
            Ok(targets) => targets,
            Err(e) => {
                error!(%cycle_id, error = %e, "cannot read target registry, cycle aborted");
                summary.outcome = CycleOutcome::RegistryFailed(e.to_string());
                summary.duration_ms = started.elapsed().as_millis() as u64;
                return summary;
            }
        };
        summary.targets_seen = targets.len();

        if targets.is_empty() {
            info!(%cycle_id, "No servers configured for polling");
            summary.duration_ms = started.elapsed().as_millis() as u64;
            return summary;
        }

        for target in targets.iter().filter(|t| t.components.is_empty()) {
            debug!(server = %target.name, "Server has no components configured");
        }

        let targets: Vec<Arc<Target>> = targets.into_iter().map(Arc::new).collect();
        let pairs: Vec<(Arc<Target>, usize)> = targets
            .iter()
            .flat_map(|t| (0..t.components.len()).map(move |i| (Arc::clone(t), i)))
            .collect();
        summary.components_attempted = pairs.len();

        let results: Vec<PollResult> = stream::iter(pairs)
            .map(|(target, index)| async move {
                self.poll_isolated(cycle_id, started_at, &target, &target.components[index])
                    .await
            })
            .buffer_unordered(self.max_concurrent_polls)
            .collect()
            .await;

        summary.success_count = results.iter().filter(|r| r.fetched).count();
        summary.error_count = results.len() - summary.success_count;
        let batch: Vec<MetricObservation> = results.into_iter().map(|r| r.observation).collect();

        if batch.is_empty() {
            summary.duration_ms = started.elapsed().as_millis() as u64;
            info!(%cycle_id, "No components to poll");
            return summary;
        }

        summary.outcome = match self.sink.append_batch(&batch).await {
            Ok(()) => CycleOutcome::Committed,
            Err(e) => {
                error!(%cycle_id, count = batch.len(), error = %e, "Critical error during SNMP polling: batch discarded");
                CycleOutcome::SinkFailed(e.to_string())
            }
        };
        summary.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            %cycle_id,
            success = summary.success_count,
            errors = summary.error_count,
            duration_ms = summary.duration_ms,
            "SNMP polling completed: {} success, {} errors, duration: {:.2}s",
            summary.success_count,
            summary.error_count,
            summary.duration_ms as f64 / 1000.0
        );
        summary
    }
}

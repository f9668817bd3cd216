/*!
Test Harness pour le moteur de polling

Assemble un coordinateur et un scheduler réels sur des stubs :
transport SNMP scripté, registre et sink en mémoire.
*/

use crate::snmp_stub::ScriptedTransport;
use crate::stores::{InMemoryRegistry, MemorySink};
use anyhow::{bail, Result};
use std::sync::Arc;
use std::time::Duration;
use vigie_kernel::classifier::ClassificationTable;
use vigie_kernel::coordinator::{CycleSummary, PollCoordinator, Trigger, DEFAULT_MAX_CONCURRENT_POLLS};
use vigie_kernel::health::HealthTracker;
use vigie_kernel::models::{DbId, HealthStatus, MetricObservation, Target};
use vigie_kernel::scheduler::{Scheduler, TriggerOutcome};
use vigie_kernel::snmp::{SnmpClient, SNMP_TIMEOUT};

pub const DEFAULT_TEST_INTERVAL: Duration = Duration::from_secs(300);

pub struct HarnessOptions {
    pub snmp_timeout: Duration,
    pub interval: Duration,
    pub max_concurrent_polls: usize,
    pub classifier: ClassificationTable,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            snmp_timeout: SNMP_TIMEOUT,
            interval: DEFAULT_TEST_INTERVAL,
            max_concurrent_polls: DEFAULT_MAX_CONCURRENT_POLLS,
            classifier: ClassificationTable::default(),
        }
    }
}

pub struct TestHarness {
    pub transport: ScriptedTransport,
    pub registry: InMemoryRegistry,
    pub sink: MemorySink,
    pub health: HealthTracker,
    pub coordinator: Arc<PollCoordinator>,
    pub scheduler: Scheduler,
}

/// Logs visibles avec RUST_LOG=debug cargo test
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl TestHarness {
    pub fn new(targets: Vec<Target>) -> Self {
        Self::with_options(targets, HarnessOptions::default())
    }

    pub fn with_options(targets: Vec<Target>, options: HarnessOptions) -> Self {
        init_test_tracing();

        let transport = ScriptedTransport::new();
        let registry = InMemoryRegistry::new(targets);
        let sink = MemorySink::new();
        let health = HealthTracker::new();

        let client = SnmpClient::new(Arc::new(transport.clone())).with_timeout(options.snmp_timeout);
        let coordinator = Arc::new(
            PollCoordinator::new(
                Arc::new(registry.clone()),
                Arc::new(sink.clone()),
                client,
                Arc::new(options.classifier),
            )
            .with_max_concurrent_polls(options.max_concurrent_polls),
        );
        let scheduler = Scheduler::new(coordinator.clone(), options.interval, health.clone());

        Self { transport, registry, sink, health, coordinator, scheduler }
    }

    /// Un cycle manuel via le scheduler, attendu jusqu'au bout
    pub async fn run_cycle(&self) -> Result<CycleSummary> {
        match self.scheduler.trigger_now(Trigger::Manual).await {
            TriggerOutcome::Completed(summary) => Ok(summary),
            TriggerOutcome::Skipped => bail!("cycle skipped: another cycle is running"),
            TriggerOutcome::Crashed(e) => bail!("cycle crashed: {e}"),
        }
    }

    pub fn observations(&self) -> Vec<MetricObservation> {
        self.sink.observations()
    }

    pub fn observation(&self, server_id: DbId, component_id: DbId) -> Option<MetricObservation> {
        self.observations()
            .into_iter()
            .rev()
            .find(|o| o.server_id == server_id && o.component_id == component_id)
    }

    /// Vérifie valeur et statut de la dernière observation d'un composant
    pub fn assert_observed(
        &self,
        server_id: DbId,
        component_id: DbId,
        value: &str,
        status: HealthStatus,
    ) -> Result<()> {
        let Some(obs) = self.observation(server_id, component_id) else {
            bail!("no observation for server {server_id} component {component_id}");
        };
        if obs.value != value || obs.status != status {
            bail!(
                "server {server_id} component {component_id}: expected {value:?}/{status}, got {:?}/{}",
                obs.value,
                obs.status
            );
        }
        Ok(())
    }

    /// Toutes les observations d'un lot partagent cycle_id et horodatage
    pub fn assert_batch_consistent(&self, batch: &[MetricObservation]) -> Result<()> {
        let Some(first) = batch.first() else { return Ok(()) };
        for obs in batch {
            if obs.cycle_id != first.cycle_id || obs.timestamp != first.timestamp {
                bail!("observation for component {} belongs to another cycle", obs.component_id);
            }
        }
        Ok(())
    }
}

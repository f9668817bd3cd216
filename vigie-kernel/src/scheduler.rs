/**
 * SCHEDULER - Déclenchement périodique des cycles de polling
 *
 * RÔLE :
 * Idle → Running → Idle, indéfiniment. Un seul cycle à la fois, que le
 * déclenchement vienne du timer ou d'un appel manuel (admin, POST /poll).
 *
 * FONCTIONNEMENT :
 * - timer : intervalle fixe mesuré depuis le début du tick précédent,
 *   premier cycle un intervalle après start()
 * - single-flight : un déclenchement pendant un cycle en cours est ignoré,
 *   jamais mis en file
 * - chaque cycle tourne dans sa propre task : un panic hors des polls
 *   (registre, sink) y reste confiné, il est loggé et compté, la boucle continue
 * - shutdown() arrête le timer, un cycle en vol va jusqu'au bout
 */

use crate::coordinator::{CycleSummary, PollCoordinator, Trigger};
use crate::health::HealthTracker;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub enum TriggerOutcome {
    Completed(CycleSummary),
    /// un cycle tournait déjà
    Skipped,
    /// le cycle a paniqué
    Crashed(String),
}

struct Inner {
    coordinator: Arc<PollCoordinator>,
    interval: Duration,
    running: AtomicBool,
    idle: Notify,
    health: HealthTracker,
    timer: Mutex<Option<JoinHandle<()>>>,
}

/// Libère le flag "cycle en cours" quoi qu'il arrive
struct CycleGuard {
    inner: Arc<Inner>,
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.inner.running.store(false, Ordering::Release);
        self.inner.idle.notify_waiters();
    }
}

#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(coordinator: Arc<PollCoordinator>, interval: Duration, health: HealthTracker) -> Self {
        Self {
            inner: Arc::new(Inner {
                coordinator,
                interval,
                running: AtomicBool::new(false),
                idle: Notify::new(),
                health,
                timer: Mutex::new(None),
            }),
        }
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    pub fn health(&self) -> &HealthTracker {
        &self.inner.health
    }

    /// Un cycle est-il en vol ?
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    pub fn is_started(&self) -> bool {
        self.inner.timer.lock().is_some()
    }

    fn try_acquire(&self) -> Option<CycleGuard> {
        self.inner
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CycleGuard { inner: self.inner.clone() })
    }

    /// Lance un cycle en arrière-plan. `None` si un cycle tourne déjà.
    pub fn spawn_trigger(&self, trigger: Trigger) -> Option<JoinHandle<TriggerOutcome>> {
        let Some(guard) = self.try_acquire() else {
            self.inner.health.record_skipped();
            warn!(?trigger, "polling cycle already running, trigger skipped");
            return None;
        };
        let inner = self.inner.clone();
        Some(tokio::spawn(run_guarded(inner, guard, trigger)))
    }

    /// Lance un cycle et attend sa fin (ou Skipped immédiatement)
    pub async fn trigger_now(&self, trigger: Trigger) -> TriggerOutcome {
        match self.spawn_trigger(trigger) {
            Some(handle) => handle
                .await
                .unwrap_or_else(|e| TriggerOutcome::Crashed(e.to_string())),
            None => TriggerOutcome::Skipped,
        }
    }

    /// Démarre le timer. Retourne false s'il tournait déjà.
    pub fn start(&self) -> bool {
        let mut timer = self.inner.timer.lock();
        if timer.is_some() {
            return false;
        }

        let this = self.clone();
        let period = self.inner.interval;
        *timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                // pas d'attente ici : le tick suivant reste mesuré depuis celui-ci
                let _ = this.spawn_trigger(Trigger::Timer);
            }
        }));
        info!(interval_secs = period.as_secs(), "SNMP polling scheduler started");
        true
    }

    pub fn shutdown(&self) {
        if let Some(handle) = self.inner.timer.lock().take() {
            handle.abort();
            info!("SNMP polling scheduler stopped");
        }
    }

    /// Attend la fin du cycle en vol, s'il y en a un
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            // inscrit avant de relire le flag : pas de réveil perdu
            notified.as_mut().enable();
            if !self.is_running() {
                return;
            }
            notified.await;
        }
    }
}

async fn run_guarded(inner: Arc<Inner>, guard: CycleGuard, trigger: Trigger) -> TriggerOutcome {
    let coordinator = inner.coordinator.clone();
    let result = tokio::spawn(async move { coordinator.run_cycle(trigger).await }).await;

    // compteurs à jour avant de repasser idle
    let outcome = match result {
        Ok(summary) => {
            inner.health.record_cycle(&summary);
            TriggerOutcome::Completed(summary)
        }
        Err(e) => {
            error!(?trigger, error = %e, "polling cycle crashed, scheduler keeps running");
            inner.health.record_crash();
            TriggerOutcome::Crashed(e.to_string())
        }
    };
    drop(guard);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ClassificationTable;
    use crate::coordinator::CycleOutcome;
    use crate::models::{Component, ComponentCategory, MetricObservation, SnmpVersion, Target};
    use crate::registry::{RegistryError, TargetRegistry};
    use crate::sink::{MetricSink, SinkError};
    use crate::snmp::{FetchError, GetRequest, SnmpClient, SnmpTransport};
    use async_trait::async_trait;

    struct OneServer;

    #[async_trait]
    impl TargetRegistry for OneServer {
        async fn list_targets(&self) -> Result<Vec<Target>, RegistryError> {
            Ok(vec![Target {
                id: 1,
                name: "srv-01".into(),
                ip: "10.0.0.1".into(),
                brand: "supermicro".into(),
                snmp_version: SnmpVersion::V2c,
                community: Some("public".into()),
                auth_user: None,
                auth_pass: None,
                priv_pass: None,
                auth_proto: None,
                priv_proto: None,
                components: vec![Component {
                    id: 1,
                    name: "CPU Temp".into(),
                    oid: "1.3.6.1.4.1.10876.2.1.1.1.1.4.1".into(),
                    category: ComponentCategory::Suhu,
                }],
            }])
        }
    }

    struct Discard;

    #[async_trait]
    impl MetricSink for Discard {
        async fn append_batch(&self, _batch: &[MetricObservation]) -> Result<(), SinkError> {
            Ok(())
        }
    }

    struct Slow(Duration);

    #[async_trait]
    impl SnmpTransport for Slow {
        async fn get(&self, _request: &GetRequest) -> Result<String, FetchError> {
            tokio::time::sleep(self.0).await;
            Ok("42".into())
        }
    }

    struct Exploding;

    #[async_trait]
    impl SnmpTransport for Exploding {
        async fn get(&self, _request: &GetRequest) -> Result<String, FetchError> {
            panic!("transport bug");
        }
    }

    struct ExplodingSink;

    #[async_trait]
    impl MetricSink for ExplodingSink {
        async fn append_batch(&self, _batch: &[MetricObservation]) -> Result<(), SinkError> {
            panic!("sink bug");
        }
    }

    fn scheduler(transport: Arc<dyn SnmpTransport>, interval: Duration) -> Scheduler {
        scheduler_with_sink(transport, Arc::new(Discard), interval)
    }

    fn scheduler_with_sink(
        transport: Arc<dyn SnmpTransport>,
        sink: Arc<dyn MetricSink>,
        interval: Duration,
    ) -> Scheduler {
        let coordinator = PollCoordinator::new(
            Arc::new(OneServer),
            sink,
            SnmpClient::new(transport).with_timeout(Duration::from_secs(3600)),
            Arc::new(ClassificationTable::default()),
        );
        Scheduler::new(Arc::new(coordinator), interval, HealthTracker::new())
    }

    #[tokio::test]
    async fn test_concurrent_triggers_are_single_flight() {
        let s = scheduler(Arc::new(Slow(Duration::from_millis(200))), Duration::from_secs(300));
        let (first, second) = tokio::join!(s.trigger_now(Trigger::Timer), s.trigger_now(Trigger::Manual));

        assert!(matches!(first, TriggerOutcome::Completed(_)));
        assert!(matches!(second, TriggerOutcome::Skipped));
        assert_eq!(s.health().cycles_skipped(), 1);
        assert!(!s.is_running());

        // libre à nouveau après la fin du cycle
        assert!(matches!(s.trigger_now(Trigger::Manual).await, TriggerOutcome::Completed(_)));
    }

    #[tokio::test]
    async fn test_spawn_trigger_refuses_while_busy() {
        let s = scheduler(Arc::new(Slow(Duration::from_millis(200))), Duration::from_secs(300));
        let handle = s.spawn_trigger(Trigger::Manual).expect("idle scheduler accepts trigger");
        assert!(s.is_running());
        assert!(s.spawn_trigger(Trigger::Timer).is_none());
        match handle.await.unwrap() {
            TriggerOutcome::Completed(summary) => {
                assert_eq!(summary.outcome, CycleOutcome::Committed);
                assert_eq!(summary.trigger, Trigger::Manual);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_panicking_transport_only_fails_its_component() {
        let s = scheduler(Arc::new(Exploding), Duration::from_secs(300));
        match s.trigger_now(Trigger::Manual).await {
            TriggerOutcome::Completed(summary) => {
                assert_eq!(summary.outcome, CycleOutcome::Committed);
                assert_eq!(summary.error_count, 1);
                assert_eq!(summary.success_count, 0);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(s.health().cycles_crashed(), 0);
        assert_eq!(s.health().cycles_committed(), 1);
    }

    #[tokio::test]
    async fn test_panicking_cycle_does_not_kill_scheduler() {
        let s = scheduler_with_sink(Arc::new(Slow(Duration::ZERO)), Arc::new(ExplodingSink), Duration::from_secs(300));
        assert!(matches!(s.trigger_now(Trigger::Manual).await, TriggerOutcome::Crashed(_)));
        assert_eq!(s.health().cycles_crashed(), 1);
        assert!(!s.is_running(), "guard released after crash");
        assert!(matches!(s.trigger_now(Trigger::Manual).await, TriggerOutcome::Crashed(_)));
        assert_eq!(s.health().cycles_crashed(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_idle_wakes_when_cycle_ends() {
        let s = scheduler(Arc::new(Slow(Duration::from_secs(420))), Duration::from_secs(300));
        // idle : retour immédiat
        s.wait_idle().await;

        let handle = s.spawn_trigger(Trigger::Manual).expect("idle scheduler accepts trigger");
        let started = Instant::now();
        tokio::time::timeout(Duration::from_secs(421), s.wait_idle())
            .await
            .expect("woken at the end of the cycle");
        assert!(started.elapsed() >= Duration::from_secs(420));
        assert!(!s.is_running());
        assert_eq!(s.health().cycles_committed(), 1, "summary recorded before idle");
        assert!(matches!(handle.await.unwrap(), TriggerOutcome::Completed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_every_interval() {
        let s = scheduler(Arc::new(Slow(Duration::ZERO)), Duration::from_secs(300));
        assert!(s.start());
        assert!(!s.start(), "second start is a no-op");

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert_eq!(s.health().cycles_committed(), 0, "first cycle one interval after start");

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(s.health().cycles_committed(), 1);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(s.health().cycles_committed(), 2);

        s.shutdown();
        assert!(!s.is_started());
        tokio::time::sleep(Duration::from_secs(900)).await;
        assert_eq!(s.health().cycles_committed(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrunning_cycle_skips_next_tick() {
        // cycle de 7 min pour un intervalle de 5 min
        let s = scheduler(Arc::new(Slow(Duration::from_secs(420))), Duration::from_secs(300));
        s.start();

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert!(s.is_running());

        // tick de t=600 pendant le cycle : ignoré
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(s.health().cycles_skipped(), 1);
        assert_eq!(s.health().cycles_committed(), 0);

        // fin du cycle à t=720, le tick de t=900 repart normalement
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(s.health().cycles_committed(), 1);
        assert!(s.is_running());
        s.shutdown();
    }
}

use crate::config::MqttConf;
use crate::coordinator::{CycleOutcome, CycleSummary};
use parking_lot::Mutex;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info};

pub const HEALTH_TOPIC: &str = "vigie/kernel/health@v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelHealth {
    pub uptime_seconds: u64,
    pub cycle_running: bool,
    pub cycles_committed: u64,
    pub cycles_failed: u64,
    pub cycles_skipped: u64,
    pub cycles_crashed: u64,
    pub last_cycle: Option<CycleSummary>,
    pub memory_usage_mb: f32,
    pub mqtt_status: String,
}

/// Compteurs d'observabilité du moteur, partagés (Clone = même état)
#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    committed: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
    skipped: Arc<AtomicU64>,
    crashed: Arc<AtomicU64>,
    last_cycle: Arc<Mutex<Option<CycleSummary>>>,
    mqtt_status: Arc<Mutex<String>>,
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            committed: Arc::new(AtomicU64::new(0)),
            failed: Arc::new(AtomicU64::new(0)),
            skipped: Arc::new(AtomicU64::new(0)),
            crashed: Arc::new(AtomicU64::new(0)),
            last_cycle: Arc::new(Mutex::new(None)),
            mqtt_status: Arc::new(Mutex::new("disabled".to_string())),
        }
    }

    pub fn record_cycle(&self, summary: &CycleSummary) {
        match summary.outcome {
            CycleOutcome::Committed | CycleOutcome::NothingToPoll => {
                self.committed.fetch_add(1, Ordering::Relaxed);
            }
            CycleOutcome::RegistryFailed(_) | CycleOutcome::SinkFailed(_) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
        *self.last_cycle.lock() = Some(summary.clone());
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_crash(&self) {
        self.crashed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cycles_committed(&self) -> u64 {
        self.committed.load(Ordering::Relaxed)
    }

    pub fn cycles_failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn cycles_skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn cycles_crashed(&self) -> u64 {
        self.crashed.load(Ordering::Relaxed)
    }

    pub fn last_cycle(&self) -> Option<CycleSummary> {
        self.last_cycle.lock().clone()
    }

    fn set_mqtt_status(&self, status: &str) {
        *self.mqtt_status.lock() = status.to_string();
    }

    pub fn get_health(&self, cycle_running: bool) -> KernelHealth {
        KernelHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            cycle_running,
            cycles_committed: self.cycles_committed(),
            cycles_failed: self.cycles_failed(),
            cycles_skipped: self.cycles_skipped(),
            cycles_crashed: self.cycles_crashed(),
            last_cycle: self.last_cycle(),
            memory_usage_mb: get_memory_usage_mb(),
            mqtt_status: self.mqtt_status.lock().clone(),
        }
    }

    /// Publication périodique du health sur MQTT (30s)
    pub fn spawn_health_publisher<F>(&self, mqtt: MqttConf, cycle_running: F) -> JoinHandle<()>
    where
        F: Fn() -> bool + Send + 'static,
    {
        let health_tracker = self.clone();
        health_tracker.set_mqtt_status("connecting");

        task::spawn(async move {
            let mut opts = MqttOptions::new("vigie-kernel-health", &mqtt.host, mqtt.port);
            opts.set_keep_alive(Duration::from_secs(15));
            let (client, mut eventloop) = AsyncClient::new(opts, 10);

            let mut interval = tokio::time::interval(Duration::from_secs(30));
            info!(host = %mqtt.host, port = mqtt.port, topic = HEALTH_TOPIC, "health publisher started");

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let health = health_tracker.get_health(cycle_running());
                        match serde_json::to_string(&health) {
                            Ok(payload) => {
                                if let Err(e) = client.publish(HEALTH_TOPIC, QoS::AtLeastOnce, false, payload).await {
                                    error!(error = ?e, "failed to publish kernel health");
                                } else {
                                    debug!(uptime = health.uptime_seconds, committed = health.cycles_committed, "published kernel health");
                                }
                            }
                            Err(e) => error!(error = %e, "failed to serialize kernel health"),
                        }
                    },
                    event = eventloop.poll() => {
                        match event {
                            Ok(rumqttc::Event::Incoming(rumqttc::Incoming::ConnAck(_))) => {
                                health_tracker.set_mqtt_status("connected");
                            }
                            Ok(_) => {}
                            Err(e) => {
                                error!(error = ?e, "MQTT error");
                                health_tracker.set_mqtt_status("reconnecting");
                                tokio::time::sleep(Duration::from_secs(2)).await;
                            }
                        }
                    }
                }
            }
        })
    }
}

fn get_memory_usage_mb() -> f32 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            for line in status.lines() {
                if let Some(rest) = line.strip_prefix("VmRSS:") {
                    if let Some(kb) = rest.split_whitespace().next().and_then(|v| v.parse::<u64>().ok()) {
                        return kb as f32 / 1024.0;
                    }
                }
            }
        }
    }
    0.0
}

/**
 * VIGIE KERNEL - Point d'entrée du moteur de polling SNMP
 *
 * RÔLE : bootstrap de tous les composants : config, registre, sink, client
 * SNMP, coordinateur, scheduler, publication health MQTT et API HTTP.
 * Arrêt propre sur Ctrl-C : le timer s'arrête, un cycle en vol se termine.
 */

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vigie_kernel::config::load_config;
use vigie_kernel::coordinator::PollCoordinator;
use vigie_kernel::health::HealthTracker;
use vigie_kernel::http::{build_router, AppState, API_KEY_ENV};
use vigie_kernel::registry::{FileTargetRegistry, TargetRegistry};
use vigie_kernel::scheduler::Scheduler;
use vigie_kernel::sink::JsonlMetricSink;
use vigie_kernel::snmp::transport::Snmp2Transport;
use vigie_kernel::snmp::SnmpClient;

fn init_tracing() {
    // RUST_LOG prioritaire, sinon LOG_LEVEL (défaut info)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into());
        EnvFilter::new(level.to_lowercase())
    });
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cfg = load_config().await.context("failed to load kernel configuration")?;
    let report_offset = cfg.report_offset()?;
    let classifier = Arc::new(cfg.classification_table());

    let registry: Arc<dyn TargetRegistry> = Arc::new(FileTargetRegistry::new(&cfg.storage.targets_file));
    let sink = Arc::new(JsonlMetricSink::new(&cfg.storage.metrics_file));
    let client = SnmpClient::new(Arc::new(Snmp2Transport::new())).with_port(cfg.snmp.port);

    let coordinator = PollCoordinator::new(registry.clone(), sink, client, classifier)
        .with_max_concurrent_polls(cfg.polling.max_concurrent_polls)
        .with_report_offset(report_offset);

    let health_tracker = HealthTracker::new();
    let scheduler = Scheduler::new(Arc::new(coordinator), cfg.poll_interval(), health_tracker.clone());

    if cfg.polling.enabled {
        scheduler.start();
        info!(
            interval_minutes = cfg.polling.interval_minutes,
            targets_file = %cfg.storage.targets_file.display(),
            "SNMP polling enabled"
        );
    } else {
        warn!("scheduler disabled (ENABLE_SCHEDULER=false), cycles run only on POST /poll");
    }

    if let Some(mqtt) = cfg.mqtt.clone() {
        let running_flag = scheduler.clone();
        health_tracker.spawn_health_publisher(mqtt, move || running_flag.is_running());
    }

    let api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
    if api_key.is_none() {
        warn!("{API_KEY_ENV} not set, every route except /health will answer 401");
    }

    let app = build_router(AppState { scheduler: scheduler.clone(), registry, api_key });

    let addr: SocketAddr = cfg
        .http
        .bind
        .parse()
        .with_context(|| format!("invalid http.bind address {}", cfg.http.bind))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("shutdown requested");
        })
        .await
        .context("http server failed")?;

    scheduler.shutdown();
    if scheduler.is_running() {
        info!("waiting for the running polling cycle to finish");
        scheduler.wait_idle().await;
    }
    Ok(())
}

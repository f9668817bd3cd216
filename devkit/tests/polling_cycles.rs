use std::time::Duration;
use vigie_devkit::test_utils::HarnessOptions;
use vigie_devkit::{Reply, TargetBuilder, TestHarness};
use vigie_kernel::coordinator::{CycleOutcome, Trigger};
use vigie_kernel::models::{ComponentCategory, HealthStatus, NO_DATA};
use vigie_kernel::scheduler::TriggerOutcome;
use vigie_kernel::snmp::{AuthAlgorithm, Credentials, FetchError, PrivAlgorithm};

const HPE_TEMP: &str = "1.3.6.1.4.1.232.6.2.6.8.1.4.0.1";
const HPE_FAN: &str = "1.3.6.1.4.1.232.6.2.6.7.1.9.0.1";
const DELL_FAN: &str = "1.3.6.1.4.1.674.10892.5.4.700.12.1.5.1.1";
const DELL_PSU: &str = "1.3.6.1.4.1.674.10892.5.4.600.12.1.5.1.1";

#[tokio::test]
async fn unreachable_server_does_not_affect_the_others() {
    let a = TargetBuilder::v2c(1, "10.0.0.1")
        .component("Fan 1", HPE_FAN, ComponentCategory::Fan)
        .component("Temp", HPE_TEMP, ComponentCategory::Suhu)
        .build();
    let b = TargetBuilder::v2c(2, "10.0.0.2")
        .brand("Dell")
        .component("Fan 1", DELL_FAN, ComponentCategory::Fan)
        .build();
    let h = TestHarness::new(vec![a, b]);
    h.transport.value("10.0.0.1", HPE_FAN, "2");
    h.transport.value("10.0.0.1", HPE_TEMP, "55");
    h.transport.fail("10.0.0.2", DELL_FAN, FetchError::Unreachable("host down".into()));

    let summary = h.run_cycle().await.unwrap();
    assert_eq!(summary.outcome, CycleOutcome::Committed);
    assert_eq!(summary.components_attempted, 3);
    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.error_count, 1);

    h.assert_observed(1, 101, "2", HealthStatus::Ok).unwrap();
    h.assert_observed(1, 102, "55", HealthStatus::Warning).unwrap();
    h.assert_observed(2, 201, NO_DATA, HealthStatus::Critical).unwrap();

    let batches = h.sink.batches();
    assert_eq!(batches.len(), 1, "one append per cycle");
    assert_eq!(batches[0].len(), 3);
    h.assert_batch_consistent(&batches[0]).unwrap();
    assert_eq!(batches[0][0].cycle_id, summary.cycle_id);
}

#[tokio::test]
async fn transport_panic_on_one_server_spares_the_fleet() {
    let targets = (1..=3)
        .map(|i| TargetBuilder::v2c(i, &format!("10.0.0.{i}")).component("Fan 1", HPE_FAN, ComponentCategory::Fan).build())
        .collect();
    let h = TestHarness::new(targets);
    h.transport.reply("10.0.0.1", HPE_FAN, Reply::Panic("truncated varbind".into()));
    h.transport.otherwise(Reply::Value("2".into()));

    let summary = h.run_cycle().await.unwrap();
    assert_eq!(summary.outcome, CycleOutcome::Committed);
    assert_eq!(summary.error_count, 1);
    assert_eq!(summary.success_count, 2);
    assert_eq!(h.health.cycles_crashed(), 0);

    h.assert_observed(1, 101, NO_DATA, HealthStatus::Critical).unwrap();
    h.assert_observed(2, 201, "2", HealthStatus::Ok).unwrap();
    h.assert_observed(3, 301, "2", HealthStatus::Ok).unwrap();
}

#[tokio::test]
async fn silent_server_times_out_without_blocking_the_cycle() {
    let a = TargetBuilder::v2c(1, "10.0.0.1").component("Fan 1", HPE_FAN, ComponentCategory::Fan).build();
    let b = TargetBuilder::v2c(2, "10.0.0.2").component("Fan 1", HPE_FAN, ComponentCategory::Fan).build();
    let h = TestHarness::with_options(
        vec![a, b],
        HarnessOptions { snmp_timeout: Duration::from_millis(100), ..Default::default() },
    );
    h.transport.reply("10.0.0.1", HPE_FAN, Reply::Silent);
    h.transport.value("10.0.0.2", HPE_FAN, "ok");

    let summary = h.run_cycle().await.unwrap();
    assert_eq!(summary.error_count, 1);
    h.assert_observed(1, 101, NO_DATA, HealthStatus::Critical).unwrap();
    h.assert_observed(2, 201, "ok", HealthStatus::Ok).unwrap();
}

#[tokio::test]
async fn missing_credentials_never_reach_the_network() {
    let no_community = TargetBuilder::v2c(1, "10.0.0.1")
        .community(None)
        .component("Fan 1", HPE_FAN, ComponentCategory::Fan)
        .build();
    let v3 = TargetBuilder::v3(2, "10.0.0.2")
        .brand("Dell")
        .auth("monitor", "auth-pass", "MD5")
        .privacy(Some("priv-pass"), "DES")
        .component("PSU 1", DELL_PSU, ComponentCategory::Psu)
        .build();
    let h = TestHarness::new(vec![no_community, v3]);
    h.transport.value("10.0.0.2", DELL_PSU, "Degraded");

    let summary = h.run_cycle().await.unwrap();
    assert_eq!(summary.error_count, 1);
    h.assert_observed(1, 101, NO_DATA, HealthStatus::Critical).unwrap();
    h.assert_observed(2, 201, "Degraded", HealthStatus::Warning).unwrap();

    assert!(h.transport.requests_to("10.0.0.1").is_empty());
    let sent = h.transport.requests_to("10.0.0.2");
    assert_eq!(sent.len(), 1);
    match &sent[0].credentials {
        Credentials::User { username, auth, privacy, .. } => {
            assert_eq!(username, "monitor");
            assert_eq!(*auth, AuthAlgorithm::Md5);
            assert_eq!(privacy.as_ref().map(|p| p.algorithm), Some(PrivAlgorithm::Des));
        }
        other => panic!("expected user credentials, got {other:?}"),
    }
}

#[tokio::test]
async fn dell_fan_statuses() {
    let target = TargetBuilder::v2c(4, "10.0.0.4")
        .brand("Dell")
        .component("Fan 1", "1.3.6.1.4.1.674.1.1", ComponentCategory::Fan)
        .component("Fan 2", "1.3.6.1.4.1.674.1.2", ComponentCategory::Fan)
        .component("Fan 3", "1.3.6.1.4.1.674.1.3", ComponentCategory::Fan)
        .component("Fan 4", "1.3.6.1.4.1.674.1.4", ComponentCategory::Fan)
        .build();
    let h = TestHarness::new(vec![target]);
    h.transport.value("10.0.0.4", "1.3.6.1.4.1.674.1.1", "Good");
    h.transport.value("10.0.0.4", "1.3.6.1.4.1.674.1.2", "Degraded");
    h.transport.value("10.0.0.4", "1.3.6.1.4.1.674.1.3", "Failed");
    h.transport.value("10.0.0.4", "1.3.6.1.4.1.674.1.4", "");

    h.run_cycle().await.unwrap();
    h.assert_observed(4, 401, "Good", HealthStatus::Ok).unwrap();
    h.assert_observed(4, 402, "Degraded", HealthStatus::Warning).unwrap();
    h.assert_observed(4, 403, "Failed", HealthStatus::Critical).unwrap();
    h.assert_observed(4, 404, "", HealthStatus::Unknown).unwrap();
}

#[tokio::test]
async fn sink_failure_persists_nothing_and_next_cycle_recovers() {
    let target = TargetBuilder::v2c(1, "10.0.0.1")
        .component("Fan 1", HPE_FAN, ComponentCategory::Fan)
        .component("Temp", HPE_TEMP, ComponentCategory::Suhu)
        .build();
    let h = TestHarness::new(vec![target]);
    h.transport.otherwise(Reply::Value("1".into()));

    h.sink.set_failing(true);
    let failed = h.run_cycle().await.unwrap();
    assert!(matches!(failed.outcome, CycleOutcome::SinkFailed(_)));
    assert!(h.observations().is_empty());
    assert_eq!(h.health.cycles_failed(), 1);

    h.sink.set_failing(false);
    let ok = h.run_cycle().await.unwrap();
    assert_eq!(ok.outcome, CycleOutcome::Committed);
    assert_eq!(h.observations().len(), 2);
    assert_ne!(failed.cycle_id, ok.cycle_id);
}

#[tokio::test]
async fn registry_outage_skips_the_cycle_without_polling() {
    let target = TargetBuilder::v2c(1, "10.0.0.1").component("Fan 1", HPE_FAN, ComponentCategory::Fan).build();
    let h = TestHarness::new(vec![target]);
    h.registry.set_failing(true);

    let summary = h.run_cycle().await.unwrap();
    assert!(matches!(summary.outcome, CycleOutcome::RegistryFailed(_)));
    assert_eq!(h.transport.request_count(), 0);
    assert_eq!(h.sink.attempts(), 0);
}

#[tokio::test]
async fn empty_fleet_polls_nothing_and_writes_nothing() {
    let h = TestHarness::new(vec![]);
    let summary = h.run_cycle().await.unwrap();
    assert_eq!(summary.outcome, CycleOutcome::NothingToPoll);
    assert_eq!(h.sink.attempts(), 0);

    // serveur ajouté entre deux cycles : pris en compte sans redémarrage
    h.registry.push(TargetBuilder::v2c(9, "10.0.0.9").component("Fan 1", HPE_FAN, ComponentCategory::Fan).build());
    h.transport.otherwise(Reply::Value("2".into()));
    let summary = h.run_cycle().await.unwrap();
    assert_eq!(summary.outcome, CycleOutcome::Committed);
    assert_eq!(h.registry.reads(), 2);
}

#[tokio::test]
async fn concurrency_is_bounded() {
    let targets = (1..=12)
        .map(|i| {
            TargetBuilder::v2c(i, &format!("10.0.1.{i}"))
                .component("Fan 1", HPE_FAN, ComponentCategory::Fan)
                .component("Temp", HPE_TEMP, ComponentCategory::Suhu)
                .build()
        })
        .collect();
    let h = TestHarness::with_options(targets, HarnessOptions { max_concurrent_polls: 4, ..Default::default() });
    h.transport.otherwise(Reply::Delayed("1".into(), Duration::from_millis(20)));

    let summary = h.run_cycle().await.unwrap();
    assert_eq!(summary.success_count, 24);
    assert!(h.transport.peak_in_flight() <= 4);
    assert!(h.transport.peak_in_flight() >= 2, "polls run in parallel");
}

#[tokio::test]
async fn manual_trigger_during_timer_cycle_is_skipped() {
    let target = TargetBuilder::v2c(1, "10.0.0.1").component("Fan 1", HPE_FAN, ComponentCategory::Fan).build();
    let h = TestHarness::new(vec![target]);
    h.transport.otherwise(Reply::Delayed("2".into(), Duration::from_millis(300)));

    let running = h.scheduler.spawn_trigger(Trigger::Timer).expect("idle scheduler");
    assert!(matches!(h.scheduler.trigger_now(Trigger::Manual).await, TriggerOutcome::Skipped));
    assert!(h.scheduler.spawn_trigger(Trigger::Manual).is_none());

    match running.await.unwrap() {
        TriggerOutcome::Completed(summary) => assert_eq!(summary.trigger, Trigger::Timer),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(h.health.cycles_skipped(), 2);
    assert_eq!(h.sink.batches().len(), 1);
    assert_eq!(h.transport.request_count(), 1, "skipped triggers never poll");
}

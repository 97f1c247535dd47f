use aquasense::{
    AquaError, Broker, BrokerConfig, BrokerState, Consumer, DefaultReason, LatestStatus, Parameter,
    PhysicalRange, ValueSource,
};
use aquasense_mock::MockFeed;
use aquasense_mock::fixtures::{faulted_firmware_record, firmware_record, sparse_pair};

use crate::helpers::{Recorder, at, broker, broker_with, now, settle, wait_until};

#[tokio::test]
async fn sparse_readings_resolve_per_parameter() {
    let (broker, controller) = broker();
    let rec = Recorder::new();
    let _sub = broker.subscribe(rec.consumer()).unwrap();
    wait_until("feed opened", || controller.open_count() == 1).await;

    controller.push_snapshot(sparse_pair(at(10, 0))).await;
    wait_until("update", || rec.updates().len() == 1).await;
    let w = &rec.updates()[0];

    let observed: Vec<_> = w.history.iter().map(|r| r.observed_at).collect();
    assert_eq!(observed, vec![at(10, 1), at(10, 0)]);
    assert_eq!(w.latest.ph.value, 6.8);
    assert_eq!(w.latest.ph.observed_at, at(10, 1));
    assert_eq!(w.latest.temperature.value, 22.0);
    assert_eq!(w.latest.temperature.observed_at, at(10, 0));
    assert_eq!(w.latest.tds.status, LatestStatus::Defaulted);
    assert_eq!(w.latest.tds.value, 250.0);
    assert_eq!(w.latest.tds.observed_at, now());
}

#[tokio::test]
async fn empty_snapshot_while_connecting_broadcasts_nothing() {
    let (broker, controller) = broker();
    let rec = Recorder::new();
    let _sub = broker.subscribe(rec.consumer()).unwrap();
    wait_until("feed opened", || controller.open_count() == 1).await;
    settle().await;

    assert_eq!(broker.state(), BrokerState::Connecting);
    assert!(rec.seen().is_empty());
    assert!(broker.last_window().is_none());
    assert_eq!(broker.telemetry().snapshots_reconciled, 1);
}

#[tokio::test]
async fn firmware_uploads_resolve_through_compact_keys() {
    let (broker, controller) = broker();
    let rec = Recorder::new();
    let _sub = broker.subscribe(rec.consumer()).unwrap();
    wait_until("feed opened", || controller.open_count() == 1).await;

    controller
        .insert("/r", firmware_record(60, at(9, 0), 24.3, 7.1, 2.5, 251.0, 502.0))
        .await;
    wait_until("update", || rec.updates().len() == 1).await;
    let w = &rec.updates()[0];
    let latest = &w.latest;
    assert_eq!(latest.temperature.value, 24.3);
    assert_eq!(latest.ph.value, 7.1);
    assert_eq!(latest.turbidity.value, 2.5);
    assert_eq!(latest.tds.value, 251.0);
    assert_eq!(latest.conductivity.value, 502.0);
    assert!(latest.iter().all(|(_, v)| v.observed_at == at(9, 0)));
    assert_eq!(w.history[0].sequence_id, 60);
}

#[tokio::test]
async fn sensor_faults_and_ranges_fall_back_when_enabled() {
    let (broker, controller) = broker_with(|b| {
        b.reject_sensor_faults(true)
            .physical_range(Parameter::Ph, PhysicalRange::new(0.0, 14.0))
    });
    let rec = Recorder::new();
    let _sub = broker.subscribe(rec.consumer()).unwrap();
    wait_until("feed opened", || controller.open_count() == 1).await;

    controller
        .insert("/r", firmware_record(60, at(9, 0), 24.0, 7.0, 2.0, 250.0, 500.0))
        .await;
    controller.insert("/r", faulted_firmware_record(120, at(9, 1))).await;
    controller
        .insert("/r", firmware_record(180, at(9, 2), 24.5, 15.2, 2.0, 250.0, 500.0))
        .await;
    wait_until("three updates", || rec.updates().len() == 3).await;

    let w = rec.updates().pop().unwrap();
    // newest reading has an impossible pH; the one before it is all sentinels
    assert_eq!(
        w.history[0].ph.source,
        ValueSource::Defaulted(DefaultReason::OutOfRange)
    );
    assert_eq!(
        w.history[1].temperature.source,
        ValueSource::Defaulted(DefaultReason::SensorFault)
    );
    assert_eq!(w.latest.ph.value, 7.0);
    assert_eq!(w.latest.ph.observed_at, at(9, 0));
    assert_eq!(w.latest.temperature.value, 24.5);

    let t = broker.telemetry();
    assert!(t.substitutions[&Parameter::Temperature] >= 1);
    assert!(t.substitutions[&Parameter::Ph] >= 2);
}

#[test]
fn builder_and_consumer_contract_violations() {
    let err = Broker::builder().build().unwrap_err();
    assert!(matches!(err, AquaError::InvalidArg(_)));

    let (feed, _controller) = MockFeed::new_with_controller("mock");
    let err = Broker::builder()
        .feed(feed.clone())
        .window_size(0)
        .build()
        .unwrap_err();
    assert!(matches!(err, AquaError::InvalidArg(_)));

    let err = Consumer::builder().on_error(|_| {}).build().unwrap_err();
    assert!(matches!(err, AquaError::InvalidArg(_)));

    let cfg: BrokerConfig = serde_json::from_str(r#"{"window_size": 5}"#).unwrap();
    let broker = Broker::builder().feed(feed).config(cfg).build().unwrap();
    assert_eq!(broker.config().window_size, 5);
    assert_eq!(broker.feed_name(), "mock");
    assert_eq!(broker.state(), BrokerState::Idle);
}

#[test]
fn subscribe_outside_runtime_is_rejected() {
    let (broker, controller) = broker();
    let err = broker.subscribe(Recorder::new().consumer()).unwrap_err();
    assert!(matches!(err, AquaError::InvalidArg(_)));
    assert_eq!(broker.consumer_count(), 0);
    assert_eq!(broker.state(), BrokerState::Idle);
    assert_eq!(controller.open_count(), 0);
}

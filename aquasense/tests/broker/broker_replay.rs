use std::sync::Arc;

use aquasense::BrokerState;
use aquasense_mock::fixtures::firmware_series;

use crate::helpers::{Recorder, Seen, at, broker_with, settle, wait_until};

#[tokio::test]
async fn late_consumer_gets_last_window_and_connectivity_on_join() {
    let (broker, controller) = broker_with(|b| b.replay_on_join(true));
    let early = Recorder::new();
    let _early = broker.subscribe(early.consumer()).unwrap();
    wait_until("feed opened", || controller.open_count() == 1).await;
    controller.insert("/r", firmware_series(at(10, 0), 1).remove(0)).await;
    wait_until("live", || broker.state() == BrokerState::Live).await;

    let late = Recorder::new();
    let _late = broker.subscribe(late.consumer()).unwrap();
    let seen = late.seen();
    assert_eq!(seen.len(), 2, "replay happens before subscribe returns");
    let Seen::Update(w) = &seen[0] else { panic!("expected update first") };
    assert!(Arc::ptr_eq(w, &early.updates()[0]));
    assert!(matches!(seen[1], Seen::Connectivity(true)));

    // the replayed window is not delivered a second time
    settle().await;
    assert_eq!(late.updates().len(), 1);
    assert_eq!(controller.open_count(), 1);
}

#[tokio::test]
async fn replay_is_off_by_default_and_overridable_per_consumer() {
    let (broker, controller) = broker_with(|b| b);
    let early = Recorder::new();
    let _early = broker.subscribe(early.consumer()).unwrap();
    wait_until("feed opened", || controller.open_count() == 1).await;
    controller.insert("/r", firmware_series(at(10, 0), 1).remove(0)).await;
    wait_until("live", || broker.state() == BrokerState::Live).await;

    let plain = Recorder::new();
    let _plain = broker.subscribe(plain.consumer()).unwrap();
    assert!(plain.seen().is_empty());

    let eager = Recorder::new();
    let _eager = broker
        .subscribe(eager.builder().replay_on_join(Some(true)).build().unwrap())
        .unwrap();
    assert_eq!(eager.updates().len(), 1);

    // next change reaches everyone once
    controller.insert("/r", firmware_series(at(10, 1), 1).remove(0)).await;
    wait_until("plain updated", || plain.updates().len() == 1).await;
    wait_until("eager updated", || eager.updates().len() == 2).await;
}

#[tokio::test]
async fn replay_while_degraded_reports_disconnected() {
    let (broker, controller) = broker_with(|b| b.replay_on_join(true));
    let early = Recorder::new();
    let _early = broker.subscribe(early.consumer()).unwrap();
    wait_until("feed opened", || controller.open_count() == 1).await;
    controller.insert("/r", firmware_series(at(10, 0), 1).remove(0)).await;
    wait_until("live", || broker.state() == BrokerState::Live).await;
    controller
        .push_error(aquasense::AquaError::feed("mock", "flaky"))
        .await;
    wait_until("degraded", || broker.state() == BrokerState::Degraded).await;

    let late = Recorder::new();
    let _late = broker.subscribe(late.consumer()).unwrap();
    assert_eq!(late.updates().len(), 1);
    assert_eq!(late.connectivity(), vec![false]);
}

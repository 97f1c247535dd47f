use aquasense::{AquaError, BrokerState};
use aquasense_mock::fixtures::firmware_series;

use crate::helpers::{Recorder, at, broker, settle, wait_until};

#[tokio::test]
async fn close_drops_consumers_and_releases_feed() {
    let (broker, controller) = broker();
    let rec = Recorder::new();
    let sub = broker.subscribe(rec.consumer()).unwrap();
    wait_until("feed opened", || controller.open_count() == 1).await;
    controller.insert("/r", firmware_series(at(10, 0), 1).remove(0)).await;
    wait_until("live", || broker.state() == BrokerState::Live).await;

    broker.close();
    broker.close();
    assert_eq!(broker.state(), BrokerState::Closed);
    assert!(!sub.is_active());
    assert_eq!(broker.consumer_count(), 0);
    assert!(broker.last_window().is_none());
    wait_until("session ended", || controller.active_sessions() == 0).await;

    let err = broker.subscribe(Recorder::new().consumer()).unwrap_err();
    assert_eq!(err, AquaError::BrokerClosed);
    assert!(!err.is_recoverable());
    assert_eq!(broker.reconnect(), Err(AquaError::BrokerClosed));

    // nothing more is delivered and dropping the stale subscription is harmless
    assert!(!controller.insert("/r", firmware_series(at(10, 1), 1).remove(0)).await);
    drop(sub);
    settle().await;
    assert_eq!(rec.updates().len(), 1);
    assert_eq!(controller.open_count(), 1);
}

#[tokio::test]
async fn dropping_every_broker_handle_ends_the_session() {
    let (broker, controller) = broker();
    let sub = broker.subscribe(Recorder::new().consumer()).unwrap();
    wait_until("feed opened", || controller.open_count() == 1).await;

    drop(broker);
    wait_until("session ended", || controller.active_sessions() == 0).await;
    // the broker is gone; unsubscribing is a no-op
    sub.unsubscribe();
}

use std::sync::{Arc, Mutex, OnceLock};

use aquasense::{BrokerState, Consumer, Unsubscribe};
use aquasense_mock::fixtures::firmware_series;

use crate::helpers::{Recorder, at, broker, settle, wait_until};

#[tokio::test]
async fn unsubscribe_is_idempotent_and_releases_once() {
    let (broker, controller) = broker();
    let a = Recorder::new();
    let b = Recorder::new();
    let sub_a = broker.subscribe(a.consumer()).unwrap();
    let sub_b = broker.subscribe(b.consumer()).unwrap();
    wait_until("feed opened", || controller.open_count() == 1).await;

    sub_a.unsubscribe();
    sub_a.unsubscribe();
    sub_a.unsubscriber().unsubscribe();
    assert!(!sub_a.is_active());
    assert_eq!(broker.consumer_count(), 1);
    assert_eq!(controller.active_sessions(), 1);
    drop(sub_a);
    assert_eq!(broker.consumer_count(), 1);

    sub_b.unsubscribe();
    assert_eq!(broker.state(), BrokerState::Idle);
    drop(sub_b);
    wait_until("session ended", || controller.active_sessions() == 0).await;
    settle().await;
    assert_eq!(controller.ended_count(), 1);
    assert_eq!(broker.consumer_count(), 0);
}

#[tokio::test]
async fn resubscribe_after_last_leave_reopens_the_feed() {
    let (broker, controller) = broker();
    let first = Recorder::new();
    let sub = broker.subscribe(first.consumer()).unwrap();
    wait_until("feed opened", || controller.open_count() == 1).await;
    controller.insert("/r", firmware_series(at(10, 0), 1).remove(0)).await;
    wait_until("live", || broker.state() == BrokerState::Live).await;
    drop(sub);
    assert_eq!(broker.state(), BrokerState::Idle);
    assert!(broker.last_window().is_none());

    let second = Recorder::new();
    let _sub = broker.subscribe(second.consumer()).unwrap();
    assert_eq!(broker.state(), BrokerState::Connecting);
    wait_until("reopened", || controller.open_count() == 2).await;
    wait_until("live", || broker.state() == BrokerState::Live).await;
    assert_eq!(second.connectivity(), vec![true]);
    assert_eq!(first.updates().len(), 1);
}

#[tokio::test]
async fn consumer_can_unsubscribe_itself_from_its_callback() {
    let (broker, controller) = broker();
    let handle: Arc<OnceLock<Unsubscribe>> = Arc::new(OnceLock::new());
    let calls = Arc::new(Mutex::new(0));

    let (h, c) = (Arc::clone(&handle), Arc::clone(&calls));
    let sub = broker
        .subscribe(Consumer::on_update(move |_| {
            *c.lock().unwrap() += 1;
            if let Some(u) = h.get() {
                u.unsubscribe();
            }
        }))
        .unwrap();
    let _ = handle.set(sub.unsubscriber());
    let other = Recorder::new();
    let _other = broker.subscribe(other.consumer()).unwrap();

    wait_until("feed opened", || controller.open_count() == 1).await;
    for rec in firmware_series(at(10, 0), 3) {
        controller.insert("/r", rec).await;
    }
    wait_until("other saw all", || other.updates().len() == 3).await;

    assert_eq!(*calls.lock().unwrap(), 1);
    assert!(!sub.is_active());
    assert_eq!(broker.consumer_count(), 1);
}

#[tokio::test]
async fn unsubscribing_a_later_consumer_mid_broadcast_skips_it() {
    let (broker, controller) = broker();
    let victim_handle: Arc<OnceLock<Unsubscribe>> = Arc::new(OnceLock::new());

    let h = Arc::clone(&victim_handle);
    let _killer = broker
        .subscribe(Consumer::on_update(move |_| {
            if let Some(u) = h.get() {
                u.unsubscribe();
            }
        }))
        .unwrap();
    let victim = Recorder::new();
    let victim_sub = broker.subscribe(victim.consumer()).unwrap();
    let _ = victim_handle.set(victim_sub.unsubscriber());

    wait_until("feed opened", || controller.open_count() == 1).await;
    controller.insert("/r", firmware_series(at(10, 0), 1).remove(0)).await;
    wait_until("live", || broker.state() == BrokerState::Live).await;
    settle().await;

    assert!(victim.seen().is_empty());
    assert!(!victim_sub.is_active());
    assert_eq!(broker.consumer_count(), 1);
}

use std::sync::Arc;

use aquasense::BrokerState;
use aquasense_mock::fixtures::firmware_series;

use crate::helpers::{Recorder, at, broker_with, wait_until};

#[tokio::test]
async fn three_consumers_share_one_feed_subscription() {
    let (broker, controller) = broker_with(|b| b.window_size(20));
    let recorders: Vec<Recorder> = (0..3).map(|_| Recorder::new()).collect();
    let _subs: Vec<_> = recorders
        .iter()
        .map(|r| broker.subscribe(r.consumer()).expect("subscribe"))
        .collect();
    assert_eq!(broker.consumer_count(), 3);

    wait_until("feed opened", || controller.open_count() == 1).await;
    for rec in firmware_series(at(10, 0), 3) {
        assert!(controller.insert("/r", rec).await);
    }
    wait_until("three updates each", || {
        recorders.iter().all(|r| r.updates().len() == 3)
    })
    .await;

    assert_eq!(controller.open_count(), 1);
    assert_eq!(controller.window_requests().await, vec![20]);
    assert_eq!(broker.state(), BrokerState::Live);

    // every consumer holds the very same reconciled window
    let first = recorders[0].updates();
    for r in &recorders[1..] {
        for (a, b) in first.iter().zip(r.updates()) {
            assert!(Arc::ptr_eq(a, &b));
        }
    }
    let last = broker.last_window().expect("window");
    assert!(Arc::ptr_eq(&last, first.last().unwrap()));

    let t = broker.telemetry();
    assert_eq!(t.feed_opens, 1);
    assert_eq!(t.snapshots_reconciled, 4); // initial empty snapshot + three inserts
}

#[tokio::test]
async fn consumers_are_called_in_registration_order() {
    let (broker, controller) = broker_with(|b| b);
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));
    let _subs: Vec<_> = (0..4)
        .map(|i| {
            let order = Arc::clone(&order);
            broker
                .subscribe(aquasense::Consumer::on_update(move |_| order.lock().unwrap().push(i)))
                .unwrap()
        })
        .collect();

    wait_until("feed opened", || controller.open_count() == 1).await;
    for rec in firmware_series(at(10, 0), 2) {
        controller.insert("/r", rec).await;
    }
    wait_until("two broadcasts", || order.lock().unwrap().len() == 8).await;
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 0, 1, 2, 3]);
}

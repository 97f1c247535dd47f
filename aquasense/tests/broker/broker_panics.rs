use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use aquasense::{BrokerState, Consumer};
use aquasense_mock::fixtures::firmware_series;

use crate::helpers::{Recorder, at, broker, wait_until};

#[tokio::test]
async fn panicking_consumer_does_not_starve_later_ones() {
    let (broker, controller) = broker();
    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let _bad = broker
        .subscribe(
            Consumer::builder()
                .name("panicky")
                .on_update(move |_| {
                    c.fetch_add(1, Ordering::SeqCst);
                    panic!("consumer bug");
                })
                .on_connectivity(|_| panic!("connectivity bug"))
                .build()
                .unwrap(),
        )
        .unwrap();
    let good = Recorder::new();
    let _good = broker.subscribe(good.consumer()).unwrap();

    wait_until("feed opened", || controller.open_count() == 1).await;
    for rec in firmware_series(at(10, 0), 2) {
        controller.insert("/r", rec).await;
    }
    wait_until("good consumer saw both", || good.updates().len() == 2).await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(good.connectivity(), vec![true]);
    assert_eq!(broker.state(), BrokerState::Live);
    // two update panics plus one connectivity panic
    assert_eq!(broker.telemetry().consumer_panics, 3);
    assert_eq!(broker.consumer_count(), 2);
}

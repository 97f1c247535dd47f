use std::time::Duration;

use aquasense::AquaError;
use aquasense_mock::fixtures::firmware_series;
use proptest::prelude::*;

use crate::helpers::{Recorder, at, broker, wait_until};

#[derive(Debug, Clone)]
enum Op {
    Subscribe,
    Unsubscribe(usize),
    Insert,
    PushError,
    EndFeed,
    Reconnect,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Subscribe),
        2 => (0usize..8).prop_map(Op::Unsubscribe),
        3 => Just(Op::Insert),
        1 => Just(Op::PushError),
        1 => Just(Op::EndFeed),
        1 => Just(Op::Reconnect),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 16, .. ProptestConfig::default() })]
    #[test]
    fn random_lifecycles_never_leak_sessions(ops in proptest::collection::vec(arb_op(), 1..14)) {
        tokio_test::block_on(async move {
            let (broker, controller) = broker();
            let mut subs = Vec::new();
            let mut recorders = Vec::new();
            let mut minute = 0u32;

            for op in ops {
                match op {
                    Op::Subscribe => {
                        let rec = Recorder::new();
                        subs.push(broker.subscribe(rec.consumer()).expect("subscribe"));
                        recorders.push(rec);
                    }
                    Op::Unsubscribe(i) => {
                        if !subs.is_empty() {
                            let idx = i % subs.len();
                            subs.remove(idx).unsubscribe();
                        }
                    }
                    Op::Insert => {
                        minute += 1;
                        let rec = firmware_series(at(10, minute % 60), 1).remove(0);
                        controller.insert("/r", rec).await;
                    }
                    Op::PushError => {
                        controller.push_error(AquaError::feed("mock", "flap")).await;
                    }
                    Op::EndFeed => controller.end_feed().await,
                    Op::Reconnect => broker.reconnect().expect("reconnect"),
                }
                tokio::time::sleep(Duration::from_millis(2)).await;

                assert_eq!(broker.consumer_count(), subs.len());
                assert_eq!(broker.state() == aquasense::BrokerState::Idle, subs.is_empty());
                assert!(controller.active_sessions() <= 2, "at most one live session plus one winding down");
            }

            // connectivity transitions never repeat for any consumer
            for rec in &recorders {
                let conn = rec.connectivity();
                assert!(conn.windows(2).all(|w| w[0] != w[1]), "repeated connectivity: {conn:?}");
            }

            drop(subs);
            wait_until("all sessions ended", || controller.active_sessions() == 0).await;
            assert_eq!(controller.open_count(), controller.ended_count());
        });
    }
}

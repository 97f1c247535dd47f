// Shared fixtures for broker tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use aquasense::{AquaError, Broker, Consumer, FixedClock, ReconciledWindow};
use aquasense_mock::{MockFeed, MockFeedController};
use chrono::{DateTime, TimeZone, Utc};

/// Construct a UTC `DateTime` on the fixture day.
pub fn at(hh: u32, mm: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 1, hh, mm, 0).unwrap()
}

/// Processing time used by every test broker.
pub fn now() -> DateTime<Utc> {
    at(12, 0)
}

/// A broker over a fresh mock feed with a fixed clock.
pub fn broker_with(configure: impl FnOnce(aquasense::BrokerBuilder) -> aquasense::BrokerBuilder) -> (Broker, MockFeedController) {
    let (feed, controller) = MockFeed::new_with_controller("mock");
    let builder = Broker::builder()
        .feed(feed)
        .clock(Arc::new(FixedClock(now())));
    let broker = configure(builder).build().expect("broker builds");
    (broker, controller)
}

pub fn broker() -> (Broker, MockFeedController) {
    broker_with(|b| b)
}

/// Everything a consumer observed, in order.
#[derive(Debug, Clone)]
pub enum Seen {
    Update(Arc<ReconciledWindow>),
    Error(AquaError),
    Connectivity(bool),
}

#[derive(Clone, Default)]
pub struct Recorder {
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn consumer(&self) -> Consumer {
        self.builder().build().unwrap()
    }

    pub fn builder(&self) -> aquasense::ConsumerBuilder {
        let (u, e, c) = (self.clone(), self.clone(), self.clone());
        Consumer::builder()
            .on_update(move |w| u.push(Seen::Update(w)))
            .on_error(move |err| e.push(Seen::Error(err.clone())))
            .on_connectivity(move |up| c.push(Seen::Connectivity(up)))
    }

    pub fn push(&self, s: Seen) {
        self.seen.lock().unwrap().push(s);
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<Arc<ReconciledWindow>> {
        self.seen()
            .into_iter()
            .filter_map(|s| match s {
                Seen::Update(w) => Some(w),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<AquaError> {
        self.seen()
            .into_iter()
            .filter_map(|s| match s {
                Seen::Error(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    pub fn connectivity(&self) -> Vec<bool> {
        self.seen()
            .into_iter()
            .filter_map(|s| match s {
                Seen::Connectivity(up) => Some(up),
                _ => None,
            })
            .collect()
    }
}

/// Poll `cond` until it holds, yielding to the feed task in between.
pub async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let start = std::time::Instant::now();
    while !cond() {
        if start.elapsed() > Duration::from_secs(2) {
            panic!("timed out waiting for: {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Give the feed task a chance to run without expecting any change.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}

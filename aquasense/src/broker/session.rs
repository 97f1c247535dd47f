use std::sync::{Arc, Weak};

use aquasense_core::{AquaError, FeedEvent, SnapshotFeed, StreamHandle};
use tokio::sync::oneshot;

use super::machine::Event;
use crate::core::BrokerInner;

/// Feed session for one broker generation.
///
/// Opens the feed, then reconciles and dispatches each event in arrival
/// order. The task holds only a weak reference to the broker so that a
/// dropped broker tears the session down with it.
pub struct SessionManager;

impl SessionManager {
    pub fn spawn(
        broker: Weak<BrokerInner>,
        feed: Arc<dyn SnapshotFeed>,
        generation: u64,
        window_size: usize,
    ) -> StreamHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let join = tokio::spawn(async move {
            let opened = tokio::select! {
                biased;
                _ = &mut stop_rx => return,
                res = feed.open_snapshot_subscription(window_size) => res,
            };

            let (handle, mut rx) = match opened {
                Ok(pair) => pair,
                Err(error) => {
                    dispatch(&broker, |b| {
                        b.telemetry.record_feed_error();
                        Event::FeedOpenFailed { generation, error }
                    });
                    return;
                }
            };
            dispatch(&broker, |b| {
                b.telemetry.record_feed_open();
                Event::FeedOpened { generation }
            });

            let mut feed_handle = Some(handle);
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => {
                        if let Some(h) = feed_handle.take() { h.stop().await; }
                        break;
                    }
                    maybe_ev = rx.recv() => {
                        let Some(ev) = maybe_ev else {
                            let error = AquaError::feed_closed(feed.name());
                            dispatch(&broker, |b| {
                                b.telemetry.record_feed_error();
                                Event::FeedEnded { generation, error }
                            });
                            break;
                        };
                        let alive = match ev {
                            FeedEvent::Snapshot(records) => dispatch(&broker, |b| {
                                let window = Arc::new(b.reconciler.reconcile(&records));
                                b.telemetry.record_window(&window);
                                Event::Snapshot { generation, window }
                            }),
                            FeedEvent::Error(error) => dispatch(&broker, |b| {
                                b.telemetry.record_feed_error();
                                Event::FeedError { generation, error }
                            }),
                        };
                        if !alive {
                            break;
                        }
                    }
                }
            }
        });

        StreamHandle::new(join, stop_tx)
    }
}

/// Build an event against a live broker and dispatch it.
/// Returns `false` once the broker is gone.
fn dispatch(broker: &Weak<BrokerInner>, make: impl FnOnce(&BrokerInner) -> Event) -> bool {
    let Some(b) = broker.upgrade() else {
        return false;
    };
    let event = make(&b);
    b.dispatch(event);
    true
}

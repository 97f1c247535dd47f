use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, mpsc, oneshot};

use aquasense_core::{AquaError, FeedEvent, RawRecord, SnapshotFeed, StreamHandle};

/// Path probed when none are configured (the firmware writes under `/r`).
pub const DEFAULT_PATH: &str = "/r";

/// Instruction for how the next `open_snapshot_subscription` call behaves.
#[derive(Debug, Clone, Default)]
pub enum FeedBehavior {
    /// Serve snapshots from the in-memory store. The first candidate path
    /// holding records is chosen; inserts on that path deliver a new snapshot.
    #[default]
    Store,
    /// Open and deliver these events in order, then stay open.
    Scripted(Vec<FeedEvent>),
    /// Fail the open call immediately.
    Fail(AquaError),
    /// Never complete the open call (simulate a stalled connect).
    Hang,
}

struct Session {
    path: Option<String>,
    window_size: usize,
    tx: mpsc::Sender<FeedEvent>, // inbound events for the active session
    kill_switch: Option<oneshot::Sender<()>>,
}

#[derive(Default)]
struct InternalState {
    behavior: FeedBehavior,
    candidate_paths: Vec<String>,
    store: HashMap<String, Vec<RawRecord>>,
    window_requests: Vec<usize>,
    session: Option<Session>,
}

#[derive(Default)]
struct Counters {
    opens: AtomicUsize,
    ended: AtomicUsize,
}

/// Increments the ended-session counter when the session task goes away,
/// whether it returned or was aborted.
struct EndGuard(Arc<Counters>);

impl Drop for EndGuard {
    fn drop(&mut self) {
        self.0.ended.fetch_add(1, Ordering::SeqCst);
    }
}

/// Controller handle used by tests to drive the mock feed from the outside.
pub struct MockFeedController {
    state: Arc<Mutex<InternalState>>,
    counters: Arc<Counters>,
}

impl MockFeedController {
    /// Set the behavior for subsequent opens.
    pub async fn set_behavior(&self, behavior: FeedBehavior) {
        self.state.lock().await.behavior = behavior;
    }

    /// Replace the ordered list of candidate paths probed on open.
    pub async fn set_candidate_paths<I, S>(&self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.lock().await.candidate_paths = paths.into_iter().map(Into::into).collect();
    }

    /// Append a record under `path`.
    ///
    /// Returns `true` if an open session serves that path and was sent the
    /// updated snapshot.
    pub async fn insert(&self, path: &str, record: RawRecord) -> bool {
        // Extract what to send without holding the lock across await
        let pending = {
            let mut guard = self.state.lock().await;
            let records = guard.store.entry(path.to_string()).or_default();
            records.push(record);
            let records = records.clone();
            guard.session.as_ref().and_then(|s| {
                (s.path.as_deref() == Some(path))
                    .then(|| (s.tx.clone(), FeedEvent::Snapshot(last_n(&records, s.window_size))))
            })
        };
        match pending {
            Some((tx, ev)) => tx.send(ev).await.is_ok(),
            None => false,
        }
    }

    /// Push a raw snapshot into the active session, bypassing the store.
    ///
    /// Returns `false` if no session is open or its channel is closed.
    pub async fn push_snapshot(&self, records: Vec<RawRecord>) -> bool {
        self.push(FeedEvent::Snapshot(records)).await
    }

    /// Push a raw store node into the active session, bypassing the store.
    ///
    /// The node is decoded the way a store-backed feed decodes it: a node
    /// that cannot hold records is delivered as a `MalformedSnapshot` error.
    pub async fn push_node(&self, node: &Value) -> bool {
        let ev = match RawRecord::try_from_snapshot(node) {
            Ok(records) => FeedEvent::Snapshot(records),
            Err(e) => FeedEvent::Error(e),
        };
        self.push(ev).await
    }

    /// Push an error into the active session; the session stays open.
    pub async fn push_error(&self, error: AquaError) -> bool {
        self.push(FeedEvent::Error(error)).await
    }

    async fn push(&self, ev: FeedEvent) -> bool {
        let tx_opt = {
            let guard = self.state.lock().await;
            guard.session.as_ref().map(|s| s.tx.clone())
        };
        if let Some(tx) = tx_opt {
            tx.send(ev).await.is_ok()
        } else {
            false
        }
    }

    /// Remotely end the active session; the subscriber sees its receiver close.
    pub async fn end_feed(&self) {
        let mut guard = self.state.lock().await;
        if let Some(mut session) = guard.session.take()
            && let Some(tx) = session.kill_switch.take()
        {
            let _ = tx.send(());
        }
    }

    /// Window sizes requested by each open call, in order.
    pub async fn window_requests(&self) -> Vec<usize> {
        self.state.lock().await.window_requests.clone()
    }

    /// Path served by the active session, if it was opened from the store.
    pub async fn active_path(&self) -> Option<String> {
        let guard = self.state.lock().await;
        guard.session.as_ref().and_then(|s| s.path.clone())
    }

    /// Sessions successfully opened so far.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.counters.opens.load(Ordering::SeqCst)
    }

    /// Sessions whose task has finished (stopped, aborted, or ended).
    #[must_use]
    pub fn ended_count(&self) -> usize {
        self.counters.ended.load(Ordering::SeqCst)
    }

    /// Sessions opened and not yet ended.
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.open_count().saturating_sub(self.ended_count())
    }
}

/// A snapshot feed that defers all behavior to an external controller.
pub struct MockFeed {
    name: &'static str,
    state: Arc<Mutex<InternalState>>,
    counters: Arc<Counters>,
}

impl MockFeed {
    /// Create a new mock feed and its controller.
    #[must_use]
    pub fn new_with_controller(name: &'static str) -> (Arc<dyn SnapshotFeed>, MockFeedController) {
        let state = Arc::new(Mutex::new(InternalState {
            candidate_paths: vec![DEFAULT_PATH.to_string()],
            ..InternalState::default()
        }));
        let counters = Arc::new(Counters::default());
        let controller = MockFeedController {
            state: Arc::clone(&state),
            counters: Arc::clone(&counters),
        };
        let me = Arc::new(Self {
            name,
            state,
            counters,
        });
        (me as Arc<dyn SnapshotFeed>, controller)
    }

    fn start_session(
        &self,
        state: &mut InternalState,
        path: Option<String>,
        window_size: usize,
        initial: Vec<FeedEvent>,
    ) -> (StreamHandle, mpsc::Receiver<FeedEvent>) {
        let (tx, rx) = mpsc::channel::<FeedEvent>(1024);
        let (in_tx, mut in_rx) = mpsc::channel::<FeedEvent>(1024);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let (kill_tx, mut kill_rx) = oneshot::channel::<()>();

        for ev in initial {
            let _ = in_tx.try_send(ev);
        }
        // replacing a previous session drops its inbound sender, which ends it
        state.session = Some(Session {
            path,
            window_size,
            tx: in_tx,
            kill_switch: Some(kill_tx),
        });

        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        let guard = EndGuard(Arc::clone(&self.counters));
        let join = tokio::spawn(async move {
            let _guard = guard;
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    _ = &mut kill_rx => break,
                    maybe_ev = in_rx.recv() => {
                        let Some(ev) = maybe_ev else { break };
                        // Forward; stop if downstream closed
                        if tx.send(ev).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        (StreamHandle::new(join, stop_tx), rx)
    }
}

/// The most recent `n` records, oldest first.
fn last_n(records: &[RawRecord], n: usize) -> Vec<RawRecord> {
    records[records.len().saturating_sub(n)..].to_vec()
}

#[async_trait]
impl SnapshotFeed for MockFeed {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn open_snapshot_subscription(
        &self,
        window_size: usize,
    ) -> Result<(StreamHandle, mpsc::Receiver<FeedEvent>), AquaError> {
        let behavior = {
            let mut guard = self.state.lock().await;
            guard.window_requests.push(window_size);
            guard.behavior.clone()
        };

        match behavior {
            FeedBehavior::Fail(e) => Err(e),
            FeedBehavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            FeedBehavior::Scripted(events) => {
                let mut guard = self.state.lock().await;
                Ok(self.start_session(&mut guard, None, window_size, events))
            }
            FeedBehavior::Store => {
                let mut guard = self.state.lock().await;
                if guard.candidate_paths.is_empty() {
                    return Err(AquaError::feed(self.name, "no candidate paths configured"));
                }
                // first candidate holding data wins; otherwise serve the first (empty) one
                let path = guard
                    .candidate_paths
                    .iter()
                    .find(|p| guard.store.get(*p).is_some_and(|r| !r.is_empty()))
                    .unwrap_or(&guard.candidate_paths[0])
                    .clone();
                let records = guard.store.get(&path).map(Vec::as_slice).unwrap_or_default();
                let initial = FeedEvent::Snapshot(last_n(records, window_size));
                Ok(self.start_session(&mut guard, Some(path), window_size, vec![initial]))
            }
        }
    }
}

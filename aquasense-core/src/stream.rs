//! Ownership of a feed session's background task.
//!
//! A [`SnapshotFeed`](crate::SnapshotFeed) pumps store updates into its event
//! channel from a spawned task. The broker holds that task through a
//! [`StreamHandle`] and tears it down when the last consumer leaves, when it
//! reconnects to a newer generation, or when it closes. The teardown steps
//! are expressed over two small traits so the loom model in `tests/` can
//! drive them without a Tokio runtime.

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// The task side of a feed session: it can be cancelled and polled for exit.
pub trait SessionTask {
    /// Stop the pump immediately, mid-delivery if need be.
    fn cancel(&mut self);
    /// `true` once the pump has returned on its own or was cancelled.
    fn has_ended(&self) -> bool;
}

impl SessionTask for JoinHandle<()> {
    fn cancel(&mut self) {
        self.abort();
    }

    fn has_ended(&self) -> bool {
        self.is_finished()
    }
}

/// Tells a feed pump to finish its current delivery and return.
pub trait StopSignal {
    /// A pump that already returned never sees the request.
    fn request_stop(self);
}

impl StopSignal for oneshot::Sender<()> {
    fn request_stop(self) {
        let _ = self.send(());
    }
}

/// Tear down a feed session.
///
/// The pump is asked to stop first and cancelled only if it is still
/// running afterwards. Both slots end up empty, which makes a repeated
/// teardown (explicit stop followed by drop) a no-op.
pub fn release<T, S>(task: &mut Option<T>, stop: &mut Option<S>)
where
    T: SessionTask,
    S: StopSignal,
{
    let Some(mut pump) = task.take() else {
        stop.take();
        return;
    };
    if let Some(signal) = stop.take() {
        signal.request_stop();
    }
    if !pump.has_ended() {
        pump.cancel();
    }
}

/// Owning handle for a background task that produces a stream of events.
///
/// Feeds return one of these alongside their event receiver; the broker keeps
/// one per open feed session. Dropping the handle sends the stop signal and
/// aborts the task if it is still running, so releasing a subscription is
/// just dropping its handle.
#[derive(Debug)]
pub struct StreamHandle {
    inner: Option<JoinHandle<()>>,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl StreamHandle {
    /// Wrap a task and the sender half of its stop signal.
    #[must_use]
    pub const fn new(inner: JoinHandle<()>, stop_tx: oneshot::Sender<()>) -> Self {
        Self {
            inner: Some(inner),
            stop_tx: Some(stop_tx),
        }
    }

    /// Wrap a task that has no graceful stop path; it is aborted on drop.
    #[must_use]
    pub const fn abort_only(inner: JoinHandle<()>) -> Self {
        Self {
            inner: Some(inner),
            stop_tx: None,
        }
    }

    /// Request a graceful stop and wait for the task to finish.
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            tx.request_stop();
        }
        if let Some(h) = self.inner.take() {
            let _ = h.await;
        }
    }

    /// Abort the task without waiting.
    pub fn abort(mut self) {
        if let Some(h) = self.inner.take() {
            h.abort();
        }
    }

    /// Returns `true` once the task has completed (or was never attached).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.inner.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        release(&mut self.inner, &mut self.stop_tx);
    }
}

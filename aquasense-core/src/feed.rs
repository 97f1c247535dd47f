use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::AquaError;
use crate::record::RawRecord;
use crate::stream::StreamHandle;

/// One delivery from an open snapshot subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// The most recent `window_size` records currently held by the store.
    Snapshot(Vec<RawRecord>),
    /// The store reported a failure; the subscription may or may not resume.
    Error(AquaError),
}

/// A push-based data store that can deliver snapshots of its recent window.
///
/// Implementations own transport, credentials, and any reconnect or
/// candidate-path probing policy. The broker opens at most one subscription
/// per feed at a time and never retries on its own.
#[async_trait]
pub trait SnapshotFeed: Send + Sync {
    /// A stable identifier used in errors and logs.
    fn name(&self) -> &'static str;

    /// Open a subscription delivering a snapshot whenever the store changes.
    ///
    /// The subscription is released by stopping or dropping the returned
    /// handle. A closed receiver means the feed ended on its own.
    ///
    /// # Errors
    /// Returns an error if the subscription could not be established.
    async fn open_snapshot_subscription(
        &self,
        window_size: usize,
    ) -> Result<(StreamHandle, mpsc::Receiver<FeedEvent>), AquaError>;
}

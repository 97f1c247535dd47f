//! aquasense-core
//!
//! Core types, traits, and the pure data pipeline shared across the aquasense ecosystem.
//!
//! - `record`: the loosely-typed `RawRecord` delivered by the data store.
//! - `normalize`: converts one raw record into a fully populated `CanonicalReading`.
//! - `reconcile`: orders a snapshot and resolves the latest valid value per parameter.
//! - `feed`: the `SnapshotFeed` trait implemented by data-store adapters.
//! - `telemetry`: counters describing substitutions, gaps, and feed health.
//!
//! Async runtime (Tokio)
//! ---------------------
//! Normalization and reconciliation are synchronous and runtime-agnostic.
//! The feed contract is coupled to Tokio:
//!
//! - `stream::StreamHandle` wraps `tokio::task::JoinHandle<()>` and uses
//!   `tokio::sync::oneshot::Sender<()>` for cooperative shutdown.
//! - `feed::SnapshotFeed` returns `(StreamHandle, tokio::sync::mpsc::Receiver<FeedEvent>)`.
//!
//! Code that drives a feed must therefore run under a Tokio 1.x runtime.
#![warn(missing_docs)]

/// Injectable time source.
pub mod clock;
/// The snapshot feed collaborator contract.
pub mod feed;
/// Raw record to canonical reading conversion.
pub mod normalize;
/// Canonical reading types.
pub mod reading;
/// Loosely-typed records as delivered by the store.
pub mod record;
/// Snapshot ordering and latest-value resolution.
pub mod reconcile;
/// Stream handle utilities used by feeds and the broker.
pub mod stream;
/// Observability counters.
pub mod telemetry;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use feed::{FeedEvent, SnapshotFeed};
pub use normalize::{Normalizer, normalize};
pub use reading::{
    CanonicalReading, DefaultReason, Measurement, SequenceSource, TimeSource, ValueSource,
};
pub use reconcile::{
    LatestStatus, LatestValue, LatestValues, ReconciledWindow, Reconciler, reconcile,
};
pub use record::RawRecord;
pub use stream::StreamHandle;
pub use telemetry::{Telemetry, TelemetrySnapshot};
pub use types::*;

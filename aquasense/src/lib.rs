//! Aquasense shares one water-quality snapshot feed among any number of consumers.
//!
//! Overview
//! - A [`Broker`] owns at most one subscription to a [`SnapshotFeed`], opened
//!   when the first consumer joins and released when the last one leaves.
//! - Every snapshot is reconciled once into a [`ReconciledWindow`]: readings
//!   ordered newest first plus the latest valid value of each parameter. The
//!   same `Arc` is handed to every consumer, so all views agree.
//! - Feed failures move the broker to `Degraded` and are reported through
//!   `on_error` and `on_connectivity(false)`; the last good window stays
//!   available. The broker never retries; call [`Broker::reconnect`] or
//!   re-subscribe to recover.
//!
//! Key behaviors and trade-offs
//! - Callbacks run on the feed task in registration order with no lock
//!   held. They may unsubscribe themselves or others; a slow callback delays
//!   the consumers after it.
//! - A panicking callback is isolated and counted in telemetry.
//! - Replay-on-join (off by default) hands a late consumer the last window
//!   immediately instead of waiting for the next change.
//!
//! Examples
//! ```rust,ignore
//! use std::sync::Arc;
//! use aquasense::{Broker, Consumer, Parameter};
//!
//! let broker = Broker::builder()
//!     .feed(Arc::new(RealtimeFeed::new("/readings")))
//!     .window_size(50)
//!     .build()?;
//!
//! let sub = broker.subscribe(
//!     Consumer::builder()
//!         .on_update(|w| println!("pH {}", w.latest.get(Parameter::Ph).value))
//!         .on_connectivity(|up| println!("connected: {up}"))
//!         .build()?,
//! )?;
//! // ...
//! sub.unsubscribe();
//! ```
//!
//! See `aquasense/examples/` for a runnable demonstration.
#![warn(missing_docs)]

mod broker;
pub(crate) mod core;

pub use broker::{BrokerState, Consumer, ConsumerBuilder, Subscription, Unsubscribe};
pub use core::{Broker, BrokerBuilder};

// Re-export core types for convenience
pub use aquasense_core::{
    AquaError,
    BrokerConfig,
    CanonicalReading,
    Clock,
    DefaultReason,
    FeedEvent,
    FixedClock,
    LatestStatus,
    LatestValue,
    LatestValues,
    Measurement,
    Parameter,
    ParameterDefaults,
    PhysicalRange,
    RawRecord,
    ReconcileConfig,
    ReconciledWindow,
    Reconciler,
    SequenceSource,
    SnapshotFeed,
    StreamHandle,
    SystemClock,
    TelemetrySnapshot,
    TimeSource,
    ValueSource,
};

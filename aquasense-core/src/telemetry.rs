use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::reading::{DefaultReason, ValueSource};
use crate::Parameter;
use crate::reconcile::ReconciledWindow;

/// Counters describing pipeline and feed health.
///
/// Kept separate from reconciliation: the reconciler only marks provenance
/// on its output, and the owner of a `Telemetry` records windows after the
/// fact.
#[derive(Debug, Default)]
pub struct Telemetry {
    snapshots: AtomicU64,
    readings: AtomicU64,
    substitutions: [AtomicU64; 5],
    missing: [AtomicU64; 5],
    resolution_gaps: [AtomicU64; 5],
    duplicates_dropped: AtomicU64,
    feed_opens: AtomicU64,
    feed_errors: AtomicU64,
    consumer_panics: AtomicU64,
}

/// Point-in-time copy of [`Telemetry`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Snapshots reconciled.
    pub snapshots_reconciled: u64,
    /// Readings normalized across all snapshots.
    pub readings_normalized: u64,
    /// Fallback substitutions per parameter for present but invalid values.
    pub substitutions: BTreeMap<Parameter, u64>,
    /// Fallback substitutions per parameter for absent fields.
    pub missing: BTreeMap<Parameter, u64>,
    /// Snapshots in which a parameter had no valid value at all.
    pub resolution_gaps: BTreeMap<Parameter, u64>,
    /// Repeated deliveries removed.
    pub duplicates_dropped: u64,
    /// Feed subscriptions opened.
    pub feed_opens: u64,
    /// Feed subscriptions opened after the first one.
    pub reconnects: u64,
    /// Feed errors observed.
    pub feed_errors: u64,
    /// Consumer callbacks that panicked.
    pub consumer_panics: u64,
}

impl Telemetry {
    /// Create zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one reconciled window.
    pub fn record_window(&self, window: &ReconciledWindow) {
        self.snapshots.fetch_add(1, Ordering::Relaxed);
        self.readings
            .fetch_add(window.history.len() as u64, Ordering::Relaxed);
        self.duplicates_dropped
            .fetch_add(window.duplicates_dropped as u64, Ordering::Relaxed);
        for reading in &window.history {
            for (param, m) in reading.measurements() {
                let counters = match m.source {
                    ValueSource::Reported => continue,
                    ValueSource::Defaulted(DefaultReason::Missing) => &self.missing,
                    ValueSource::Defaulted(_) => &self.substitutions,
                };
                counters[param.index()].fetch_add(1, Ordering::Relaxed);
            }
        }
        for (param, lv) in window.latest.iter() {
            if lv.is_defaulted() {
                self.resolution_gaps[param.index()].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Account for an opened feed subscription.
    pub fn record_feed_open(&self) {
        self.feed_opens.fetch_add(1, Ordering::Relaxed);
    }

    /// Account for a feed error.
    pub fn record_feed_error(&self) {
        self.feed_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Account for a panicking consumer callback.
    pub fn record_consumer_panic(&self) {
        self.consumer_panics.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current counter values.
    #[must_use]
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let per_param = |counters: &[AtomicU64; 5]| {
            Parameter::ALL
                .into_iter()
                .map(|p| (p, counters[p.index()].load(Ordering::Relaxed)))
                .collect::<BTreeMap<_, _>>()
        };
        let feed_opens = self.feed_opens.load(Ordering::Relaxed);
        TelemetrySnapshot {
            snapshots_reconciled: self.snapshots.load(Ordering::Relaxed),
            readings_normalized: self.readings.load(Ordering::Relaxed),
            substitutions: per_param(&self.substitutions),
            missing: per_param(&self.missing),
            resolution_gaps: per_param(&self.resolution_gaps),
            duplicates_dropped: self.duplicates_dropped.load(Ordering::Relaxed),
            feed_opens,
            reconnects: feed_opens.saturating_sub(1),
            feed_errors: self.feed_errors.load(Ordering::Relaxed),
            consumer_panics: self.consumer_panics.load(Ordering::Relaxed),
        }
    }
}

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::clock::{Clock, SystemClock};
use crate::normalize::normalize;
use crate::reading::{CanonicalReading, SequenceSource, TimeSource};
use crate::record::RawRecord;
use crate::{Parameter, ReconcileConfig};

/// Whether a latest value came from a reading or from the fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatestStatus {
    /// Taken from the newest reading that carried a valid value.
    Reported,
    /// No reading in the window carried a valid value; the fallback is shown
    /// with the reconciliation time.
    Defaulted,
}

/// The most recent valid value for one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatestValue {
    /// The value.
    pub value: f64,
    /// When it was observed (reconciliation time when defaulted).
    pub observed_at: DateTime<Utc>,
    /// Sequence id of the source reading, if any.
    pub sequence_id: Option<i64>,
    /// Provenance.
    pub status: LatestStatus,
}

impl LatestValue {
    /// True when no reading in the window carried a valid value.
    #[must_use]
    pub const fn is_defaulted(&self) -> bool {
        matches!(self.status, LatestStatus::Defaulted)
    }
}

/// Latest value per parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatestValues {
    /// pH.
    pub ph: LatestValue,
    /// Total dissolved solids.
    pub tds: LatestValue,
    /// Temperature.
    pub temperature: LatestValue,
    /// Conductivity.
    pub conductivity: LatestValue,
    /// Turbidity.
    pub turbidity: LatestValue,
}

impl LatestValues {
    /// Latest value for `param`.
    #[must_use]
    pub const fn get(&self, param: Parameter) -> &LatestValue {
        match param {
            Parameter::Ph => &self.ph,
            Parameter::Tds => &self.tds,
            Parameter::Temperature => &self.temperature,
            Parameter::Conductivity => &self.conductivity,
            Parameter::Turbidity => &self.turbidity,
        }
    }

    /// Iterate in canonical parameter order.
    pub fn iter(&self) -> impl Iterator<Item = (Parameter, &LatestValue)> {
        Parameter::ALL.into_iter().map(move |p| (p, self.get(p)))
    }
}

/// Result of reconciling one snapshot.
///
/// Only defaulted latest values depend on the reconciliation time, so two
/// passes over a fully reported snapshot compare equal. Every consumer of a broker receives the same instance for the same
/// snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledWindow {
    /// Readings ordered newest first.
    pub history: Vec<CanonicalReading>,
    /// Per-parameter latest valid values, resolved independently.
    pub latest: LatestValues,
    /// Repeated deliveries of the same reading that were removed.
    pub duplicates_dropped: usize,
}

impl ReconciledWindow {
    /// True when the snapshot held no readings.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// The newest reading, if any.
    #[must_use]
    pub fn newest(&self) -> Option<&CanonicalReading> {
        self.history.first()
    }

    /// Parameters whose latest value is defaulted or older than `max_age` at `now`.
    #[must_use]
    pub fn stale_parameters(&self, now: DateTime<Utc>, max_age: TimeDelta) -> Vec<Parameter> {
        self.latest
            .iter()
            .filter(|(_, lv)| lv.is_defaulted() || now - lv.observed_at > max_age)
            .map(|(p, _)| p)
            .collect()
    }
}

/// Reconciles snapshots with a fixed configuration and clock.
#[derive(Debug, Clone)]
pub struct Reconciler {
    cfg: ReconcileConfig,
    clock: Arc<dyn Clock>,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(ReconcileConfig::default(), Arc::new(SystemClock))
    }
}

impl Reconciler {
    /// Create a reconciler.
    #[must_use]
    pub fn new(cfg: ReconcileConfig, clock: Arc<dyn Clock>) -> Self {
        Self { cfg, clock }
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &ReconcileConfig {
        &self.cfg
    }

    /// Reconcile one snapshot, reading the clock once.
    #[must_use]
    pub fn reconcile(&self, raw: &[RawRecord]) -> ReconciledWindow {
        reconcile(raw, &self.cfg, self.clock.now())
    }
}

/// Normalize, de-duplicate, order, and resolve latest values for a snapshot.
///
/// - Each record is normalized independently; its index in `raw` is the
///   fallback sequence id.
/// - A reading whose source-provided sequence id and timestamp match an
///   earlier one is a repeated delivery; the first occurrence wins. Readings
///   without a source id are repeats when their source timestamp and raw
///   fields both match an earlier reading. Untimed readings are never dropped.
/// - `history` is sorted by `observed_at` descending; ties go to the higher
///   sequence id, then to input order.
/// - Each parameter's latest value is the first `Reported` measurement when
///   scanning newest to oldest. Without one, the fallback is used with
///   `now` as its timestamp.
#[must_use]
pub fn reconcile(raw: &[RawRecord], cfg: &ReconcileConfig, now: DateTime<Utc>) -> ReconciledWindow {
    let mut seen = Seen::default();
    let mut duplicates_dropped = 0usize;

    let mut history: Vec<CanonicalReading> = Vec::with_capacity(raw.len());
    for (ordinal, record) in raw.iter().enumerate() {
        let reading = normalize(record, ordinal, cfg, now);
        if !seen.first_delivery(&reading, record) {
            duplicates_dropped += 1;
            continue;
        }
        history.push(reading);
    }

    // stable: equal keys keep input order
    history.sort_by(|a, b| {
        b.observed_at
            .cmp(&a.observed_at)
            .then_with(|| b.sequence_id.cmp(&a.sequence_id))
    });

    let resolve = |param: Parameter| -> LatestValue {
        history
            .iter()
            .find(|r| r.get(param).is_reported())
            .map_or_else(
                || LatestValue {
                    value: cfg.defaults.get(param),
                    observed_at: now,
                    sequence_id: None,
                    status: LatestStatus::Defaulted,
                },
                |r| LatestValue {
                    value: r.get(param).value,
                    observed_at: r.observed_at,
                    sequence_id: Some(r.sequence_id),
                    status: LatestStatus::Reported,
                },
            )
    };

    let latest = LatestValues {
        ph: resolve(Parameter::Ph),
        tds: resolve(Parameter::Tds),
        temperature: resolve(Parameter::Temperature),
        conductivity: resolve(Parameter::Conductivity),
        turbidity: resolve(Parameter::Turbidity),
    };

    #[cfg(feature = "tracing")]
    tracing::trace!(
        readings = history.len(),
        duplicates = duplicates_dropped,
        "reconciled snapshot"
    );

    ReconciledWindow {
        history,
        latest,
        duplicates_dropped,
    }
}

/// Delivery keys already observed within one pass.
#[derive(Default)]
struct Seen<'a> {
    sourced: HashSet<(i64, DateTime<Utc>)>,
    unsourced: HashMap<DateTime<Utc>, Vec<&'a Map<String, Value>>>,
}

impl<'a> Seen<'a> {
    fn first_delivery(&mut self, reading: &CanonicalReading, record: &'a RawRecord) -> bool {
        if reading.sequence_source == SequenceSource::Source {
            return self.sourced.insert((reading.sequence_id, reading.observed_at));
        }
        if reading.time_source == TimeSource::ProcessingTime {
            return true;
        }
        let earlier = self.unsourced.entry(reading.observed_at).or_default();
        if earlier.iter().any(|fields| **fields == record.fields) {
            return false;
        }
        earlier.push(&record.fields);
        true
    }
}

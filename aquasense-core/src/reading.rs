use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Parameter;

/// Why a parameter value was replaced by its fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultReason {
    /// No key for the parameter carried a value.
    Missing,
    /// The value was not a number or numeric string.
    Unparseable,
    /// The value parsed to NaN or an infinity.
    NonFinite,
    /// The value was a probe fault sentinel.
    SensorFault,
    /// The value fell outside the configured physical range.
    OutOfRange,
}

/// Where a measurement value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "reason")]
pub enum ValueSource {
    /// The raw record carried a valid value.
    Reported,
    /// The fallback value was substituted.
    Defaulted(DefaultReason),
}

/// One parameter value of a canonical reading. `value` is always finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// The numeric value.
    pub value: f64,
    /// Provenance of `value`.
    pub source: ValueSource,
}

impl Measurement {
    /// A value taken from the raw record.
    #[must_use]
    pub const fn reported(value: f64) -> Self {
        Self {
            value,
            source: ValueSource::Reported,
        }
    }

    /// A fallback value substituted for `reason`.
    #[must_use]
    pub const fn defaulted(value: f64, reason: DefaultReason) -> Self {
        Self {
            value,
            source: ValueSource::Defaulted(reason),
        }
    }

    /// True when the raw record carried a valid value.
    #[must_use]
    pub const fn is_reported(&self) -> bool {
        matches!(self.source, ValueSource::Reported)
    }
}

/// Which field produced `observed_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSource {
    /// A numeric epoch timestamp (seconds or milliseconds).
    EpochNumber,
    /// A `{seconds, nanoseconds}` timestamp object.
    Structured,
    /// A date-like string.
    DateString,
    /// The record's creation-time field.
    CreatedAt,
    /// No usable field; processing time was used.
    ProcessingTime,
}

/// Which field produced `sequence_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceSource {
    /// An id field or the record's numeric store key.
    Source,
    /// The record's position within its snapshot.
    Ordinal,
}

/// A fully-typed, default-completed observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalReading {
    /// When the observation was made.
    pub observed_at: DateTime<Utc>,
    /// Field that `observed_at` was resolved from.
    pub time_source: TimeSource,
    /// Identifier of the observation.
    pub sequence_id: i64,
    /// Field that `sequence_id` was resolved from.
    pub sequence_source: SequenceSource,
    /// pH.
    pub ph: Measurement,
    /// Total dissolved solids.
    pub tds: Measurement,
    /// Temperature.
    pub temperature: Measurement,
    /// Conductivity.
    pub conductivity: Measurement,
    /// Turbidity.
    pub turbidity: Measurement,
}

impl CanonicalReading {
    /// Measurement for `param`.
    #[must_use]
    pub const fn get(&self, param: Parameter) -> &Measurement {
        match param {
            Parameter::Ph => &self.ph,
            Parameter::Tds => &self.tds,
            Parameter::Temperature => &self.temperature,
            Parameter::Conductivity => &self.conductivity,
            Parameter::Turbidity => &self.turbidity,
        }
    }

    /// All five measurements in canonical parameter order.
    pub fn measurements(&self) -> impl Iterator<Item = (Parameter, &Measurement)> {
        Parameter::ALL.into_iter().map(move |p| (p, self.get(p)))
    }

    /// Number of parameters that were filled with their fallback value.
    #[must_use]
    pub fn defaulted_count(&self) -> usize {
        self.measurements().filter(|(_, m)| !m.is_reported()).count()
    }
}

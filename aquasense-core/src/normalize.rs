use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::clock::Clock;
use crate::reading::{
    CanonicalReading, DefaultReason, Measurement, SequenceSource, TimeSource,
};
use crate::record::RawRecord;
use crate::{Parameter, ReconcileConfig};

/// Fields holding an explicit observation time.
const TIME_KEYS: &[&str] = &["timestamp", "ts"];
/// Fields that may hold a date-like string.
const DATE_KEYS: &[&str] = &["timestamp", "ts", "datetime", "date"];
/// Fields holding the record's creation time.
const CREATED_KEYS: &[&str] = &["createdAt", "created_at"];
/// Fields holding an explicit sequence id.
const SEQUENCE_KEYS: &[&str] = &["id", "seq", "sequence"];

/// Epoch magnitudes at or above this are milliseconds (~1973 in ms, ~5138 AD in s).
const MILLIS_THRESHOLD: f64 = 1e11;

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Convert one raw record into a canonical reading.
///
/// Never fails: every parameter without a usable value gets its configured
/// fallback and a `Defaulted` source describing why. `ordinal` is the
/// record's position in its snapshot and becomes the sequence id when the
/// record carries none. `now` is used only when the record has no time field.
#[must_use]
pub fn normalize(
    raw: &RawRecord,
    ordinal: usize,
    cfg: &ReconcileConfig,
    now: DateTime<Utc>,
) -> CanonicalReading {
    let (observed_at, time_source) = resolve_time(raw).unwrap_or((now, TimeSource::ProcessingTime));
    let (sequence_id, sequence_source) = resolve_sequence(raw, ordinal);

    let measure = |param| resolve_measurement(raw, param, cfg);

    CanonicalReading {
        observed_at,
        time_source,
        sequence_id,
        sequence_source,
        ph: measure(Parameter::Ph),
        tds: measure(Parameter::Tds),
        temperature: measure(Parameter::Temperature),
        conductivity: measure(Parameter::Conductivity),
        turbidity: measure(Parameter::Turbidity),
    }
}

/// Normalizer bound to a configuration and a clock.
#[derive(Debug, Clone)]
pub struct Normalizer {
    cfg: ReconcileConfig,
    clock: Arc<dyn Clock>,
}

impl Normalizer {
    /// Create a normalizer.
    #[must_use]
    pub fn new(cfg: ReconcileConfig, clock: Arc<dyn Clock>) -> Self {
        Self { cfg, clock }
    }

    /// Normalize a single record outside of any snapshot (ordinal 0).
    #[must_use]
    pub fn normalize(&self, raw: &RawRecord) -> CanonicalReading {
        self.normalize_indexed(raw, 0)
    }

    /// Normalize a record located at `ordinal` within its snapshot.
    #[must_use]
    pub fn normalize_indexed(&self, raw: &RawRecord, ordinal: usize) -> CanonicalReading {
        normalize(raw, ordinal, &self.cfg, self.clock.now())
    }
}

fn resolve_measurement(raw: &RawRecord, param: Parameter, cfg: &ReconcileConfig) -> Measurement {
    let fallback = cfg.defaults.get(param);
    let outcome = match raw.first_present(param.keys()) {
        None => Err(DefaultReason::Missing),
        Some((_, value)) => check_value(value, param, cfg),
    };
    match outcome {
        Ok(v) => Measurement::reported(v),
        Err(reason) => {
            #[cfg(feature = "tracing")]
            if reason != DefaultReason::Missing {
                tracing::debug!(
                    parameter = %param,
                    reason = ?reason,
                    key = ?raw.key,
                    "substituting default for invalid value"
                );
            }
            Measurement::defaulted(fallback, reason)
        }
    }
}

fn check_value(value: &Value, param: Parameter, cfg: &ReconcileConfig) -> Result<f64, DefaultReason> {
    let v = as_number(value).ok_or(DefaultReason::Unparseable)?;
    if !v.is_finite() {
        return Err(DefaultReason::NonFinite);
    }
    if cfg.reject_sensor_faults && param.fault_sentinels().contains(&v) {
        return Err(DefaultReason::SensorFault);
    }
    if let Some(range) = cfg.physical_ranges.get(&param)
        && !range.contains(v)
    {
        return Err(DefaultReason::OutOfRange);
    }
    Ok(v)
}

/// Numbers and numeric strings (the firmware uploads `"25.0"`).
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn resolve_time(raw: &RawRecord) -> Option<(DateTime<Utc>, TimeSource)> {
    let fields = TIME_KEYS.iter().filter_map(|k| raw.get(k));

    // numeric epoch first, then structured objects, then date strings
    if let Some(ts) = fields.clone().find_map(|v| as_number(v).and_then(from_epoch)) {
        return Some((ts, TimeSource::EpochNumber));
    }
    if let Some(ts) = fields.clone().find_map(from_structured) {
        return Some((ts, TimeSource::Structured));
    }
    if let Some(ts) = DATE_KEYS
        .iter()
        .filter_map(|k| raw.get(k))
        .find_map(from_date_string)
    {
        return Some((ts, TimeSource::DateString));
    }
    CREATED_KEYS
        .iter()
        .filter_map(|k| raw.get(k))
        .find_map(|v| {
            as_number(v)
                .and_then(from_epoch)
                .or_else(|| from_structured(v))
                .or_else(|| from_date_string(v))
        })
        .map(|ts| (ts, TimeSource::CreatedAt))
}

#[allow(clippy::cast_possible_truncation)]
fn from_epoch(x: f64) -> Option<DateTime<Utc>> {
    if !x.is_finite() {
        return None;
    }
    if x.abs() >= MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(x.round() as i64)
    } else {
        DateTime::from_timestamp_micros((x * 1e6).round() as i64)
    }
}

fn from_structured(value: &Value) -> Option<DateTime<Utc>> {
    let obj = value.as_object()?;
    let secs = obj
        .get("seconds")
        .or_else(|| obj.get("_seconds"))
        .and_then(Value::as_i64)?;
    let nanos = obj
        .get("nanoseconds")
        .or_else(|| obj.get("_nanoseconds"))
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0);
    DateTime::from_timestamp(secs, nanos)
}

fn from_date_string(value: &Value) -> Option<DateTime<Utc>> {
    let s = value.as_str()?.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn resolve_sequence(raw: &RawRecord, ordinal: usize) -> (i64, SequenceSource) {
    let explicit = SEQUENCE_KEYS
        .iter()
        .filter_map(|k| raw.get(k))
        .find_map(as_integer);
    let from_key = || raw.key.as_deref().and_then(|k| k.trim().parse::<i64>().ok());
    match explicit.or_else(from_key) {
        Some(id) => (id, SequenceSource::Source),
        None => (
            i64::try_from(ordinal).unwrap_or(i64::MAX),
            SequenceSource::Ordinal,
        ),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e18)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

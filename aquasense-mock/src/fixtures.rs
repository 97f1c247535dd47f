//! Record shapes seen in the store, for tests and demos.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};

use aquasense_core::RawRecord;

/// A record as uploaded by the probe firmware.
///
/// Values are one-decimal strings under the compact keys `t`, `p`, `n`, `d`
/// and `ec`; `timestamp` is the server time in milliseconds and the store key
/// is the device uptime in seconds.
#[must_use]
pub fn firmware_record(
    uptime_secs: u64,
    server_time: DateTime<Utc>,
    temperature: f64,
    ph: f64,
    turbidity: f64,
    tds: f64,
    ec: f64,
) -> RawRecord {
    let mut fields = Map::new();
    fields.insert("t".into(), Value::String(format!("{temperature:.1}")));
    fields.insert("p".into(), Value::String(format!("{ph:.1}")));
    fields.insert("n".into(), Value::String(format!("{turbidity:.1}")));
    fields.insert("d".into(), Value::String(format!("{tds:.1}")));
    fields.insert("ec".into(), Value::String(format!("{ec:.1}")));
    fields.insert("timestamp".into(), json!(server_time.timestamp_millis()));
    RawRecord::with_key(uptime_secs.to_string(), fields)
}

/// A firmware record whose probes all reported their fault sentinels.
#[must_use]
pub fn faulted_firmware_record(uptime_secs: u64, server_time: DateTime<Utc>) -> RawRecord {
    firmware_record(uptime_secs, server_time, -127.0, -1.0, -1.0, -1.0, -1.0)
}

/// A record using the full parameter names and an RFC 3339 timestamp.
#[must_use]
pub fn named_record(
    observed_at: DateTime<Utc>,
    ph: f64,
    tds: f64,
    temperature: f64,
    conductivity: f64,
    turbidity: f64,
) -> RawRecord {
    RawRecord::from_value(json!({
        "timestamp": observed_at.to_rfc3339(),
        "ph": ph,
        "tds": tds,
        "temperature": temperature,
        "conductivity": conductivity,
        "turbidity": turbidity,
    }))
}

/// Two sparse readings a minute apart: the older carries only temperature,
/// the newer only pH.
#[must_use]
pub fn sparse_pair(older: DateTime<Utc>) -> Vec<RawRecord> {
    let newer = older + chrono::TimeDelta::minutes(1);
    vec![
        RawRecord::from_value(json!({"timestamp": older.to_rfc3339(), "temperature": 22.0})),
        RawRecord::from_value(json!({"timestamp": newer.to_rfc3339(), "ph": 6.8})),
    ]
}

/// `count` firmware records one minute apart starting at `start`, oldest first.
#[must_use]
pub fn firmware_series(start: DateTime<Utc>, count: u32) -> Vec<RawRecord> {
    (0..count)
        .map(|i| {
            let step = f64::from(i);
            firmware_record(
                u64::from(i) * 60,
                start + chrono::TimeDelta::minutes(i64::from(i)),
                24.0 + step * 0.1,
                7.0 + (step * 0.05) % 0.5,
                3.0 + step % 4.0,
                240.0 + step,
                480.0 + step * 2.0,
            )
        })
        .collect()
}

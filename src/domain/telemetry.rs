// Telemetry data domain models
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current state of a sensor. `value` is `None` when the host reports the
/// sensor as unavailable or non-numeric.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Reading {
    pub value: Option<f64>,
    pub unit: String,
    pub timestamp_ms: Option<i64>,
}

impl Reading {
    pub fn new(value: Option<f64>, unit: impl Into<String>, timestamp_ms: Option<i64>) -> Self {
        Self {
            value,
            unit: unit.into(),
            timestamp_ms,
        }
    }

    pub fn unavailable() -> Self {
        Self::default()
    }
}

/// One historical record as delivered by the host.
///
/// Hosts disagree on field names, so the timestamp is stored raw in every
/// known slot and resolved by [`HistorySample::timestamp_ms`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HistorySample {
    #[serde(default, alias = "s")]
    pub state: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_changed: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reported: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lc: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lu: Option<Value>,
}

type TimestampField = fn(&HistorySample) -> Option<&Value>;

/// Timestamp fields in priority order. The first one that resolves wins.
///
/// 1. `last_changed`  - when the value itself last changed
/// 2. `last_updated`  - when the state object was last written
/// 3. `last_reported` - last report from the device, even if unchanged
/// 4. `lc`            - compact form of `last_changed` (epoch seconds)
/// 5. `lu`            - compact form of `last_updated` (epoch seconds)
///
/// Numeric values are epoch seconds; strings are RFC 3339 or
/// `YYYY-MM-DD HH:MM:SS[.f]` taken as UTC.
pub const TIMESTAMP_PRIORITY: [(&str, TimestampField); 5] = [
    ("last_changed", last_changed),
    ("last_updated", last_updated),
    ("last_reported", last_reported),
    ("lc", compact_changed),
    ("lu", compact_updated),
];

fn last_changed(s: &HistorySample) -> Option<&Value> {
    s.last_changed.as_ref()
}

fn last_updated(s: &HistorySample) -> Option<&Value> {
    s.last_updated.as_ref()
}

fn last_reported(s: &HistorySample) -> Option<&Value> {
    s.last_reported.as_ref()
}

fn compact_changed(s: &HistorySample) -> Option<&Value> {
    s.lc.as_ref()
}

fn compact_updated(s: &HistorySample) -> Option<&Value> {
    s.lu.as_ref()
}

impl HistorySample {
    pub fn new(state: impl Into<Value>, last_changed: Option<&str>) -> Self {
        Self {
            state: Some(state.into()),
            last_changed: last_changed.map(|t| Value::String(t.to_string())),
            ..Default::default()
        }
    }

    /// Numeric value of the sample, if it has one.
    pub fn value(&self) -> Option<f64> {
        self.state.as_ref().and_then(value_to_f64)
    }

    /// Best available timestamp in epoch milliseconds, following
    /// [`TIMESTAMP_PRIORITY`].
    pub fn timestamp_ms(&self) -> Option<i64> {
        TIMESTAMP_PRIORITY
            .iter()
            .filter_map(|(_, field)| field(self))
            .find_map(timestamp_to_ms)
    }
}

pub fn value_to_f64(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn timestamp_to_ms(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            let secs = n.as_f64().filter(|s| s.is_finite() && *s != 0.0)?;
            // The cast saturates; anything chrono cannot represent is dropped.
            let ms = (secs * 1000.0).round() as i64;
            DateTime::from_timestamp_millis(ms).map(|t| t.timestamp_millis())
        }
        Value::String(s) => parse_timestamp(s),
        _ => None,
    }
}

pub fn parse_timestamp(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.timestamp_millis());
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|t| t.and_utc().timestamp_millis())
}

/// A sample mapped into the logical chart space (origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartPoint {
    pub x: f64,
    pub y: f64,
    pub value: f64,
    pub timestamp_ms: i64,
}

impl ChartPoint {
    pub fn new(x: f64, y: f64, value: f64, timestamp_ms: i64) -> Self {
        Self {
            x,
            y,
            value,
            timestamp_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_parsing() {
        assert_eq!(HistorySample::new("412.5", None).value(), Some(412.5));
        assert_eq!(HistorySample::new(7, None).value(), Some(7.0));
        assert_eq!(HistorySample::new("unavailable", None).value(), None);
        assert_eq!(HistorySample::new("", None).value(), None);
        assert_eq!(HistorySample::default().value(), None);
    }

    #[test]
    fn test_timestamp_priority() {
        let sample: HistorySample = serde_json::from_value(json!({
            "state": "1",
            "last_updated": "2024-03-01T10:00:00+00:00",
            "last_changed": "2024-03-01T09:00:00Z",
            "lu": 1709290000.0
        }))
        .unwrap();
        assert_eq!(sample.timestamp_ms(), Some(1_709_283_600_000));

        let sample: HistorySample = serde_json::from_value(json!({
            "s": "1",
            "last_changed": "not a date",
            "lu": 1709290000.5
        }))
        .unwrap();
        assert_eq!(sample.value(), Some(1.0));
        assert_eq!(sample.timestamp_ms(), Some(1_709_290_000_500));
    }

    #[test]
    fn test_naive_timestamp_is_utc() {
        assert_eq!(parse_timestamp("2024-03-01 09:00:00"), Some(1_709_283_600_000));
        assert_eq!(parse_timestamp("   "), None);
    }

    #[test]
    fn test_unrepresentable_epoch_falls_through() {
        let sample: HistorySample = serde_json::from_value(json!({
            "state": "1",
            "lc": 1e17,
            "lu": -1.0
        }))
        .unwrap();
        assert_eq!(sample.timestamp_ms(), Some(-1_000));

        let sample: HistorySample = serde_json::from_value(json!({ "state": "1", "lc": -1e300 })).unwrap();
        assert_eq!(sample.timestamp_ms(), None);
    }

    #[test]
    fn test_missing_timestamp() {
        let sample = HistorySample::new("3", None);
        assert_eq!(sample.timestamp_ms(), None);
    }
}

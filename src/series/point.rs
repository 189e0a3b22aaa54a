//! Points that make up a series

use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Plain base-10 number, the same test the recorder queries apply in SQL
static NUMERIC_STATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?[0-9]+\.?[0-9]*$").expect("numeric state pattern is valid"));

/// Observed value: numeric, textual, or missing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointValue {
    Number(f64),
    Text(String),
    Null,
}

impl PointValue {
    /// Coerce a recorder state string: plain numbers become floats, anything
    /// else is kept verbatim.
    pub fn from_state(state: &str) -> Self {
        if NUMERIC_STATE.is_match(state) {
            if let Ok(number) = state.parse::<f64>() {
                return PointValue::Number(number);
            }
        }
        PointValue::Text(state.to_string())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PointValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<Option<f64>> for PointValue {
    fn from(value: Option<f64>) -> Self {
        value.map(PointValue::Number).unwrap_or(PointValue::Null)
    }
}

/// One observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimePoint {
    pub timestamp: String,
    pub value: PointValue,
}

impl TimePoint {
    pub fn new(timestamp: DateTime<Utc>, value: PointValue) -> Self {
        Self {
            timestamp: format_timestamp(timestamp),
            value,
        }
    }
}

/// A bucket summary; absent fields are omitted from JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticPoint {
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sum: Option<f64>,
}

impl StatisticPoint {
    /// Attach the fixed synthetic statistics to a mock observation:
    /// `min = v - 2`, `max = v + 2`, `sum = v * 1.5`.
    pub fn from_mock(point: &TimePoint) -> Self {
        let value = point.value.as_f64();
        Self {
            timestamp: point.timestamp.clone(),
            mean: value,
            min: value.map(|v| v - 2.0),
            max: value.map(|v| v + 2.0),
            sum: value.map(|v| v * 1.5),
        }
    }

    /// A point carrying a single named field
    pub fn with_field(timestamp: String, field: &str, value: Option<f64>) -> Self {
        let mut point = Self {
            timestamp,
            ..Default::default()
        };
        match field {
            "mean" => point.mean = value,
            "min" => point.min = value,
            "max" => point.max = value,
            "sum" => point.sum = value,
            _ => {}
        }
        point
    }
}

/// Either kind of point; serialized without a tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeriesPoint {
    Time(TimePoint),
    Statistic(StatisticPoint),
}

impl SeriesPoint {
    pub fn timestamp(&self) -> &str {
        match self {
            SeriesPoint::Time(point) => &point.timestamp,
            SeriesPoint::Statistic(point) => &point.timestamp,
        }
    }
}

impl From<TimePoint> for SeriesPoint {
    fn from(point: TimePoint) -> Self {
        SeriesPoint::Time(point)
    }
}

impl From<StatisticPoint> for SeriesPoint {
    fn from(point: StatisticPoint) -> Self {
        SeriesPoint::Statistic(point)
    }
}

/// ISO-8601 in UTC with a trailing `Z`; fractional seconds only when present
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_state_coercion() {
        assert_eq!(PointValue::from_state("21.5"), PointValue::Number(21.5));
        assert_eq!(PointValue::from_state("-3"), PointValue::Number(-3.0));
        assert_eq!(
            PointValue::from_state("unlocked"),
            PointValue::Text("unlocked".to_string())
        );
        // Exponents and leading dots are not plain numbers
        assert_eq!(
            PointValue::from_state("1e5"),
            PointValue::Text("1e5".to_string())
        );
        assert_eq!(
            PointValue::from_state(".5"),
            PointValue::Text(".5".to_string())
        );
    }

    #[test]
    fn test_numeric_state_pattern() {
        for state in ["0", "42", "-7", "7.", "3.25"] {
            assert!(NUMERIC_STATE.is_match(state), "{state} should be numeric");
        }
        for state in ["", "-", "1.2.3", " 4", "4 ", "+1", "nan"] {
            assert!(!NUMERIC_STATE.is_match(state), "{state} should not be numeric");
        }
        assert_eq!(PointValue::from_state("7."), PointValue::Number(7.0));
    }

    #[test]
    fn test_statistic_point_omits_missing_fields() {
        let point = StatisticPoint::with_field("2024-12-19T00:00:00Z".to_string(), "max", Some(3.0));
        assert_eq!(
            serde_json::to_value(&point).unwrap(),
            json!({"timestamp": "2024-12-19T00:00:00Z", "max": 3.0})
        );
    }

    #[test]
    fn test_timestamp_format() {
        let ts = Utc.with_ymd_and_hms(2024, 12, 19, 6, 30, 0).unwrap();
        assert_eq!(format_timestamp(ts), "2024-12-19T06:30:00Z");
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(20.123), 20.12);
        assert_eq!(round2(19.999), 20.0);
    }
}

//! Date-range parsing and validation

use crate::error::{HistoryError, Result};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};

/// A validated `[start, end)` window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The `span` ending at `end`
    pub fn trailing(end: DateTime<Utc>, span: Duration) -> Self {
        Self {
            start: end - span,
            end,
        }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Start as fractional Unix seconds, the unit of the recorder's `*_ts` columns
    pub fn start_epoch(&self) -> f64 {
        epoch_seconds(self.start)
    }

    pub fn end_epoch(&self) -> f64 {
        epoch_seconds(self.end)
    }
}

fn epoch_seconds(ts: DateTime<Utc>) -> f64 {
    ts.timestamp() as f64 + f64::from(ts.timestamp_subsec_micros()) / 1_000_000.0
}

/// Parse an ISO-8601 timestamp. A trailing `Z` means UTC; otherwise an explicit
/// offset is required.
pub fn parse_timestamp(value: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    let value = value.trim();
    match value.strip_suffix('Z') {
        Some(naive) => NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|ts| ts.and_utc()),
        None => DateTime::parse_from_rfc3339(value).map(|ts| ts.with_timezone(&Utc)),
    }
}

/// Accepts or rejects a requested window
#[derive(Debug, Clone, Copy)]
pub struct DateRangeValidator {
    max_days: u32,
}

impl DateRangeValidator {
    pub fn new(max_days: u32) -> Self {
        Self { max_days }
    }

    pub fn max_days(&self) -> u32 {
        self.max_days
    }

    pub fn max_window(&self) -> Duration {
        Duration::days(i64::from(self.max_days))
    }

    /// Parse and check both bounds. Never substitutes a default window.
    pub fn validate(&self, start: &str, end: &str) -> Result<DateRange> {
        let start = parse_timestamp(start).map_err(|e| {
            HistoryError::validation(format!("Invalid date format for start '{start}': {e}"))
        })?;
        let end = parse_timestamp(end).map_err(|e| {
            HistoryError::validation(format!("Invalid date format for end '{end}': {e}"))
        })?;
        self.check(DateRange::new(start, end))
    }

    /// Check an already-parsed window
    pub fn check(&self, range: DateRange) -> Result<DateRange> {
        if range.end <= range.start {
            return Err(HistoryError::validation(
                "End time must be after start time",
            ));
        }
        if range.duration() > self.max_window() {
            return Err(HistoryError::validation(format!(
                "Query range exceeds {} days",
                self.max_days
            )));
        }
        Ok(range)
    }
}

impl Default for DateRangeValidator {
    fn default() -> Self {
        Self::new(90)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case("2024-12-19T00:00:00Z")]
    #[case("2024-12-19T00:00:00.000Z")]
    #[case("2024-12-19T00:00:00+00:00")]
    #[case("2024-12-19T01:00:00+01:00")]
    fn test_parse_equivalent_forms(#[case] input: &str) {
        let expected = Utc.with_ymd_and_hms(2024, 12, 19, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp(input).unwrap(), expected);
    }

    #[test]
    fn test_parse_requires_offset() {
        assert!(parse_timestamp("2024-12-19T00:00:00").is_err());
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_exact_maximum_is_accepted() {
        let validator = DateRangeValidator::new(90);
        let range = validator
            .validate("2024-01-01T00:00:00Z", "2024-03-31T00:00:00Z")
            .unwrap();
        assert_eq!(range.duration(), Duration::days(90));

        let err = validator
            .validate("2024-01-01T00:00:00Z", "2024-03-31T00:00:01Z")
            .unwrap_err();
        assert!(matches!(err, HistoryError::Validation(_)));
    }

    #[test]
    fn test_inverted_and_empty_windows() {
        let validator = DateRangeValidator::default();
        assert!(validator
            .validate("2024-01-02T00:00:00Z", "2024-01-01T00:00:00Z")
            .is_err());
        assert!(validator
            .validate("2024-01-01T00:00:00Z", "2024-01-01T00:00:00Z")
            .is_err());
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = DateRangeValidator::default()
            .validate("not-a-date", "2024-01-01T00:00:00Z")
            .unwrap_err();
        assert!(err.to_string().contains("Invalid date format for start"));
    }

    #[test]
    fn test_epoch_seconds() {
        let range = DateRange::new(
            Utc.timestamp_opt(1_700_000_000, 500_000_000).unwrap(),
            Utc.timestamp_opt(1_700_003_600, 0).unwrap(),
        );
        assert_eq!(range.start_epoch(), 1_700_000_000.5);
        assert_eq!(range.end_epoch(), 1_700_003_600.0);
    }
}

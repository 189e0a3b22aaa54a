//! Bucket intervals and statistics periods

use crate::error::HistoryError;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Bucket width for history aggregation and mock generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Interval {
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[default]
    #[serde(rename = "1h")]
    Hour,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "1d")]
    Day,
}

impl Interval {
    pub const ALL: [Interval; 6] = [
        Interval::FiveMinutes,
        Interval::FifteenMinutes,
        Interval::ThirtyMinutes,
        Interval::Hour,
        Interval::SixHours,
        Interval::Day,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::FiveMinutes => "5m",
            Interval::FifteenMinutes => "15m",
            Interval::ThirtyMinutes => "30m",
            Interval::Hour => "1h",
            Interval::SixHours => "6h",
            Interval::Day => "1d",
        }
    }

    /// Step size in hours (`5m` is 1/12)
    pub fn hours(&self) -> f64 {
        self.seconds() as f64 / 3600.0
    }

    pub fn seconds(&self) -> i64 {
        match self {
            Interval::FiveMinutes => 300,
            Interval::FifteenMinutes => 900,
            Interval::ThirtyMinutes => 1800,
            Interval::Hour => 3600,
            Interval::SixHours => 21_600,
            Interval::Day => 86_400,
        }
    }

    pub fn step(&self) -> Duration {
        Duration::seconds(self.seconds())
    }

    /// PostgreSQL interval literal body, e.g. `15 minutes`
    pub fn sql_interval(&self) -> &'static str {
        match self {
            Interval::FiveMinutes => "5 minutes",
            Interval::FifteenMinutes => "15 minutes",
            Interval::ThirtyMinutes => "30 minutes",
            Interval::Hour => "1 hour",
            Interval::SixHours => "6 hours",
            Interval::Day => "1 day",
        }
    }

    /// Parse, falling back to `1h` for anything unrecognized
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            warn!(interval = %value, "Unknown interval, using 1h");
            Interval::Hour
        })
    }
}

impl FromStr for Interval {
    type Err = HistoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Interval::ALL
            .into_iter()
            .find(|interval| interval.as_str() == s)
            .ok_or_else(|| {
                HistoryError::validation(format!(
                    "Invalid interval '{s}'. Expected one of: 5m, 15m, 30m, 1h, 6h, 1d"
                ))
            })
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rollup period of the recorder statistics tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum StatisticsPeriod {
    #[serde(rename = "5minute")]
    FiveMinute,
    #[default]
    #[serde(rename = "hour")]
    Hour,
    #[serde(rename = "day")]
    Day,
    #[serde(rename = "month")]
    Month,
}

impl StatisticsPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatisticsPeriod::FiveMinute => "5minute",
            StatisticsPeriod::Hour => "hour",
            StatisticsPeriod::Day => "day",
            StatisticsPeriod::Month => "month",
        }
    }

    /// Source table: short-term rows for 5 minute periods, hourly rows otherwise
    pub fn table(&self) -> &'static str {
        match self {
            StatisticsPeriod::FiveMinute => "statistics_short_term",
            _ => "statistics",
        }
    }

    /// `date_trunc` unit for periods rolled up from hourly rows
    pub fn rollup_unit(&self) -> Option<&'static str> {
        match self {
            StatisticsPeriod::Day => Some("day"),
            StatisticsPeriod::Month => Some("month"),
            _ => None,
        }
    }

    /// Step used when synthesizing a statistics series
    pub fn mock_interval(&self) -> Interval {
        match self {
            StatisticsPeriod::FiveMinute => Interval::FiveMinutes,
            StatisticsPeriod::Hour => Interval::Hour,
            StatisticsPeriod::Day | StatisticsPeriod::Month => Interval::Day,
        }
    }
}

impl FromStr for StatisticsPeriod {
    type Err = HistoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "5minute" => Ok(StatisticsPeriod::FiveMinute),
            "hour" => Ok(StatisticsPeriod::Hour),
            "day" => Ok(StatisticsPeriod::Day),
            "month" => Ok(StatisticsPeriod::Month),
            other => Err(HistoryError::validation(format!(
                "Invalid period '{other}'. Expected one of: 5minute, hour, day, month"
            ))),
        }
    }
}

impl fmt::Display for StatisticsPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_hours() {
        assert!((Interval::FiveMinutes.hours() - 1.0 / 12.0).abs() < 1e-12);
        assert_eq!(Interval::FifteenMinutes.hours(), 0.25);
        assert_eq!(Interval::ThirtyMinutes.hours(), 0.5);
        assert_eq!(Interval::Hour.hours(), 1.0);
        assert_eq!(Interval::SixHours.hours(), 6.0);
        assert_eq!(Interval::Day.hours(), 24.0);
    }

    #[test]
    fn test_interval_parsing() {
        assert_eq!("15m".parse::<Interval>().unwrap(), Interval::FifteenMinutes);
        assert!("2h".parse::<Interval>().is_err());
        assert_eq!(Interval::parse_lenient("weekly"), Interval::Hour);
        assert_eq!(Interval::parse_lenient("6h"), Interval::SixHours);
    }

    #[test]
    fn test_period_tables() {
        assert_eq!(StatisticsPeriod::FiveMinute.table(), "statistics_short_term");
        assert_eq!(StatisticsPeriod::Month.table(), "statistics");
        assert_eq!(StatisticsPeriod::Hour.rollup_unit(), None);
        assert_eq!(StatisticsPeriod::Day.rollup_unit(), Some("day"));
        assert_eq!(StatisticsPeriod::Month.mock_interval(), Interval::Day);
        assert!("week".parse::<StatisticsPeriod>().is_err());
    }
}

//! Deterministic synthetic series
//!
//! Used whenever no database is reachable or a query comes back empty. Values
//! follow a slow upward trend with a small offset derived from a SHA-256 of the
//! point's timestamp, so identical requests produce identical output.

use super::interval::Interval;
use super::point::{format_timestamp, round2, PointValue, TimePoint};
use super::range::{parse_timestamp, DateRange};
use crate::error::{HistoryError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::str::FromStr;
use tracing::warn;

/// Hard cap on generated points
pub const MAX_MOCK_POINTS: usize = 1000;

const BASELINE: f64 = 20.0;
const TREND_STEP: f64 = 0.1;

/// What to do when the generator is handed bounds it cannot parse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MockWindowPolicy {
    /// Substitute the 24 hours before now
    #[default]
    Lenient,
    /// Fail with a validation error
    Strict,
}

impl FromStr for MockWindowPolicy {
    type Err = HistoryError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lenient" => Ok(MockWindowPolicy::Lenient),
            "strict" => Ok(MockWindowPolicy::Strict),
            other => Err(HistoryError::config(format!(
                "Unknown mock window policy '{other}' (expected lenient or strict)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MockSeriesGenerator {
    policy: MockWindowPolicy,
}

impl MockSeriesGenerator {
    pub fn new(policy: MockWindowPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MockWindowPolicy {
        self.policy
    }

    /// Generate between two ISO-8601 bounds
    pub fn generate(&self, start: &str, end: &str, interval: Interval) -> Result<Vec<TimePoint>> {
        self.generate_at(start, end, interval, Utc::now())
    }

    /// Same as [`generate`](Self::generate) with an explicit "now" for the
    /// lenient fallback window.
    pub fn generate_at(
        &self,
        start: &str,
        end: &str,
        interval: Interval,
        now: DateTime<Utc>,
    ) -> Result<Vec<TimePoint>> {
        let range = match (parse_timestamp(start), parse_timestamp(end)) {
            (Ok(start), Ok(end)) => DateRange::new(start, end),
            (Err(e), _) | (_, Err(e)) => match self.policy {
                MockWindowPolicy::Strict => {
                    return Err(HistoryError::validation(format!(
                        "Invalid date format: {e}"
                    )));
                }
                MockWindowPolicy::Lenient => {
                    warn!(start, end, error = %e, "Unparseable mock window, using the last 24 hours");
                    DateRange::trailing(now, Duration::hours(24))
                }
            },
        };

        Ok(self.generate_window(&range, interval))
    }

    /// Generate over an already-parsed window
    pub fn generate_window(&self, range: &DateRange, interval: Interval) -> Vec<TimePoint> {
        let step = interval.step();
        let mut series = Vec::new();
        let mut current = Some(range.start);

        while let Some(at) = current.filter(|at| *at < range.end) {
            if series.len() >= MAX_MOCK_POINTS {
                break;
            }
            let index = series.len();
            let timestamp = format_timestamp(at);
            let value = BASELINE + TREND_STEP * index as f64 + perturbation(&timestamp);
            series.push(TimePoint {
                timestamp,
                value: PointValue::Number(round2(value)),
            });
            // Stops at the end of the representable calendar
            current = range.start.checked_add_signed(step * (index as i32 + 1));
        }

        series
    }
}

/// Integer offset in `-5..=4` derived from the timestamp text
fn perturbation(timestamp: &str) -> f64 {
    let digest = Sha256::digest(timestamp.as_bytes());
    f64::from(digest[0] % 10) - 5.0
}

/// Generate with the lenient policy; unknown steps fall back to `1h`
pub fn generate_mock_series(start: &str, end: &str, step: &str) -> Vec<TimePoint> {
    MockSeriesGenerator::default()
        .generate(start, end, Interval::parse_lenient(step))
        .unwrap_or_default()
}

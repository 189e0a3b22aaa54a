//! Aggregation selection
//!
//! Every aggregation method maps to one [`AggregationPlan`]: the SQL expression
//! used to collapse a bucket and the field the result is reported under. The
//! table is static so the SQL builders and the response shaping read from the
//! same place.

use super::point::{PointValue, SeriesPoint, StatisticPoint, TimePoint};
use crate::error::HistoryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Raw,
    #[default]
    Mean,
    Min,
    Max,
    Sum,
    Last,
    First,
}

/// How one aggregation is computed and reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregationPlan {
    pub aggregation: Aggregation,
    /// SQL template; `{value}` is the numeric column, `{order}` the ordering key.
    /// `None` means rows are returned unbucketed.
    pub sql_template: Option<&'static str>,
    /// Key the aggregated value is reported under
    pub result_field: &'static str,
}

static PLANS: [AggregationPlan; 7] = [
    AggregationPlan {
        aggregation: Aggregation::Raw,
        sql_template: None,
        result_field: "value",
    },
    AggregationPlan {
        aggregation: Aggregation::Mean,
        sql_template: Some("AVG({value})"),
        result_field: "mean",
    },
    AggregationPlan {
        aggregation: Aggregation::Min,
        sql_template: Some("MIN({value})"),
        result_field: "min",
    },
    AggregationPlan {
        aggregation: Aggregation::Max,
        sql_template: Some("MAX({value})"),
        result_field: "max",
    },
    AggregationPlan {
        aggregation: Aggregation::Sum,
        sql_template: Some("SUM({value})"),
        result_field: "sum",
    },
    AggregationPlan {
        aggregation: Aggregation::Last,
        sql_template: Some("(array_agg({value} ORDER BY {order} DESC) FILTER (WHERE {value} IS NOT NULL))[1]"),
        result_field: "value",
    },
    AggregationPlan {
        aggregation: Aggregation::First,
        sql_template: Some("(array_agg({value} ORDER BY {order} ASC) FILTER (WHERE {value} IS NOT NULL))[1]"),
        result_field: "value",
    },
];

impl AggregationPlan {
    /// Render the SQL expression, or `None` for raw rows
    pub fn sql_expression(&self, value: &str, order: &str) -> Option<String> {
        self.sql_template
            .map(|template| template.replace("{value}", value).replace("{order}", order))
    }

    /// Whether results carry a statistic field rather than a plain value
    pub fn is_statistic(&self) -> bool {
        self.result_field != "value"
    }
}

impl Aggregation {
    pub const ALL: [Aggregation; 7] = [
        Aggregation::Raw,
        Aggregation::Mean,
        Aggregation::Min,
        Aggregation::Max,
        Aggregation::Sum,
        Aggregation::Last,
        Aggregation::First,
    ];

    pub fn plan(&self) -> &'static AggregationPlan {
        &PLANS[*self as usize]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Raw => "raw",
            Aggregation::Mean => "mean",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
            Aggregation::Sum => "sum",
            Aggregation::Last => "last",
            Aggregation::First => "first",
        }
    }

    /// Parse, treating unknown values as `mean`
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            warn!(aggregation = %value, "Unknown aggregation, using mean");
            Aggregation::Mean
        })
    }

    /// Shape a synthetic observation. Statistic aggregations get all four
    /// derived fields; the others keep the plain value.
    pub fn shape_mock(&self, point: TimePoint) -> SeriesPoint {
        if self.plan().is_statistic() {
            SeriesPoint::Statistic(StatisticPoint::from_mock(&point))
        } else {
            SeriesPoint::Time(point)
        }
    }

    /// Shape a live bucket value under this aggregation's result field
    pub fn shape_live(&self, timestamp: String, value: PointValue) -> SeriesPoint {
        let plan = self.plan();
        if plan.is_statistic() {
            SeriesPoint::Statistic(StatisticPoint::with_field(
                timestamp,
                plan.result_field,
                value.as_f64(),
            ))
        } else {
            SeriesPoint::Time(TimePoint { timestamp, value })
        }
    }
}

impl FromStr for Aggregation {
    type Err = HistoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Aggregation::ALL
            .into_iter()
            .find(|aggregation| aggregation.as_str() == s)
            .ok_or_else(|| {
                HistoryError::validation(format!(
                    "Invalid aggregation '{s}'. Expected one of: raw, mean, min, max, sum, last, first"
                ))
            })
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

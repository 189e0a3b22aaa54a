//! Series core: requests, results, and resolution against a data source
//!
//! Resolution never fails once the window has been validated. A missing source,
//! a failing source, an unknown identifier, and an empty result all end in the
//! mock generator, reported through `mock: true`.

pub mod aggregation;
pub mod interval;
pub mod mock;
pub mod point;
pub mod range;

pub use aggregation::{Aggregation, AggregationPlan};
pub use interval::{Interval, StatisticsPeriod};
pub use mock::{generate_mock_series, MockSeriesGenerator, MockWindowPolicy, MAX_MOCK_POINTS};
pub use point::{PointValue, SeriesPoint, StatisticPoint, TimePoint};
pub use range::{parse_timestamp, DateRange, DateRangeValidator};

use crate::source::{
    HistoryQuery, HistoryRow, HistorySource, RowValue, StatisticMeta, StatisticsQuery,
};
use point::format_timestamp;
use serde::Serialize;
use tracing::{debug, warn};

/// A validated history request
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRequest {
    /// Entity or statistic identifier
    pub id: String,
    pub range: DateRange,
    pub interval: Interval,
    pub aggregation: Aggregation,
}

/// A validated statistics request
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsRequest {
    pub id: String,
    pub range: DateRange,
    pub period: StatisticsPeriod,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesResult {
    pub id: String,
    /// Chronological, start-inclusive, end-exclusive
    pub series: Vec<SeriesPoint>,
    pub count: usize,
    pub mock: bool,
}

impl SeriesResult {
    pub fn new(id: impl Into<String>, series: Vec<SeriesPoint>, mock: bool) -> Self {
        Self {
            id: id.into(),
            count: series.len(),
            series,
            mock,
        }
    }
}

/// Statistics series plus whatever metadata the source knew
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsResult {
    pub result: SeriesResult,
    pub meta: Option<StatisticMeta>,
}

/// Resolve a history request against `source`, or synthesize it
pub async fn resolve_history(
    source: Option<&dyn HistorySource>,
    generator: &MockSeriesGenerator,
    request: &SeriesRequest,
    limit: u32,
) -> SeriesResult {
    if let Some(source) = source {
        let query = HistoryQuery {
            entity_id: request.id.clone(),
            range: request.range,
            interval: request.interval,
            aggregation: request.aggregation,
            limit,
        };

        match source.fetch_history(&query).await {
            Ok(rows) if !rows.is_empty() => {
                let series = rows
                    .into_iter()
                    .map(|row| shape_row(request.aggregation, row))
                    .collect();
                return SeriesResult::new(request.id.clone(), series, false);
            }
            Ok(_) => {
                debug!(entity_id = %request.id, "No history rows, using mock data");
            }
            Err(e) => {
                warn!(entity_id = %request.id, error = %e, "History query failed, using mock data");
            }
        }
    }

    let series = generator
        .generate_window(&request.range, request.interval)
        .into_iter()
        .map(|point| request.aggregation.shape_mock(point))
        .collect();
    SeriesResult::new(request.id.clone(), series, true)
}

/// Resolve a statistics request against `source`, or synthesize it
pub async fn resolve_statistics(
    source: Option<&dyn HistorySource>,
    generator: &MockSeriesGenerator,
    request: &StatisticsRequest,
    limit: u32,
) -> StatisticsResult {
    if let Some(source) = source {
        let query = StatisticsQuery {
            statistic_id: request.id.clone(),
            range: request.range,
            period: request.period,
            limit,
        };

        match source.fetch_statistics(&query).await {
            Ok(Some(stats)) if !stats.rows.is_empty() => {
                let series = stats
                    .rows
                    .into_iter()
                    .map(|row| {
                        SeriesPoint::Statistic(StatisticPoint {
                            timestamp: format_timestamp(row.timestamp),
                            mean: row.mean,
                            min: row.min,
                            max: row.max,
                            sum: row.sum,
                        })
                    })
                    .collect();
                return StatisticsResult {
                    result: SeriesResult::new(request.id.clone(), series, false),
                    meta: Some(stats.meta),
                };
            }
            Ok(Some(_)) => {
                debug!(statistic_id = %request.id, "No statistics rows, using mock data");
            }
            Ok(None) => {
                debug!(statistic_id = %request.id, "Unknown statistic, using mock data");
            }
            Err(e) => {
                warn!(statistic_id = %request.id, error = %e, "Statistics query failed, using mock data");
            }
        }
    }

    let series = generator
        .generate_window(&request.range, request.period.mock_interval())
        .iter()
        .map(|point| SeriesPoint::Statistic(StatisticPoint::from_mock(point)))
        .collect();
    StatisticsResult {
        result: SeriesResult::new(request.id.clone(), series, true),
        meta: None,
    }
}

fn shape_row(aggregation: Aggregation, row: HistoryRow) -> SeriesPoint {
    let value = match row.value {
        RowValue::State(state) => PointValue::from_state(&state),
        RowValue::Numeric(number) => PointValue::Number(number),
    };
    aggregation.shape_live(format_timestamp(row.timestamp), value)
}

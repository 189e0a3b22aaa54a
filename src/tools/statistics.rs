//! `get_statistics`: long-term statistics for one statistic id

use super::{query_time, require_id, ToolContext};
use crate::error::Result;
use crate::series::{resolve_statistics, SeriesResult, StatisticsPeriod, StatisticsRequest};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct GetStatisticsArgs {
    pub statistic_id: String,
    pub start: String,
    pub end: String,
    #[serde(default = "default_period")]
    pub period: String,
}

fn default_period() -> String {
    StatisticsPeriod::default().as_str().to_string()
}

#[derive(Debug, Serialize)]
struct StatisticsResponse {
    statistic_id: String,
    #[serde(flatten)]
    result: SeriesResult,
    period: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit: Option<String>,
    query_time: String,
}

pub async fn get_statistics(ctx: &ToolContext, args: GetStatisticsArgs) -> Result<Value> {
    require_id("statistic_id", &args.statistic_id)?;
    info!(
        statistic_id = %args.statistic_id,
        start = %args.start,
        end = %args.end,
        period = %args.period,
        "get_statistics"
    );

    let range = ctx.validator.validate(&args.start, &args.end)?;
    let period: StatisticsPeriod = args.period.parse()?;

    let request = StatisticsRequest {
        id: args.statistic_id.clone(),
        range,
        period,
    };
    let resolved = resolve_statistics(
        ctx.source(),
        &ctx.generator,
        &request,
        ctx.config.query.max_rows,
    )
    .await;

    let (source, unit) = resolved
        .meta
        .map(|meta| (meta.source, meta.unit))
        .unwrap_or_default();

    let response = StatisticsResponse {
        statistic_id: args.statistic_id,
        result: resolved.result,
        period: period.as_str(),
        source,
        unit,
        query_time: query_time(),
    };
    Ok(serde_json::to_value(response)?)
}

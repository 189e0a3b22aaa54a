//! `get_history`: state history for one entity

use super::{query_time, require_id, ToolContext};
use crate::error::Result;
use crate::series::{resolve_history, Aggregation, Interval, SeriesRequest, SeriesResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct GetHistoryArgs {
    pub entity_id: String,
    pub start: String,
    pub end: String,
    #[serde(default = "default_interval")]
    pub interval: String,
    #[serde(default = "default_aggregation")]
    pub aggregation: String,
}

fn default_interval() -> String {
    Interval::default().as_str().to_string()
}

fn default_aggregation() -> String {
    Aggregation::default().as_str().to_string()
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    entity_id: String,
    #[serde(flatten)]
    result: SeriesResult,
    interval: &'static str,
    aggregation: &'static str,
    query_time: String,
}

/// Resolve `interval`/`aggregation`. `interval = "raw"` requests raw rows.
pub fn select_bucketing(interval: &str, aggregation: &str) -> (Interval, Aggregation) {
    if interval == "raw" {
        return (Interval::default(), Aggregation::Raw);
    }
    (
        Interval::parse_lenient(interval),
        Aggregation::parse_lenient(aggregation),
    )
}

pub async fn get_history(ctx: &ToolContext, args: GetHistoryArgs) -> Result<Value> {
    require_id("entity_id", &args.entity_id)?;
    info!(
        entity_id = %args.entity_id,
        start = %args.start,
        end = %args.end,
        "get_history"
    );

    let range = ctx.validator.validate(&args.start, &args.end)?;
    let (interval, aggregation) = select_bucketing(&args.interval, &args.aggregation);

    let request = SeriesRequest {
        id: args.entity_id.clone(),
        range,
        interval,
        aggregation,
    };
    let result = resolve_history(
        ctx.source(),
        &ctx.generator,
        &request,
        ctx.config.query.max_rows,
    )
    .await;

    let response = HistoryResponse {
        entity_id: args.entity_id,
        result,
        interval: if aggregation == Aggregation::Raw {
            "raw"
        } else {
            interval.as_str()
        },
        aggregation: aggregation.as_str(),
        query_time: query_time(),
    };
    Ok(serde_json::to_value(response)?)
}

//! `list_entities`: entities with recent states and known statistics

use super::{query_time, ToolContext};
use crate::error::{HistoryError, Result};
use crate::series::point::format_timestamp;
use crate::source::{Catalog, CatalogQuery, EntitySummary, StatisticSummary};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = 500;

/// Entities count as present if they recorded a state this recently
const RECENT_DAYS: i64 = 7;

const MOCK_ENTITIES: [&str; 4] = [
    "sensor.temperature",
    "sensor.humidity",
    "sensor.pressure",
    "binary_sensor.door",
];

const MOCK_STATISTICS: [(&str, &str); 2] = [("sensor.temperature", "°C"), ("sensor.humidity", "%")];

#[derive(Debug, Clone, Deserialize)]
pub struct ListEntitiesArgs {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub entity_type: Option<String>,
}

fn default_limit() -> i64 {
    i64::from(DEFAULT_LIMIT)
}

#[derive(Debug, Serialize)]
struct EntitiesResponse {
    entities: Vec<EntitySummary>,
    statistics: Vec<StatisticSummary>,
    entity_count: usize,
    statistic_count: usize,
    mock: bool,
    query_time: String,
}

/// The fixed catalog served without a database
pub fn mock_catalog(now: DateTime<Utc>, entity_type: Option<&str>, limit: usize) -> Catalog {
    let prefix = entity_type.map(|t| format!("{t}."));
    let matches = |id: &str| prefix.as_deref().map_or(true, |p| id.starts_with(p));
    let last_seen = format_timestamp(now);

    Catalog {
        entities: MOCK_ENTITIES
            .iter()
            .filter(|id| matches(**id))
            .take(limit)
            .map(|id| EntitySummary {
                entity_id: (*id).to_string(),
                last_seen: last_seen.clone(),
            })
            .collect(),
        statistics: MOCK_STATISTICS
            .iter()
            .filter(|entry| matches(entry.0))
            .take(limit)
            .map(|(id, unit)| StatisticSummary {
                statistic_id: (*id).to_string(),
                unit: Some((*unit).to_string()),
                source: Some("recorder".to_string()),
            })
            .collect(),
    }
}

pub async fn list_entities(ctx: &ToolContext, args: ListEntitiesArgs) -> Result<Value> {
    let limit = u32::try_from(args.limit)
        .ok()
        .filter(|limit| (1..=MAX_LIMIT).contains(limit))
        .ok_or_else(|| {
            HistoryError::validation(format!(
                "limit must be between 1 and {MAX_LIMIT}, got {}",
                args.limit
            ))
        })?;
    let entity_type = args
        .entity_type
        .map(|t| t.trim().trim_end_matches('.').to_string())
        .filter(|t| !t.is_empty());
    info!(limit, entity_type = ?entity_type, "list_entities");

    let now = Utc::now();
    let live = match ctx.source() {
        Some(source) => {
            let query = CatalogQuery {
                limit,
                entity_type: entity_type.clone(),
                since: now - Duration::days(RECENT_DAYS),
            };
            match source.list_entities(&query).await {
                Ok(catalog) => Some(catalog),
                Err(e) => {
                    warn!(error = %e, "Entity listing failed, using mock catalog");
                    None
                }
            }
        }
        None => None,
    };

    let mock = live.is_none();
    let catalog =
        live.unwrap_or_else(|| mock_catalog(now, entity_type.as_deref(), limit as usize));

    let response = EntitiesResponse {
        entity_count: catalog.entities.len(),
        statistic_count: catalog.statistics.len(),
        entities: catalog.entities,
        statistics: catalog.statistics,
        mock,
        query_time: query_time(),
    };
    Ok(serde_json::to_value(response)?)
}

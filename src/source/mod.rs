//! Recorder data sources
//!
//! [`HistorySource`] is the seam between the tools and the database. The
//! PostgreSQL implementation lives in [`postgres`]; tests use
//! `crate::mock::MockHistorySource`.

#[cfg(feature = "postgres")]
pub mod postgres;
pub mod sql;

use crate::error::Result;
use crate::series::{Aggregation, DateRange, Interval, StatisticsPeriod};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "postgres")]
pub use postgres::PostgresSource;

/// Parameters for a state-history query
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryQuery {
    pub entity_id: String,
    pub range: DateRange,
    pub interval: Interval,
    pub aggregation: Aggregation,
    /// Row cap
    pub limit: u32,
}

/// Value column of a history row
#[derive(Debug, Clone, PartialEq)]
pub enum RowValue {
    /// Raw recorder state text
    State(String),
    /// Bucket result
    Numeric(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub timestamp: DateTime<Utc>,
    pub value: RowValue,
}

/// Parameters for a statistics query
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsQuery {
    pub statistic_id: String,
    pub range: DateRange,
    pub period: StatisticsPeriod,
    pub limit: u32,
}

/// Row from `statistics_meta`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticMeta {
    pub statistic_id: String,
    pub source: Option<String>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatisticRow {
    pub timestamp: DateTime<Utc>,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub sum: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsSeries {
    pub meta: StatisticMeta,
    pub rows: Vec<StatisticRow>,
}

/// Parameters for the entity/statistic listing
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogQuery {
    pub limit: u32,
    /// Domain prefix such as `sensor`
    pub entity_type: Option<String>,
    /// Only entities with a state recorded after this instant
    pub since: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub entity_id: String,
    pub last_seen: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticSummary {
    pub statistic_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub entities: Vec<EntitySummary>,
    pub statistics: Vec<StatisticSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseHealth {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timescaledb: Option<bool>,
}

/// Read access to the Home Assistant recorder
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// State history for one entity. Unknown entities yield no rows.
    async fn fetch_history(&self, query: &HistoryQuery) -> Result<Vec<HistoryRow>>;

    /// Statistics rows plus metadata, or `None` for an unknown statistic
    async fn fetch_statistics(&self, query: &StatisticsQuery) -> Result<Option<StatisticsSeries>>;

    async fn list_entities(&self, query: &CatalogQuery) -> Result<Catalog>;

    async fn health(&self) -> Result<DatabaseHealth>;

    /// Release connections on shutdown
    async fn close(&self) {}
}

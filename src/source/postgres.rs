//! PostgreSQL recorder source backed by an `sqlx` pool

use super::sql;
use super::{
    Catalog, CatalogQuery, DatabaseHealth, EntitySummary, HistoryQuery, HistoryRow, HistorySource,
    RowValue, StatisticMeta, StatisticRow, StatisticSummary, StatisticsQuery, StatisticsSeries,
};
use crate::config::ServerConfig;
use crate::error::Result;
use crate::series::point::format_timestamp;
use crate::series::Aggregation;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::{debug, info, warn};

#[derive(sqlx::FromRow)]
struct StateRow {
    ts: DateTime<Utc>,
    state: Option<String>,
}

#[derive(sqlx::FromRow)]
struct BucketRow {
    ts: DateTime<Utc>,
    value: Option<f64>,
}

#[derive(sqlx::FromRow)]
struct MetaRow {
    id: i64,
    statistic_id: String,
    source: Option<String>,
    unit_of_measurement: Option<String>,
}

#[derive(sqlx::FromRow)]
struct StatisticsRow {
    ts: DateTime<Utc>,
    mean: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
    sum: Option<f64>,
}

#[derive(sqlx::FromRow)]
struct EntityRow {
    entity_id: String,
    last_seen: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct StatisticIdRow {
    statistic_id: String,
    source: Option<String>,
    unit_of_measurement: Option<String>,
}

/// Recorder tables the tools read from
const EXPECTED_TABLES: [&str; 5] = [
    "states",
    "states_meta",
    "statistics",
    "statistics_short_term",
    "statistics_meta",
];

/// Per-connection settings: statement timeout and, when configured, read-only transactions
fn session_options(config: &ServerConfig) -> Vec<(&'static str, String)> {
    let mut session = vec![(
        "statement_timeout",
        config.query_timeout().as_millis().to_string(),
    )];
    if config.database.read_only {
        session.push(("default_transaction_read_only", "on".to_string()));
    }
    session
}

pub struct PostgresSource {
    pool: PgPool,
    timescaledb: bool,
}

impl PostgresSource {
    /// Open the pool and probe the recorder schema
    pub async fn connect(config: &ServerConfig) -> Result<Self> {
        let database = &config.database;
        let timeout = config.query_timeout();

        let mut options = PgConnectOptions::new()
            .host(&database.host)
            .port(database.port)
            .database(&database.name)
            .username(&database.user)
            .application_name(&database.application_name)
            .options(session_options(config));
        if let Some(password) = &database.password {
            options = options.password(password);
        }

        info!(
            host = %database.host,
            port = database.port,
            database = %database.name,
            "Connecting to recorder database"
        );

        let pool = PgPoolOptions::new()
            .min_connections(database.pool_min)
            .max_connections(database.pool_max)
            .acquire_timeout(timeout)
            .connect_with(options)
            .await?;

        let source = Self {
            pool,
            timescaledb: database.timescaledb,
        };
        source.probe_schema().await?;

        if database.read_only {
            info!("Read-only mode enabled");
        }
        Ok(source)
    }

    async fn probe_schema(&self) -> Result<()> {
        let version: String = sqlx::query_scalar(sql::SERVER_VERSION)
            .fetch_one(&self.pool)
            .await?;
        info!(%version, "Database connection established");

        let found: Vec<String> = sqlx::query_scalar(sql::RECORDER_TABLES)
            .fetch_all(&self.pool)
            .await?;
        let missing: Vec<&str> = EXPECTED_TABLES
            .iter()
            .copied()
            .filter(|table| !found.iter().any(|f| f == table))
            .collect();
        if missing.is_empty() {
            info!(tables = ?found, "Recorder tables present");
        } else {
            warn!(?missing, "Recorder tables missing, affected queries will use mock data");
        }

        if self.timescaledb {
            match self.timescaledb_installed().await {
                Ok(true) => info!("TimescaleDB extension found"),
                Ok(false) => warn!("TimescaleDB enabled but the extension is not installed"),
                Err(e) => warn!(error = %e, "Could not check for TimescaleDB"),
            }
        }
        Ok(())
    }

    async fn timescaledb_installed(&self) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(sql::TIMESCALEDB_INSTALLED)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }
}

#[async_trait]
impl HistorySource for PostgresSource {
    async fn fetch_history(&self, query: &HistoryQuery) -> Result<Vec<HistoryRow>> {
        let metadata_id: Option<i64> = sqlx::query_scalar(sql::ENTITY_METADATA_ID)
            .bind(&query.entity_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(metadata_id) = metadata_id else {
            debug!(entity_id = %query.entity_id, "Entity not found in states_meta");
            return Ok(Vec::new());
        };

        let statement = sql::history_query(query.aggregation, query.interval, self.timescaledb);
        let limit = i64::from(query.limit);

        if query.aggregation == Aggregation::Raw {
            let rows: Vec<StateRow> = sqlx::query_as(&statement)
                .bind(metadata_id)
                .bind(query.range.start_epoch())
                .bind(query.range.end_epoch())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;
            Ok(rows
                .into_iter()
                .filter_map(|row| {
                    row.state.map(|state| HistoryRow {
                        timestamp: row.ts,
                        value: RowValue::State(state),
                    })
                })
                .collect())
        } else {
            let rows: Vec<BucketRow> = sqlx::query_as(&statement)
                .bind(metadata_id)
                .bind(query.range.start_epoch())
                .bind(query.range.end_epoch())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;
            Ok(rows
                .into_iter()
                .filter_map(|row| {
                    row.value.map(|value| HistoryRow {
                        timestamp: row.ts,
                        value: RowValue::Numeric(value),
                    })
                })
                .collect())
        }
    }

    async fn fetch_statistics(&self, query: &StatisticsQuery) -> Result<Option<StatisticsSeries>> {
        let meta: Option<MetaRow> = sqlx::query_as(sql::STATISTIC_META)
            .bind(&query.statistic_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(meta) = meta else {
            debug!(statistic_id = %query.statistic_id, "Statistic not found in statistics_meta");
            return Ok(None);
        };

        let rows: Vec<StatisticsRow> = sqlx::query_as(&sql::statistics_query(query.period))
            .bind(meta.id)
            .bind(query.range.start_epoch())
            .bind(query.range.end_epoch())
            .bind(i64::from(query.limit))
            .fetch_all(&self.pool)
            .await?;

        Ok(Some(StatisticsSeries {
            meta: StatisticMeta {
                statistic_id: meta.statistic_id,
                source: meta.source,
                unit: meta.unit_of_measurement,
            },
            rows: rows
                .into_iter()
                .map(|row| StatisticRow {
                    timestamp: row.ts,
                    mean: row.mean,
                    min: row.min,
                    max: row.max,
                    sum: row.sum,
                })
                .collect(),
        }))
    }

    async fn list_entities(&self, query: &CatalogQuery) -> Result<Catalog> {
        let pattern = query.entity_type.as_deref().map(sql::like_prefix);
        let limit = i64::from(query.limit);
        let since = query.since.timestamp() as f64;

        let entities: Vec<EntityRow> = sqlx::query_as(sql::ENTITY_CATALOG)
            .bind(since)
            .bind(pattern.as_deref())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        let statistics: Vec<StatisticIdRow> = sqlx::query_as(sql::STATISTIC_CATALOG)
            .bind(pattern.as_deref())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(Catalog {
            entities: entities
                .into_iter()
                .map(|row| EntitySummary {
                    entity_id: row.entity_id,
                    last_seen: format_timestamp(row.last_seen),
                })
                .collect(),
            statistics: statistics
                .into_iter()
                .map(|row| StatisticSummary {
                    statistic_id: row.statistic_id,
                    unit: row.unit_of_measurement,
                    source: row.source,
                })
                .collect(),
        })
    }

    async fn health(&self) -> Result<DatabaseHealth> {
        let version: String = sqlx::query_scalar(sql::SERVER_VERSION)
            .fetch_one(&self.pool)
            .await?;

        let timescaledb = if self.timescaledb {
            Some(self.timescaledb_installed().await.unwrap_or(false))
        } else {
            None
        };

        Ok(DatabaseHealth {
            version,
            timescaledb,
        })
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("Database connection closed");
    }
}

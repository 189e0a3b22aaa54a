//! Mock implementations for testing
//!
//! [`MockHistorySource`] stands in for PostgreSQL so the tools, the dispatcher
//! and the transports can be exercised without a database.

use crate::error::{HistoryError, Result};
use crate::source::{
    Catalog, CatalogQuery, DatabaseHealth, HistoryQuery, HistoryRow, HistorySource,
    StatisticsQuery, StatisticsSeries,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory history source with canned answers
#[derive(Default)]
pub struct MockHistorySource {
    history: Vec<HistoryRow>,
    statistics: Option<StatisticsSeries>,
    catalog: Catalog,
    failing: bool,
    calls: AtomicUsize,
    last_history_query: Mutex<Option<HistoryQuery>>,
}

impl MockHistorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows returned by every history query
    pub fn with_history(mut self, rows: Vec<HistoryRow>) -> Self {
        self.history = rows;
        self
    }

    pub fn with_statistics(mut self, statistics: StatisticsSeries) -> Self {
        self.statistics = Some(statistics);
        self
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Make every call fail with a database error
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Number of trait calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_history_query(&self) -> Option<HistoryQuery> {
        self.last_history_query
            .lock()
            .ok()
            .and_then(|query| query.clone())
    }

    fn record(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            Err(HistoryError::database("mock source configured to fail"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl HistorySource for MockHistorySource {
    async fn fetch_history(&self, query: &HistoryQuery) -> Result<Vec<HistoryRow>> {
        if let Ok(mut last) = self.last_history_query.lock() {
            *last = Some(query.clone());
        }
        self.record()?;
        Ok(self
            .history
            .iter()
            .take(query.limit as usize)
            .cloned()
            .collect())
    }

    async fn fetch_statistics(&self, _query: &StatisticsQuery) -> Result<Option<StatisticsSeries>> {
        self.record()?;
        Ok(self.statistics.clone())
    }

    async fn list_entities(&self, query: &CatalogQuery) -> Result<Catalog> {
        self.record()?;
        let prefix = query.entity_type.as_ref().map(|t| format!("{t}."));
        let matches = |id: &str| prefix.as_deref().map_or(true, |p| id.starts_with(p));
        let limit = query.limit as usize;

        Ok(Catalog {
            entities: self
                .catalog
                .entities
                .iter()
                .filter(|e| matches(&e.entity_id))
                .take(limit)
                .cloned()
                .collect(),
            statistics: self
                .catalog
                .statistics
                .iter()
                .filter(|s| matches(&s.statistic_id))
                .take(limit)
                .cloned()
                .collect(),
        })
    }

    async fn health(&self) -> Result<DatabaseHealth> {
        self.record()?;
        Ok(DatabaseHealth {
            version: "PostgreSQL 16.4 (mock)".to_string(),
            timescaledb: None,
        })
    }
}

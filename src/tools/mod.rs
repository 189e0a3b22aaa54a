//! MCP tools
//!
//! Four read-only tools over the recorder: `get_history`, `get_statistics`,
//! `list_entities` and `health_check`. Each receives a [`ToolContext`] holding
//! the (optional) data source, so nothing here touches global state.

pub mod entities;
pub mod health;
pub mod history;
pub mod statistics;

use crate::config::ServerConfig;
use crate::error::{HistoryError, Result};
use crate::series::{DateRangeValidator, MockSeriesGenerator};
use crate::source::HistorySource;
use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Shared state handed to every tool call
#[derive(Clone)]
pub struct ToolContext {
    pub source: Option<Arc<dyn HistorySource>>,
    pub config: Arc<ServerConfig>,
    pub validator: DateRangeValidator,
    pub generator: MockSeriesGenerator,
}

impl ToolContext {
    pub fn new(config: Arc<ServerConfig>, source: Option<Arc<dyn HistorySource>>) -> Self {
        Self {
            validator: DateRangeValidator::new(config.query.max_query_days),
            generator: MockSeriesGenerator::new(config.query.mock_window),
            source,
            config,
        }
    }

    /// No database: every tool answers with mock data
    pub fn offline(config: ServerConfig) -> Self {
        Self::new(Arc::new(config), None)
    }

    pub fn source(&self) -> Option<&dyn HistorySource> {
        self.source.as_deref()
    }
}

/// Tool metadata as advertised by `tools/list`
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

pub const TOOL_NAMES: [&str; 4] = ["get_history", "get_statistics", "list_entities", "health_check"];

/// Definitions for every tool, in a stable order
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "get_history",
            description: "Query historical state data from Home Assistant recorder",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "entity_id": {
                        "type": "string",
                        "description": "The entity to query (e.g., 'sensor.temperature')"
                    },
                    "start": {
                        "type": "string",
                        "description": "Start datetime in ISO format"
                    },
                    "end": {
                        "type": "string",
                        "description": "End datetime in ISO format"
                    },
                    "interval": {
                        "type": "string",
                        "enum": ["raw", "5m", "15m", "30m", "1h", "6h", "1d"],
                        "description": "Time interval for aggregation ('raw' returns unbucketed states)",
                        "default": "1h"
                    },
                    "aggregation": {
                        "type": "string",
                        "enum": ["raw", "mean", "min", "max", "sum", "last", "first"],
                        "description": "Aggregation method",
                        "default": "mean"
                    }
                },
                "required": ["entity_id", "start", "end"]
            }),
        },
        ToolDefinition {
            name: "get_statistics",
            description: "Query aggregated statistics data from Home Assistant",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "statistic_id": {
                        "type": "string",
                        "description": "The statistic to query"
                    },
                    "start": {
                        "type": "string",
                        "description": "Start datetime in ISO format"
                    },
                    "end": {
                        "type": "string",
                        "description": "End datetime in ISO format"
                    },
                    "period": {
                        "type": "string",
                        "enum": ["5minute", "hour", "day", "month"],
                        "description": "Statistics period",
                        "default": "hour"
                    }
                },
                "required": ["statistic_id", "start", "end"]
            }),
        },
        ToolDefinition {
            name: "list_entities",
            description: "List available entities and statistics for querying",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of items to return",
                        "default": entities::DEFAULT_LIMIT,
                        "minimum": 1,
                        "maximum": entities::MAX_LIMIT
                    },
                    "entity_type": {
                        "type": "string",
                        "description": "Filter by entity type (e.g., 'sensor', 'binary_sensor')"
                    }
                }
            }),
        },
        ToolDefinition {
            name: "health_check",
            description: "Check server and database health status",
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
    ]
}

/// Run a tool by name
pub async fn call_tool(ctx: &ToolContext, name: &str, arguments: Value) -> Result<Value> {
    info!(tool = name, "Tool called");
    debug!(tool = name, arguments = %arguments, "Tool arguments");

    match name {
        "get_history" => history::get_history(ctx, parse_arguments(arguments)?).await,
        "get_statistics" => statistics::get_statistics(ctx, parse_arguments(arguments)?).await,
        "list_entities" => entities::list_entities(ctx, parse_arguments(arguments)?).await,
        "health_check" => health::health_check(ctx).await,
        other => Err(HistoryError::not_found(format!("Unknown tool: {other}"))),
    }
}

/// Deserialize tool arguments; a missing object counts as empty
fn parse_arguments<T: DeserializeOwned>(arguments: Value) -> Result<T> {
    let arguments = if arguments.is_null() {
        json!({})
    } else {
        arguments
    };
    serde_json::from_value(arguments)
        .map_err(|e| HistoryError::validation(format!("Invalid arguments: {e}")))
}

/// Reject blank identifiers
fn require_id(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(HistoryError::validation(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}

fn query_time() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ToolContext {
        ToolContext::offline(ServerConfig::default())
    }

    #[test]
    fn test_definitions_match_names() {
        let names: Vec<&str> = tool_definitions().iter().map(|t| t.name).collect();
        assert_eq!(names, TOOL_NAMES);
        let json = serde_json::to_value(tool_definitions()).unwrap();
        assert!(json[0].get("inputSchema").is_some());
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let err = call_tool(&ctx(), "set_state", json!({})).await.unwrap_err();
        assert!(matches!(err, HistoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_required_argument() {
        let err = call_tool(&ctx(), "get_history", json!({"entity_id": "sensor.x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, HistoryError::Validation(_)));
    }

    #[tokio::test]
    async fn test_null_arguments_are_empty() {
        let value = call_tool(&ctx(), "list_entities", Value::Null).await.unwrap();
        assert_eq!(value["mock"], json!(true));
    }
}

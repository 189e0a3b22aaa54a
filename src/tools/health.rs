//! `health_check`: server and database status

use super::ToolContext;
use crate::error::Result;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

#[derive(Debug, Serialize)]
struct HealthReport {
    status: &'static str,
    version: &'static str,
    timestamp: String,
    database: DatabaseStatus,
    configuration: ConfigurationSummary,
}

#[derive(Debug, Serialize)]
struct DatabaseStatus {
    status: &'static str,
    info: Option<Value>,
}

#[derive(Debug, Serialize)]
struct ConfigurationSummary {
    read_only: bool,
    timescaledb: bool,
    query_timeout: u64,
    max_query_days: u32,
}

pub async fn health_check(ctx: &ToolContext) -> Result<Value> {
    let config = &ctx.config;

    let database = match ctx.source() {
        None => DatabaseStatus {
            status: "disconnected",
            info: None,
        },
        Some(source) => match source.health().await {
            Ok(health) => {
                let mut info = json!({
                    "version": health.version,
                    "host": config.database.host,
                    "database": config.database.name,
                    "read_only": config.database.read_only,
                });
                if let Some(timescaledb) = health.timescaledb {
                    info["timescaledb"] = json!(timescaledb);
                }
                DatabaseStatus {
                    status: "healthy",
                    info: Some(info),
                }
            }
            Err(e) => {
                warn!(error = %e, "Database health check failed");
                DatabaseStatus {
                    status: "unhealthy",
                    info: Some(json!({ "error": e.to_string() })),
                }
            }
        },
    };

    let report = HealthReport {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: super::query_time(),
        database,
        configuration: ConfigurationSummary {
            read_only: config.database.read_only,
            timescaledb: config.database.timescaledb,
            query_timeout: config.query.query_timeout_secs,
            max_query_days: config.query.max_query_days,
        },
    };
    Ok(serde_json::to_value(report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    #[tokio::test]
    async fn test_offline_health() {
        let ctx = ToolContext::offline(ServerConfig::default());
        let value = health_check(&ctx).await.unwrap();
        assert_eq!(value["status"], json!("ok"));
        assert_eq!(value["database"]["status"], json!("disconnected"));
        assert_eq!(value["database"]["info"], Value::Null);
        assert_eq!(value["configuration"]["max_query_days"], json!(90));
        assert_eq!(value["configuration"]["read_only"], json!(true));
    }
}

//! Tool behaviour against a live (mocked) history source: live rows, fallback
//! to synthetic data, metadata passthrough.

use chrono::{DateTime, Duration, Utc};
use ha_history_mcp::mock::MockHistorySource;
use ha_history_mcp::series::Aggregation;
use ha_history_mcp::source::{
    Catalog, EntitySummary, HistoryRow, HistorySource, RowValue, StatisticMeta, StatisticRow,
    StatisticSummary, StatisticsSeries,
};
use ha_history_mcp::{HistoryMcpServer, ServerConfig};
use pretty_assertions::assert_eq;
use rstest::*;
use serde_json::{json, Value};
use std::sync::Arc;

mod common;
use common::{history_args, test_config};

fn at(ts: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc)
}

fn serve(config: ServerConfig, source: &Arc<MockHistorySource>) -> HistoryMcpServer {
    HistoryMcpServer::with_source(config, Some(source.clone() as Arc<dyn HistorySource>))
}

fn six_hours() -> Value {
    history_args("2024-12-19T00:00:00Z", "2024-12-19T06:00:00Z")
}

#[rstest]
#[tokio::test]
async fn test_failing_source_falls_back_to_mock(test_config: ServerConfig) {
    let source = Arc::new(MockHistorySource::new().failing());
    let server = serve(test_config, &source);

    let output = server.call_tool("get_history", six_hours()).await.unwrap();

    assert_eq!(output["mock"], json!(true));
    assert_eq!(output["count"], json!(6));
    assert_eq!(source.calls(), 1);
}

#[rstest]
#[tokio::test]
async fn test_empty_history_falls_back_to_mock(test_config: ServerConfig) {
    let source = Arc::new(MockHistorySource::new());
    let server = serve(test_config, &source);

    let output = server.call_tool("get_history", six_hours()).await.unwrap();

    assert_eq!(output["mock"], json!(true));
    assert_eq!(output["series"][0]["timestamp"], json!("2024-12-19T00:00:00Z"));
}

#[rstest]
#[tokio::test]
async fn test_raw_rows_are_coerced(test_config: ServerConfig) {
    let source = Arc::new(MockHistorySource::new().with_history(vec![
        HistoryRow {
            timestamp: at("2024-12-19T00:12:30Z"),
            value: RowValue::State("21.5".to_string()),
        },
        HistoryRow {
            timestamp: at("2024-12-19T00:40:00Z"),
            value: RowValue::State("unavailable".to_string()),
        },
        HistoryRow {
            timestamp: at("2024-12-19T01:05:00Z"),
            value: RowValue::State("-3".to_string()),
        },
    ]));
    let server = serve(test_config, &source);

    let mut arguments = six_hours();
    arguments["interval"] = json!("raw");
    let output = server.call_tool("get_history", arguments).await.unwrap();

    assert_eq!(output["mock"], json!(false));
    assert_eq!(output["interval"], json!("raw"));
    assert_eq!(output["aggregation"], json!("raw"));
    assert_eq!(
        output["series"],
        json!([
            {"timestamp": "2024-12-19T00:12:30Z", "value": 21.5},
            {"timestamp": "2024-12-19T00:40:00Z", "value": "unavailable"},
            {"timestamp": "2024-12-19T01:05:00Z", "value": -3.0}
        ])
    );

    let query = source.last_history_query().unwrap();
    assert_eq!(query.entity_id, "sensor.temperature");
    assert_eq!(query.aggregation, Aggregation::Raw);
    assert_eq!(query.limit, 5000);
    assert_eq!(query.range.duration(), Duration::hours(6));
}

#[rstest]
#[case("max", "max")]
#[case("min", "min")]
#[case("sum", "sum")]
#[case("mean", "mean")]
#[case("last", "value")]
#[tokio::test]
async fn test_bucket_values_use_result_field(
    test_config: ServerConfig,
    #[case] aggregation: &str,
    #[case] field: &str,
) {
    let source = Arc::new(MockHistorySource::new().with_history(vec![HistoryRow {
        timestamp: at("2024-12-19T00:00:00Z"),
        value: RowValue::Numeric(22.25),
    }]));
    let server = serve(test_config, &source);

    let mut arguments = six_hours();
    arguments["aggregation"] = json!(aggregation);
    let output = server.call_tool("get_history", arguments).await.unwrap();

    assert_eq!(output["mock"], json!(false));
    assert_eq!(output["count"], json!(1));
    assert_eq!(output["series"][0][field], json!(22.25));
}

#[rstest]
#[tokio::test]
async fn test_statistics_carry_metadata(test_config: ServerConfig) {
    let source = Arc::new(MockHistorySource::new().with_statistics(StatisticsSeries {
        meta: StatisticMeta {
            statistic_id: "sensor.energy".to_string(),
            source: Some("recorder".to_string()),
            unit: Some("kWh".to_string()),
        },
        rows: vec![StatisticRow {
            timestamp: at("2024-12-01T00:00:00Z"),
            mean: None,
            min: None,
            max: None,
            sum: Some(1234.5),
        }],
    }));
    let server = serve(test_config, &source);

    let output = server
        .call_tool(
            "get_statistics",
            json!({
                "statistic_id": "sensor.energy",
                "start": "2024-12-01T00:00:00Z",
                "end": "2024-12-02T00:00:00Z",
                "period": "day"
            }),
        )
        .await
        .unwrap();

    assert_eq!(output["mock"], json!(false));
    assert_eq!(output["unit"], json!("kWh"));
    assert_eq!(output["source"], json!("recorder"));
    assert_eq!(output["period"], json!("day"));
    assert_eq!(
        output["series"],
        json!([{"timestamp": "2024-12-01T00:00:00Z", "sum": 1234.5}])
    );
}

#[rstest]
#[tokio::test]
async fn test_unknown_statistic_falls_back_to_mock(test_config: ServerConfig) {
    let source = Arc::new(MockHistorySource::new());
    let server = serve(test_config, &source);

    let output = server
        .call_tool(
            "get_statistics",
            json!({
                "statistic_id": "sensor.nothing",
                "start": "2024-12-01T00:00:00Z",
                "end": "2024-12-01T06:00:00Z"
            }),
        )
        .await
        .unwrap();

    assert_eq!(output["mock"], json!(true));
    assert_eq!(output["count"], json!(6));
    assert!(output.get("unit").is_none());
}

#[rstest]
#[tokio::test]
async fn test_live_catalog_is_filtered(test_config: ServerConfig) {
    let catalog = Catalog {
        entities: vec![
            EntitySummary {
                entity_id: "sensor.kitchen".to_string(),
                last_seen: "2024-12-19T00:00:00Z".to_string(),
            },
            EntitySummary {
                entity_id: "light.kitchen".to_string(),
                last_seen: "2024-12-19T00:00:00Z".to_string(),
            },
        ],
        statistics: vec![StatisticSummary {
            statistic_id: "sensor.kitchen".to_string(),
            unit: Some("°C".to_string()),
            source: Some("recorder".to_string()),
        }],
    };
    let source = Arc::new(MockHistorySource::new().with_catalog(catalog));
    let server = serve(test_config, &source);

    let output = server
        .call_tool("list_entities", json!({"entity_type": "sensor."}))
        .await
        .unwrap();

    assert_eq!(output["mock"], json!(false));
    assert_eq!(output["entity_count"], json!(1));
    assert_eq!(output["entities"][0]["entity_id"], json!("sensor.kitchen"));
    assert_eq!(output["statistic_count"], json!(1));
}

#[rstest]
#[tokio::test]
async fn test_failing_catalog_falls_back_to_mock(test_config: ServerConfig) {
    let source = Arc::new(MockHistorySource::new().failing());
    let server = serve(test_config, &source);

    let output = server
        .call_tool("list_entities", json!({"limit": 2}))
        .await
        .unwrap();

    assert_eq!(output["mock"], json!(true));
    assert_eq!(output["entity_count"], json!(2));
}

#[rstest]
#[tokio::test]
async fn test_health_reports_database(test_config: ServerConfig) {
    let healthy = Arc::new(MockHistorySource::new());
    let output = serve(test_config.clone(), &healthy)
        .call_tool("health_check", Value::Null)
        .await
        .unwrap();
    assert_eq!(output["database"]["status"], json!("healthy"));
    assert_eq!(output["database"]["info"]["version"], json!("PostgreSQL 16.4 (mock)"));
    assert_eq!(output["database"]["info"]["read_only"], json!(true));

    let failing = Arc::new(MockHistorySource::new().failing());
    let output = serve(test_config, &failing)
        .call_tool("health_check", Value::Null)
        .await
        .unwrap();
    assert_eq!(output["status"], json!("ok"));
    assert_eq!(output["database"]["status"], json!("unhealthy"));
}

#[rstest]
#[tokio::test]
async fn test_validation_happens_before_the_source(test_config: ServerConfig) {
    let source = Arc::new(MockHistorySource::new());
    let server = serve(test_config, &source);

    let result = server
        .call_tool(
            "get_history",
            history_args("2024-01-01T00:00:00Z", "2024-12-31T00:00:00Z"),
        )
        .await;

    assert!(result.is_err());
    assert_eq!(source.calls(), 0);
}

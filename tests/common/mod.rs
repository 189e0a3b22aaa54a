//! Common test utilities
//!
//! rstest fixtures and small helpers shared by the integration tests.

#![allow(dead_code)]

use ha_history_mcp::{HistoryMcpServer, ServerConfig};
use rstest::fixture;
use serde_json::{json, Value};

/// Environment variables the configuration layer reads, all unset
pub const CONFIG_ENV_VARS: [&str; 15] = [
    "PGHOST",
    "PGPORT",
    "PGDATABASE",
    "PGUSER",
    "PGPASSWORD",
    "MCP_READ_ONLY",
    "MCP_ENABLE_TIMESCALEDB",
    "MCP_QUERY_TIMEOUT",
    "MCP_MAX_QUERY_DAYS",
    "MCP_MOCK_WINDOW",
    "MCP_PORT",
    "LOG_LEVEL",
    "MCP_LOG_FILE",
    "MCP_LOG_JSON",
    "RUST_LOG",
];

/// Default configuration
#[fixture]
pub fn test_config() -> ServerConfig {
    ServerConfig::default()
}

/// Server without a database
#[fixture]
pub fn offline_server(test_config: ServerConfig) -> HistoryMcpServer {
    HistoryMcpServer::offline(test_config)
}

pub fn request(id: i64, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params
    })
}

pub fn tool_call(id: i64, name: &str, arguments: Value) -> Value {
    request(id, "tools/call", json!({ "name": name, "arguments": arguments }))
}

/// Decode the JSON text carried in a `tools/call` result
pub fn tool_output(response: &Value) -> Value {
    let text = response["result"]["content"][0]["text"]
        .as_str()
        .expect("tool result should carry text content");
    serde_json::from_str(text).expect("tool text should be JSON")
}

pub fn history_args(start: &str, end: &str) -> Value {
    json!({
        "entity_id": "sensor.temperature",
        "start": start,
        "end": end
    })
}

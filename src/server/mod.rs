//! MCP server: JSON-RPC dispatch shared by every transport

pub mod protocol;
pub mod stdio;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::source::HistorySource;
use crate::tools::{self, ToolContext};
use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

pub const SERVER_NAME: &str = "ha-mcp-server";

/// Transport-independent MCP server
#[derive(Clone)]
pub struct HistoryMcpServer {
    ctx: Arc<ToolContext>,
}

impl HistoryMcpServer {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    pub fn with_source(config: ServerConfig, source: Option<Arc<dyn HistorySource>>) -> Self {
        Self::new(ToolContext::new(Arc::new(config), source))
    }

    /// Server that always answers with mock data
    pub fn offline(config: ServerConfig) -> Self {
        Self::new(ToolContext::offline(config))
    }

    pub fn context(&self) -> &ToolContext {
        &self.ctx
    }

    /// Run a tool directly, bypassing JSON-RPC framing
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        tools::call_tool(&self.ctx, name, arguments).await
    }

    /// Handle one JSON-RPC message (object or batch). `None` means nothing is
    /// sent back.
    pub async fn handle_message(&self, message: Value) -> Option<Value> {
        match message {
            Value::Array(batch) => {
                if batch.is_empty() {
                    return Some(
                        JsonRpcResponse::failure(
                            Value::Null,
                            JsonRpcError::invalid_request("empty batch"),
                        )
                        .into_value(),
                    );
                }
                let mut responses = Vec::with_capacity(batch.len());
                for item in batch {
                    if let Some(response) = self.handle_single(item).await {
                        responses.push(response);
                    }
                }
                (!responses.is_empty()).then_some(Value::Array(responses))
            }
            other => self.handle_single(other).await,
        }
    }

    async fn handle_single(&self, message: Value) -> Option<Value> {
        let id = message.get("id").cloned().unwrap_or(Value::Null);

        let request: JsonRpcRequest = match serde_json::from_value(message) {
            Ok(request) => request,
            Err(e) => {
                return Some(
                    JsonRpcResponse::failure(id, JsonRpcError::invalid_request(e)).into_value(),
                );
            }
        };

        if request.jsonrpc != "2.0" {
            return Some(
                JsonRpcResponse::failure(
                    id,
                    JsonRpcError::invalid_request(format!(
                        "unsupported jsonrpc version '{}'",
                        request.jsonrpc
                    )),
                )
                .into_value(),
            );
        }

        if request.is_notification() {
            debug!(method = %request.method, "Notification received");
            return None;
        }

        let response = match self.dispatch(&request.method, request.params).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => {
                if error.code == protocol::INTERNAL_ERROR {
                    warn!(method = %request.method, error = %error.message, "Request failed");
                }
                JsonRpcResponse::failure(id, error)
            }
        };
        Some(response.into_value())
    }

    async fn dispatch(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> std::result::Result<Value, JsonRpcError> {
        debug!(method, "Dispatching request");
        match method {
            "initialize" => Ok(self.initialize_result()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": tools::tool_definitions() })),
            "tools/call" => self.handle_tool_call(params).await,
            "resources/list" => Ok(json!({ "resources": [] })),
            "prompts/list" => Ok(json!({ "prompts": [] })),
            other => Err(JsonRpcError::method_not_found(other)),
        }
    }

    fn initialize_result(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "listChanged": false },
                "resources": {},
                "prompts": {},
                "logging": {}
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            },
            "instructions": "Read-only access to Home Assistant recorder history and statistics. \
                Use list_entities to discover ids, then get_history or get_statistics."
        })
    }

    async fn handle_tool_call(
        &self,
        params: Option<Value>,
    ) -> std::result::Result<Value, JsonRpcError> {
        let params = params.unwrap_or(Value::Null);
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| JsonRpcError::invalid_params("missing tool name"))?;
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        let output = tools::call_tool(&self.ctx, name, arguments).await?;
        let text = serde_json::to_string_pretty(&output)
            .map_err(|e| JsonRpcError::new(protocol::INTERNAL_ERROR, e.to_string()))?;

        Ok(json!({
            "content": [{ "type": "text", "text": text }],
            "isError": false
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> HistoryMcpServer {
        HistoryMcpServer::offline(ServerConfig::default())
    }

    #[tokio::test]
    async fn test_ping() {
        let response = server()
            .handle_message(json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}))
            .await
            .unwrap();
        assert_eq!(response["id"], json!(1));
        assert_eq!(response["result"], json!({}));
    }

    #[tokio::test]
    async fn test_wrong_version() {
        let response = server()
            .handle_message(json!({"jsonrpc": "1.0", "id": 1, "method": "ping"}))
            .await
            .unwrap();
        assert_eq!(response["error"]["code"], json!(protocol::INVALID_REQUEST));
    }

    #[tokio::test]
    async fn test_missing_method() {
        let response = server()
            .handle_message(json!({"jsonrpc": "2.0", "id": "a"}))
            .await
            .unwrap();
        assert_eq!(response["id"], json!("a"));
        assert_eq!(response["error"]["code"], json!(protocol::INVALID_REQUEST));
    }

    #[tokio::test]
    async fn test_tool_call_without_name() {
        let response = server()
            .handle_message(json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call", "params": {}}))
            .await
            .unwrap();
        assert_eq!(response["error"]["code"], json!(protocol::INVALID_PARAMS));
    }

    #[tokio::test]
    async fn test_batch_of_notifications_is_silent() {
        let response = server()
            .handle_message(json!([
                {"jsonrpc": "2.0", "method": "notifications/initialized"},
                {"jsonrpc": "2.0", "method": "notifications/cancelled", "params": {}}
            ]))
            .await;
        assert!(response.is_none());
    }
}

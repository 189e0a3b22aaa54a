//! HTTP/SSE transport
//!
//! JSON-RPC over `POST /message` (and `/messages`), the legacy SSE handshake on
//! `GET /sse` and `GET /mcp/sse`, plus a few plain REST helpers for curl and
//! dashboards: `/health`, `/mcp/tools`, `/mcp/call`.

pub mod sse;

use crate::config::HttpConfig;
use crate::error::{HistoryError, Result};
use crate::server::protocol::{JsonRpcError, JsonRpcResponse};
use crate::server::{HistoryMcpServer, SERVER_NAME};
use crate::tools::{self, TOOL_NAMES};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use sse::SseSessionManager;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};

/// Application state shared across all HTTP handlers
#[derive(Clone)]
struct AppState {
    server: HistoryMcpServer,
    sessions: SseSessionManager,
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    session_id: Option<String>,
}

/// Body of `POST /mcp/call`
#[derive(Debug, Deserialize)]
struct ToolCallBody {
    name: String,
    #[serde(default)]
    arguments: Value,
}

pub struct HttpTransportServer {
    server: HistoryMcpServer,
    config: HttpConfig,
    sessions: SseSessionManager,
}

impl HttpTransportServer {
    pub fn new(server: HistoryMcpServer, config: HttpConfig) -> Self {
        Self {
            server,
            config,
            sessions: SseSessionManager::new(),
        }
    }

    /// Build the router with all endpoints
    pub fn router(&self) -> Router {
        let state = Arc::new(AppState {
            server: self.server.clone(),
            sessions: self.sessions.clone(),
        });

        let app = Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/mcp/tools", get(list_tools))
            .route("/mcp/call", post(call_tool))
            .route("/message", post(handle_mcp_message))
            .route("/messages", post(handle_mcp_message))
            .route("/sse", get(sse_handler))
            .route("/mcp/sse", get(sse_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            app.layer(CorsLayer::permissive())
        } else {
            app
        }
    }

    /// Serve until Ctrl-C
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(shutdown_signal()).await
    }

    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let address = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            HistoryError::connection(format!("Failed to bind to {address}: {e}"))
        })?;

        info!(%address, cors = self.config.enable_cors, "HTTP MCP server listening");
        info!("MCP endpoint: POST /message, SSE: GET /sse, health: GET /health");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| HistoryError::connection(format!("HTTP server error: {e}")))?;

        info!("HTTP server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "name": SERVER_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "description": "MCP server for Home Assistant recorder history and statistics",
        "tools": TOOL_NAMES,
        "endpoints": {
            "message": "POST /message",
            "sse": "GET /sse",
            "health": "GET /health",
            "tools": "GET /mcp/tools",
            "call": "POST /mcp/call"
        }
    }))
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    debug!("Health check requested");
    match state.server.call_tool("health_check", Value::Null).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e),
    }
}

async fn list_tools() -> impl IntoResponse {
    Json(json!({ "tools": tools::tool_definitions() }))
}

async fn call_tool(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let body: ToolCallBody = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &HistoryError::validation(format!("Invalid request body: {e}")),
            );
        }
    };

    match state.server.call_tool(&body.name, body.arguments).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => {
            let status = match &e {
                HistoryError::NotFound(_) => StatusCode::NOT_FOUND,
                e if e.is_client_error() => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            error_response(status, &e)
        }
    }
}

/// JSON-RPC over HTTP POST
async fn handle_mcp_message(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MessageQuery>,
    body: Bytes,
) -> Response {
    let message: Value = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            let response =
                JsonRpcResponse::failure(Value::Null, JsonRpcError::parse_error(e)).into_value();
            return (StatusCode::BAD_REQUEST, Json(response)).into_response();
        }
    };

    let Some(response) = state.server.handle_message(message).await else {
        return StatusCode::NO_CONTENT.into_response();
    };

    if let Some(session_id) = query.session_id {
        match state
            .sessions
            .send_session_response(&session_id, response.clone())
            .await
        {
            Ok(()) => return StatusCode::NO_CONTENT.into_response(),
            Err(e) => {
                warn!(%session_id, error = %e, "Session unavailable, answering inline");
            }
        }
    }

    Json(response).into_response()
}

/// Session ids are always server-generated; query parameters are ignored
async fn sse_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let session_id = uuid::Uuid::new_v4().to_string();
    sse::session_stream(state.sessions.clone(), session_id).await
}

fn error_response(status: StatusCode, error: &HistoryError) -> Response {
    let code = error.to_error_code();
    (
        status,
        Json(json!({
            "error": error.to_string(),
            "code": code.as_number(),
            "category": code.category(),
        })),
    )
        .into_response()
}

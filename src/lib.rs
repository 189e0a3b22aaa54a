//! Home Assistant history MCP server
//!
//! Exposes the Home Assistant recorder (PostgreSQL) over the Model Context
//! Protocol as four read-only tools:
//!
//! - `get_history`: state history for an entity, raw or bucketed
//! - `get_statistics`: long-term statistics (5 minute, hour, day, month)
//! - `list_entities`: entities with recent states and known statistic ids
//! - `health_check`: server and database status
//!
//! Without a reachable database every tool answers with deterministic mock
//! data and says so with `mock: true`.

pub mod config;
pub mod error;
#[cfg(feature = "http-server")]
pub mod http_transport;
pub mod logging;
pub mod series;
pub mod server;
pub mod source;
pub mod tools;

// Test support modules - available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

// Re-export main types for convenience
pub use config::ServerConfig;
pub use error::{HistoryError, Result};
pub use server::HistoryMcpServer;

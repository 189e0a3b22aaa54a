//! Home Assistant history MCP server - main entry point
//!
//! Runs over stdio (Claude Desktop and other local clients) or HTTP with SSE.

use clap::{Parser, Subcommand};
use ha_history_mcp::{
    config::ServerConfig, logging::init_logging, server::stdio::serve_stdio,
    source::HistorySource, HistoryMcpServer, Result,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "ha-mcp-server")]
#[command(about = "MCP server for Home Assistant recorder history and statistics")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Transport configuration (defaults to stdio)
    #[command(subcommand)]
    transport: Option<TransportCommand>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Do not connect to the database; serve mock data only
    #[arg(long, global = true)]
    offline: bool,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, global = true, env = "MCP_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum TransportCommand {
    /// Run with stdio transport
    Stdio,
    /// Run with HTTP transport (POST /message, SSE on /sse)
    Http {
        /// Port to listen on (overrides MCP_PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Enable CORS (permissive mode)
        #[arg(long)]
        enable_cors: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ServerConfig::load(cli.config.as_deref())?;
    if let Some(TransportCommand::Http { port, enable_cors }) = &cli.transport {
        if let Some(port) = port {
            config.http.port = *port;
        }
        config.http.enable_cors |= *enable_cors;
    }

    init_logging(&config.logging, cli.debug)?;

    info!("Starting Home Assistant MCP server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        database = %config.connection_summary(),
        read_only = config.database.read_only,
        query_timeout_secs = config.query.query_timeout_secs,
        max_query_days = config.query.max_query_days,
        "Configuration loaded"
    );

    let source = if cli.offline {
        info!("Offline mode: all queries will return mock data");
        None
    } else {
        connect_source(&config).await
    };

    let server = HistoryMcpServer::with_source(config.clone(), source.clone());

    let outcome = match cli.transport.unwrap_or(TransportCommand::Stdio) {
        TransportCommand::Stdio => serve_stdio(server).await,
        TransportCommand::Http { .. } => serve_http(server, &config).await,
    };

    if let Some(source) = source {
        source.close().await;
    }
    info!("Server shutdown complete");
    outcome
}

#[cfg(feature = "postgres")]
async fn connect_source(config: &ServerConfig) -> Option<Arc<dyn HistorySource>> {
    use ha_history_mcp::source::PostgresSource;

    match PostgresSource::connect(config).await {
        Ok(source) => {
            info!("Database connected, serving live data");
            Some(Arc::new(source))
        }
        Err(e) => {
            warn!(error = %e, "Database connection failed, running in mock mode");
            None
        }
    }
}

#[cfg(not(feature = "postgres"))]
async fn connect_source(_config: &ServerConfig) -> Option<Arc<dyn HistorySource>> {
    warn!("Built without the postgres feature, running in mock mode");
    None
}

#[cfg(feature = "http-server")]
async fn serve_http(server: HistoryMcpServer, config: &ServerConfig) -> Result<()> {
    use ha_history_mcp::http_transport::HttpTransportServer;

    HttpTransportServer::new(server, config.http.clone())
        .serve()
        .await
}

#[cfg(not(feature = "http-server"))]
async fn serve_http(_server: HistoryMcpServer, _config: &ServerConfig) -> Result<()> {
    Err(ha_history_mcp::HistoryError::config(
        "HTTP transport requires the http-server feature",
    ))
}

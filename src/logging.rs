//! Logging setup
//!
//! All output goes to stderr so the stdio transport keeps stdout for JSON-RPC.
//! An optional file sink rotates daily.

use crate::config::LoggingConfig;
use crate::error::{HistoryError, Result};
use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Build the filter: `--debug` wins, then `RUST_LOG`, then the configured level.
pub fn build_filter(config: &LoggingConfig, debug: bool) -> Result<EnvFilter> {
    if debug {
        return Ok(EnvFilter::new("debug"));
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level)
        .map_err(|e| HistoryError::config(format!("Invalid log level '{}': {e}", config.level)))
}

/// Initialize the global tracing subscriber
pub fn init_logging(config: &LoggingConfig, debug: bool) -> Result<()> {
    let filter = build_filter(config, debug)?;

    let stderr_layer = if config.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .with_target(true)
            .boxed()
    };

    let file_layer = match &config.file {
        Some(path) => {
            let directory = path.parent().unwrap_or_else(|| Path::new("."));
            if !directory.as_os_str().is_empty() {
                std::fs::create_dir_all(directory)?;
            }
            let file_name = path
                .file_name()
                .unwrap_or_else(|| std::ffi::OsStr::new("ha-mcp-server.log"));
            let appender = tracing_appender::rolling::daily(directory, file_name);

            let layer = fmt::layer().with_writer(appender).with_ansi(false);
            Some(if config.json {
                layer.json().boxed()
            } else {
                layer.boxed()
            })
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| HistoryError::config(format!("Failed to initialize logging: {e}")))
}

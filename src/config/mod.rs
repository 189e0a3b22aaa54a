//! Server configuration
//!
//! Configuration is layered: built-in defaults, then an optional TOML/YAML/JSON
//! file (read through the `config` crate), then the environment variables the
//! Home Assistant add-on has always exported (`PGHOST`, `MCP_QUERY_TIMEOUT`, ...).

use crate::error::{HistoryError, Result};
use crate::series::mock::MockWindowPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Recorder database connection
    pub database: DatabaseConfig,

    /// Query limits and fallback behaviour
    pub query: QueryConfig,

    /// HTTP transport settings
    pub http: HttpConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// PostgreSQL connection settings for the Home Assistant recorder
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    /// Database name
    pub name: String,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Open every transaction read-only
    pub read_only: bool,
    /// Use TimescaleDB `time_bucket` instead of `date_bin`
    pub timescaledb: bool,
    pub pool_min: u32,
    pub pool_max: u32,
    /// Reported to the server as `application_name`
    pub application_name: String,
}

/// Query limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Per-statement timeout in seconds
    pub query_timeout_secs: u64,
    /// Largest accepted `[start, end)` window in days
    pub max_query_days: u32,
    /// Row cap for a single history or statistics query
    pub max_rows: u32,
    /// What the mock generator does with unparseable bounds
    pub mock_window: MockWindowPolicy,
}

/// HTTP transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Permissive CORS for browser-based MCP clients
    pub enable_cors: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive (trace, debug, info, warn, error)
    pub level: String,

    /// Log to a daily-rotated file at this path
    pub file: Option<PathBuf>,

    /// Enable structured JSON logging
    pub json: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5432,
            name: "homeassistant".to_string(),
            user: "homeassistant".to_string(),
            password: None,
            read_only: true,
            timescaledb: false,
            pool_min: 2,
            pool_max: 10,
            application_name: "ha-mcp-server".to_string(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            query_timeout_secs: 30,
            max_query_days: 90,
            max_rows: 5000,
            mock_window: MockWindowPolicy::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8099,
            enable_cors: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            json: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration: defaults, then `path` if given, then environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Read a configuration file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(HistoryError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Apply the legacy environment variables on top of the current values
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(host) = env::var("PGHOST") {
            self.database.host = host;
        }
        if let Some(port) = parse_var("PGPORT")? {
            self.database.port = port;
        }
        if let Ok(name) = env::var("PGDATABASE") {
            self.database.name = name;
        }
        if let Ok(user) = env::var("PGUSER") {
            self.database.user = user;
        }
        if let Ok(password) = env::var("PGPASSWORD") {
            self.database.password = (!password.is_empty()).then_some(password);
        }
        if let Ok(value) = env::var("MCP_READ_ONLY") {
            self.database.read_only = parse_flag(&value);
        }
        if let Ok(value) = env::var("MCP_ENABLE_TIMESCALEDB") {
            self.database.timescaledb = parse_flag(&value);
        }

        if let Some(timeout) = parse_var("MCP_QUERY_TIMEOUT")? {
            self.query.query_timeout_secs = timeout;
        }
        if let Some(days) = parse_var("MCP_MAX_QUERY_DAYS")? {
            self.query.max_query_days = days;
        }
        if let Some(policy) = parse_var("MCP_MOCK_WINDOW")? {
            self.query.mock_window = policy;
        }

        if let Some(port) = parse_var("MCP_PORT")? {
            self.http.port = port;
        }

        if let Ok(level) = env::var("LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }
        if let Ok(file) = env::var("MCP_LOG_FILE") {
            self.logging.file = (!file.is_empty()).then(|| PathBuf::from(file));
        }
        if let Ok(value) = env::var("MCP_LOG_JSON") {
            self.logging.json = parse_flag(&value);
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.database.host.is_empty() {
            return Err(HistoryError::config("Database host cannot be empty"));
        }
        if self.database.pool_max == 0 {
            return Err(HistoryError::config("pool_max must be at least 1"));
        }
        if self.database.pool_min > self.database.pool_max {
            return Err(HistoryError::config(format!(
                "pool_min ({}) exceeds pool_max ({})",
                self.database.pool_min, self.database.pool_max
            )));
        }
        if self.query.query_timeout_secs == 0 {
            return Err(HistoryError::config("Query timeout must be greater than zero"));
        }
        if self.query.max_query_days == 0 {
            return Err(HistoryError::config("max_query_days must be at least 1"));
        }
        if self.query.max_rows == 0 {
            return Err(HistoryError::config("max_rows must be at least 1"));
        }
        Ok(())
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query.query_timeout_secs)
    }

    /// `user@host:port/database`, safe to log
    pub fn connection_summary(&self) -> String {
        format!(
            "{}@{}:{}/{}",
            self.database.user, self.database.host, self.database.port, self.database.name
        )
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| HistoryError::config(format!("Invalid {name}: {e}"))),
        Err(_) => Ok(None),
    }
}

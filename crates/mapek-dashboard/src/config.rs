//! Dashboard configuration.
//!
//! Values come from built-in defaults, then an optional TOML file, then
//! command-line flags and environment variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use mapek_protocol::{DEFAULT_TRUST_CHANNEL, DEFAULT_TRUST_DISPLAY_SECS};
use mapek_state::StatusFilter;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Full connection URL. Takes precedence over host/port/db.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub db: i64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 6379,
            db: 0,
        }
    }
}

impl RedisConfig {
    pub fn connection_url(&self) -> String {
        match &self.url {
            Some(url) if !url.trim().is_empty() => url.clone(),
            _ => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub webapp_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8050".to_string(),
            webapp_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    pub status_filter: StatusFilter,
    pub tick_millis: u64,
    pub cards_millis: u64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            status_filter: StatusFilter::RunningOnly,
            tick_millis: 1_000,
            cards_millis: 2_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustConfig {
    pub channel: String,
    pub display_secs: f64,
    /// Delay before resubscribing after the subscription drops. 0 disables.
    pub reconnect_secs: u64,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            channel: DEFAULT_TRUST_CHANNEL.to_string(),
            display_secs: DEFAULT_TRUST_DISPLAY_SECS,
            reconnect_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsConfig {
    pub file: PathBuf,
    pub tail_lines: usize,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("MAPE_test.log"),
            tail_lines: 20,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub redis: RedisConfig,
    pub server: ServerConfig,
    pub timeline: TimelineConfig,
    pub trust: TrustConfig,
    pub logs: LogsConfig,
}

impl DashboardConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// `~/.config/mapek/dashboard.toml` on Linux.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("mapek").join("dashboard.toml"))
    }

    /// Load `explicit` if given, else the default path if it exists, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.trust.display_secs.is_finite() && self.trust.display_secs > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "trust.display_secs must be positive, got {}",
                self.trust.display_secs
            )));
        }
        if self.trust.channel.trim().is_empty() {
            return Err(ConfigError::Invalid("trust.channel is empty".to_string()));
        }
        if self.timeline.tick_millis == 0 || self.timeline.cards_millis == 0 {
            return Err(ConfigError::Invalid("timeline periods must be non-zero".to_string()));
        }
        if self.logs.tail_lines == 0 {
            return Err(ConfigError::Invalid("logs.tail_lines must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Flag / environment overrides applied on top of the file config.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ConfigOverrides {
    /// Redis connection URL (e.g. redis://127.0.0.1:6379/0)
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    #[arg(long, env = "REDIS_HOST")]
    pub redis_host: Option<String>,

    #[arg(long, env = "REDIS_PORT")]
    pub redis_port: Option<u16>,

    #[arg(long, env = "REDIS_DB")]
    pub redis_db: Option<i64>,

    /// HTTP bind address for the dashboard
    #[arg(long, env = "MAPEK_BIND")]
    pub bind: Option<String>,

    /// Directory holding index.html and static assets
    #[arg(long, env = "MAPEK_WEBAPP_DIR")]
    pub webapp_dir: Option<PathBuf>,

    /// Pub/sub channel carrying trust events
    #[arg(long, env = "TRUST_CHANNEL")]
    pub trust_channel: Option<String>,

    /// Seconds the trust popup stays visible
    #[arg(long, env = "TRUST_DISPLAY_SECONDS")]
    pub trust_display_secs: Option<f64>,

    /// Timeline status policy: running_only or all
    #[arg(long, env = "MAPEK_STATUS_FILTER")]
    pub status_filter: Option<StatusFilter>,

    /// Log file shown in the live log panel
    #[arg(long, env = "MAPEK_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut DashboardConfig) -> Result<(), ConfigError> {
        if let Some(url) = &self.redis_url {
            config.redis.url = Some(url.clone());
        }
        if let Some(host) = &self.redis_host {
            config.redis.host = host.clone();
        }
        if let Some(port) = self.redis_port {
            config.redis.port = port;
        }
        if let Some(db) = self.redis_db {
            config.redis.db = db;
        }
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
        if let Some(dir) = &self.webapp_dir {
            config.server.webapp_dir = Some(dir.clone());
        }
        if let Some(channel) = &self.trust_channel {
            config.trust.channel = channel.clone();
        }
        if let Some(secs) = self.trust_display_secs {
            config.trust.display_secs = secs;
        }
        if let Some(filter) = self.status_filter {
            config.timeline.status_filter = filter;
        }
        if let Some(file) = &self.log_file {
            config.logs.file = file.clone();
        }
        config.validate()
    }
}

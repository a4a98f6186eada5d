//! Service configuration.
//!
//! Settings come from an optional TOML file (default `sensmon.toml`, or the
//! path in `SENSMON_CONFIG`) with per-field defaults, then a handful of
//! environment overrides. A missing file means all defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::ingest::iriseup::DEFAULT_SOURCE_URL;
use crate::ingest::retry::RetryConfig;
use crate::logging::LogLevel;
use crate::store::{DEFAULT_ROWS_FILE, DEFAULT_SNAPSHOT_FILE, StorePaths};

pub const DEFAULT_CONFIG_FILE: &str = "sensmon.toml";
pub const CONFIG_PATH_ENV: &str = "SENSMON_CONFIG";

/// Longest accepted refresh period: one day.
pub const MAX_REFRESH_INTERVAL_SECS: u64 = 86_400;

/// Longest accepted per-attempt HTTP timeout: one hour.
pub const MAX_TIMEOUT_SECS: u64 = 3_600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    #[default]
    Live,
    Replay,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub url: String,
    pub mode: SourceMode,
    pub replay_file: Option<PathBuf>,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
    pub max_retry_delay_secs: u64,
    pub user_agent: Option<String>,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            mode: SourceMode::Live,
            replay_file: None,
            timeout_secs: 60,
            max_attempts: 3,
            retry_delay_secs: 5,
            max_retry_delay_secs: 30,
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshSettings {
    pub interval_secs: u64,
    pub max_snapshot_age_secs: u64,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            max_snapshot_age_secs: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub data_dir: PathBuf,
    pub snapshot_file: String,
    pub rows_file: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            snapshot_file: DEFAULT_SNAPSHOT_FILE.to_string(),
            rows_file: DEFAULT_ROWS_FILE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 10000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub file: Option<PathBuf>,
    pub timestamps: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            timestamps: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Service configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub registry_file: Option<PathBuf>,
    pub source: SourceSettings,
    pub refresh: RefreshSettings,
    pub storage: StorageSettings,
    pub server: ServerSettings,
    pub logging: LoggingSettings,
}

impl ServiceConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(text) => Self::from_toml_str(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    /// Load from `$SENSMON_CONFIG` or `sensmon.toml`, apply environment
    /// overrides, and validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let mut config = Self::load(Path::new(&path))?;
        config.apply_env_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = parse_env("PORT", port)?;
        }
        if let Some(url) = lookup("SENSMON_SOURCE_URL") {
            self.source.url = url;
        }
        if let Some(dir) = lookup("SENSMON_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup("SENSMON_REFRESH_SECS") {
            self.refresh.interval_secs = parse_env("SENSMON_REFRESH_SECS", secs)?;
        }
        if let Some(level) = lookup("SENSMON_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(file) = lookup("SENSMON_LOG_FILE") {
            self.logging.file = Some(PathBuf::from(file));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh.interval_secs == 0 {
            return Err(ConfigError::Invalid("refresh.interval_secs must be positive".into()));
        }
        if self.refresh.interval_secs > MAX_REFRESH_INTERVAL_SECS {
            return Err(ConfigError::Invalid(format!(
                "refresh.interval_secs must be at most {}",
                MAX_REFRESH_INTERVAL_SECS
            )));
        }
        if self.source.max_attempts == 0 {
            return Err(ConfigError::Invalid("source.max_attempts must be at least 1".into()));
        }
        if self.source.timeout_secs == 0 {
            return Err(ConfigError::Invalid("source.timeout_secs must be positive".into()));
        }
        if self.source.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(ConfigError::Invalid(format!(
                "source.timeout_secs must be at most {}",
                MAX_TIMEOUT_SECS
            )));
        }
        if self.source.mode == SourceMode::Replay && self.source.replay_file.is_none() {
            return Err(ConfigError::Invalid(
                "source.mode = \"replay\" requires source.replay_file".into(),
            ));
        }
        if LogLevel::parse(&self.logging.level).is_none() {
            return Err(ConfigError::Invalid(format!(
                "unknown logging.level {:?}",
                self.logging.level
            )));
        }
        Ok(())
    }

    pub fn log_level(&self) -> LogLevel {
        LogLevel::parse(&self.logging.level).unwrap_or(LogLevel::Info)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.source.timeout_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh.interval_secs)
    }

    pub fn max_snapshot_age(&self) -> Duration {
        Duration::from_secs(self.refresh.max_snapshot_age_secs)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.source.max_attempts,
            initial_delay: Duration::from_secs(self.source.retry_delay_secs),
            max_delay: Duration::from_secs(self.source.max_retry_delay_secs),
            ..RetryConfig::default()
        }
    }

    pub fn store_paths(&self) -> StorePaths {
        StorePaths::new(
            &self.storage.data_dir,
            &self.storage.snapshot_file,
            &self.storage.rows_file,
        )
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { var, value })
}

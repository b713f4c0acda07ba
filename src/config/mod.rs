//! Configuration management for cwlogs-export
//!
//! Configuration is read from a TOML file and then overridden by
//! command-line arguments.
//!
//! Configuration precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Configuration file (`~/.cwlogs-export/config.toml` or `--config FILE`)
//! 3. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::export::writers::TimestampZone;
use crate::retrieval::{MalformedRecordPolicy, QuerySettings, ScanSettings, TimeResolution};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// AWS credentials and endpoint
    pub aws: AwsConfig,

    /// Query mode settings
    pub query: QueryConfig,

    /// Scan mode settings
    pub scan: ScanConfig,

    /// Output settings shared by both modes
    pub export: ExportConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// AWS client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AwsConfig {
    /// Named profile from `~/.aws/config`; unset uses the default chain
    pub profile: Option<String>,

    /// Region override
    pub region: Option<String>,

    /// Endpoint override (for local emulators)
    pub endpoint_url: Option<String>,
}

/// Query mode configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QueryConfig {
    /// Query expression; the first two result fields must be timestamp and message
    pub query_string: String,

    /// Result cap used when `--limit` is not given
    pub default_limit: u32,

    /// Delay between status polls in milliseconds
    pub poll_interval_ms: u64,

    /// Give up waiting after this many seconds (unset waits for the service)
    pub max_wait_secs: Option<u64>,

    /// Unit of the window bounds sent to StartQuery
    pub time_resolution: TimeResolution,
}

/// Scan mode configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScanConfig {
    /// Dot-separated path of the log text inside each JSON message
    pub message_field: String,

    /// Unit of the window bounds sent to FilterLogEvents
    pub time_resolution: TimeResolution,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExportConfig {
    /// What to do with records that cannot be decoded (abort, skip)
    pub malformed_records: MalformedRecordPolicy,

    /// Zone the Timestamp column is rendered in (local, utc)
    pub timezone: TimestampZone,

    /// Show a progress spinner on stderr
    pub progress: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: LogLevel,

    /// Enable timestamps in logs
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for QueryConfig {
    fn default() -> Self {
        let settings = QuerySettings::default();
        Self {
            query_string: settings.query_string,
            default_limit: 10_000,
            poll_interval_ms: settings.poll_interval.as_millis() as u64,
            max_wait_secs: None,
            time_resolution: settings.resolution,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        let settings = ScanSettings::default();
        Self {
            message_field: settings.message_field,
            time_resolution: settings.resolution,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            malformed_records: MalformedRecordPolicy::Abort,
            timezone: TimestampZone::Local,
            progress: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Warn,
            timestamps: false,
        }
    }
}

impl Config {
    /// Get the default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".cwlogs-export")
            .join("config.toml")
    }

    /// Load configuration from a file
    ///
    /// With `None`, the default path is tried and a missing file yields the
    /// defaults. An explicitly named file must exist.
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_config_path(), false),
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigError::FileNotFound(path.display().to_string()).into());
            }
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Render the configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<()> {
        if self.query.poll_interval_ms == 0 {
            return Err(invalid("query.poll_interval_ms", "0"));
        }
        if self.query.default_limit == 0 {
            return Err(invalid("query.default_limit", "0"));
        }
        if self.query.max_wait_secs == Some(0) {
            return Err(invalid("query.max_wait_secs", "0"));
        }
        if self.query.query_string.trim().is_empty() {
            return Err(invalid("query.query_string", ""));
        }
        if self.scan.message_field.trim().is_empty()
            || self.scan.message_field.split('.').any(str::is_empty)
        {
            return Err(invalid("scan.message_field", &self.scan.message_field));
        }
        Ok(())
    }

    /// Query settings derived from this configuration
    pub fn query_settings(&self) -> QuerySettings {
        QuerySettings {
            query_string: self.query.query_string.clone(),
            poll_interval: Duration::from_millis(self.query.poll_interval_ms),
            max_wait: self.query.max_wait_secs.map(Duration::from_secs),
            resolution: self.query.time_resolution,
        }
    }

    /// Scan settings derived from this configuration
    pub fn scan_settings(&self) -> ScanSettings {
        ScanSettings {
            message_field: self.scan.message_field.clone(),
            resolution: self.scan.time_resolution,
        }
    }
}

fn invalid(field: &str, value: &str) -> crate::error::ExportError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

//! # Configuration Management
//!
//! Structured settings for the RCON session and for logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()` / `from_toml()`
//! - Environment variables via `from_env()` (`SQUAD_RCON_*`)
//! - Direct instantiation with defaults and `default_with_overrides()`
//!
//! ## Notes
//! - Durations are expressed in milliseconds in TOML
//! - The RCON password is never printed by `Debug`

use crate::error::{RconError, Result};
use crate::protocol::bus::DEFAULT_SUBSCRIBER_CAPACITY;
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Default RCON port of a Squad server
pub const DEFAULT_RCON_PORT: u16 = 21114;

/// Default command used as the keepalive probe
pub const DEFAULT_KEEPALIVE_COMMAND: &str = "ShowCurrentMap";

/// Top-level settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RconSettings {
    /// Session configuration
    #[serde(default)]
    pub rcon: RconConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RconSettings {
    /// Load settings from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| RconError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| RconError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load settings from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| RconError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load settings from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut settings = Self::default();
        settings.rcon.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Apply overrides to the default settings
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut settings = Self::default();
        mutator(&mut settings);
        settings
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save settings to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| RconError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| RconError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the settings
    ///
    /// Returns a list of validation errors. Empty list means the settings are valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = self.rcon.validate();
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        strict(self.validate())
    }
}

fn strict(errors: Vec<String>) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(RconError::ConfigError(format!(
            "Configuration validation failed:\n  - {}",
            errors.join("\n  - ")
        )))
    }
}

/// Session configuration
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RconConfig {
    /// Server host name or IP
    pub host: String,

    /// RCON port
    pub port: u16,

    /// RCON password
    pub password: String,

    /// Whether to reconnect automatically after a connection loss
    pub auto_reconnect: bool,

    /// Delay between reconnect attempts
    #[serde(with = "duration_serde")]
    pub reconnect_delay: Duration,

    /// Maximum reconnect attempts per outage (0 = unlimited)
    pub max_reconnect_attempts: u32,

    /// Timeout for TCP connect plus authentication
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Timeout for a command's full response
    #[serde(with = "duration_serde")]
    pub response_timeout: Duration,

    /// Interval between keepalive commands while connected
    #[serde(with = "duration_serde")]
    pub keepalive_interval: Duration,

    /// How long a keepalive command may take before the connection is declared lost
    #[serde(with = "duration_serde")]
    pub keepalive_timeout: Duration,

    /// Command sent as the keepalive probe
    pub keepalive_command: String,

    /// Capacity of each subscriber's event queue
    pub event_buffer: usize,
}

impl Default for RconConfig {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: DEFAULT_RCON_PORT,
            password: String::new(),
            auto_reconnect: true,
            reconnect_delay: timeout::RECONNECT_DELAY,
            max_reconnect_attempts: 0,
            connect_timeout: timeout::DEFAULT_TIMEOUT,
            response_timeout: timeout::RESPONSE_TIMEOUT,
            keepalive_interval: timeout::KEEPALIVE_INTERVAL,
            keepalive_timeout: timeout::RESPONSE_TIMEOUT,
            keepalive_command: String::from(DEFAULT_KEEPALIVE_COMMAND),
            event_buffer: DEFAULT_SUBSCRIBER_CAPACITY,
        }
    }
}

impl fmt::Debug for RconConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RconConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"<redacted>")
            .field("auto_reconnect", &self.auto_reconnect)
            .field("reconnect_delay", &self.reconnect_delay)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("connect_timeout", &self.connect_timeout)
            .field("response_timeout", &self.response_timeout)
            .field("keepalive_interval", &self.keepalive_interval)
            .field("keepalive_timeout", &self.keepalive_timeout)
            .field("keepalive_command", &self.keepalive_command)
            .field("event_buffer", &self.event_buffer)
            .finish()
    }
}

impl RconConfig {
    /// Configuration for `host:port` with `password` and default tuning
    pub fn new(host: impl Into<String>, port: u16, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            password: password.into(),
            ..Self::default()
        }
    }

    /// `host:port` string used to connect
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Override fields from `SQUAD_RCON_*` variables looked up through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, value: String) -> Result<T> {
            value
                .trim()
                .parse()
                .map_err(|_| RconError::ConfigError(format!("Invalid value for {key}: {value}")))
        }

        if let Some(host) = lookup("SQUAD_RCON_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("SQUAD_RCON_PORT") {
            self.port = parse("SQUAD_RCON_PORT", port)?;
        }
        if let Some(password) = lookup("SQUAD_RCON_PASSWORD") {
            self.password = password;
        }
        if let Some(flag) = lookup("SQUAD_RCON_AUTO_RECONNECT") {
            self.auto_reconnect = parse("SQUAD_RCON_AUTO_RECONNECT", flag)?;
        }
        if let Some(delay) = lookup("SQUAD_RCON_RECONNECT_DELAY_MS") {
            self.reconnect_delay =
                Duration::from_millis(parse("SQUAD_RCON_RECONNECT_DELAY_MS", delay)?);
        }
        if let Some(timeout) = lookup("SQUAD_RCON_RESPONSE_TIMEOUT_MS") {
            self.response_timeout =
                Duration::from_millis(parse("SQUAD_RCON_RESPONSE_TIMEOUT_MS", timeout)?);
        }

        Ok(())
    }

    /// Validate session configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.host.trim().is_empty() {
            errors.push("Host cannot be empty".to_string());
        }

        if self.port == 0 {
            errors.push("Port must be greater than 0".to_string());
        }

        if self.password.is_empty() {
            errors.push("Password cannot be empty".to_string());
        }

        if self.reconnect_delay.as_millis() < 10 {
            errors.push("Reconnect delay too short (minimum: 10ms)".to_string());
        } else if self.reconnect_delay.as_secs() > 600 {
            errors.push("Reconnect delay too long (maximum: 600s)".to_string());
        }

        if self.connect_timeout.as_millis() < 100 {
            errors.push("Connect timeout too short (minimum: 100ms)".to_string());
        }

        if self.response_timeout.as_millis() < 100 {
            errors.push("Response timeout too short (minimum: 100ms)".to_string());
        }

        if self.keepalive_interval.as_millis() < 100 {
            errors.push("Keepalive interval too short (minimum: 100ms)".to_string());
        } else if self.keepalive_interval.as_secs() > 3600 {
            errors.push("Keepalive interval too long (maximum: 1 hour)".to_string());
        }

        if self.keepalive_timeout.as_millis() < 100 {
            errors.push("Keepalive timeout too short (minimum: 100ms)".to_string());
        }

        if self.event_buffer == 0 {
            errors.push("Event buffer must be greater than 0".to_string());
        }

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        strict(self.validate())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("squad-rcon"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        level.as_str().to_lowercase().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}

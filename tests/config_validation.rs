//! Integration tests for configuration loading and validation

#![allow(clippy::expect_used, clippy::unwrap_used)]

use squad_rcon::config::{DEFAULT_KEEPALIVE_COMMAND, DEFAULT_RCON_PORT};
use squad_rcon::{LoggingConfig, RconConfig, RconError, RconSettings};
use std::collections::HashMap;
use std::time::Duration;
use tracing::Level;

fn valid() -> RconConfig {
    RconConfig::new("10.0.0.5", DEFAULT_RCON_PORT, "secret")
}

#[test]
fn test_config_with_password_validates() {
    let errors = valid().validate();
    assert!(
        errors.is_empty(),
        "Config should be valid, but got errors: {:?}",
        errors
    );
}

#[test]
fn test_default_config_requires_password() {
    let errors = RconSettings::default().validate();
    assert_eq!(errors, vec!["Password cannot be empty".to_string()]);
}

#[test]
fn test_defaults() {
    let config = RconConfig::default();
    assert_eq!(config.port, 21114);
    assert!(config.auto_reconnect);
    assert_eq!(config.max_reconnect_attempts, 0);
    assert_eq!(config.keepalive_command, DEFAULT_KEEPALIVE_COMMAND);
    assert_eq!(config.address(), "127.0.0.1:21114");
}

#[test]
fn test_empty_host() {
    let mut config = valid();
    config.host = "  ".to_string();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Host cannot be empty")));
}

#[test]
fn test_zero_port() {
    let mut config = valid();
    config.port = 0;

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Port must be greater than 0")));
}

#[test]
fn test_reconnect_delay_bounds() {
    let mut config = valid();
    config.reconnect_delay = Duration::from_millis(1);
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Reconnect delay too short")));

    config.reconnect_delay = Duration::from_secs(601);
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Reconnect delay too long")));
}

#[test]
fn test_short_timeouts() {
    let mut config = valid();
    config.connect_timeout = Duration::from_millis(50);
    config.response_timeout = Duration::from_millis(50);
    config.keepalive_timeout = Duration::from_millis(50);

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Connect timeout too short")));
    assert!(errors.iter().any(|e| e.contains("Response timeout too short")));
    assert!(errors.iter().any(|e| e.contains("Keepalive timeout too short")));
}

#[test]
fn test_zero_event_buffer() {
    let mut config = valid();
    config.event_buffer = 0;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Event buffer must be greater than 0")));
}

#[test]
fn test_debug_redacts_password() {
    let rendered = format!("{:?}", valid());
    assert!(!rendered.contains("secret"));
    assert!(rendered.contains("<redacted>"));
}

#[test]
fn test_validate_strict_lists_every_error() {
    let mut settings = RconSettings::default();
    settings.rcon.port = 0;

    let err = settings.validate_strict().unwrap_err();
    let message = err.to_string();
    assert!(matches!(err, RconError::ConfigError(_)));
    assert!(message.contains("Port must be greater than 0"));
    assert!(message.contains("Password cannot be empty"));
}

#[test]
fn test_logging_requires_an_output() {
    let logging = LoggingConfig {
        log_to_console: false,
        log_to_file: false,
        ..LoggingConfig::default()
    };

    let errors = logging.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("At least one logging output")));
}

#[test]
fn test_logging_file_without_path() {
    let logging = LoggingConfig {
        log_to_file: true,
        log_file_path: None,
        ..LoggingConfig::default()
    };

    let errors = logging.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("log_file_path must be specified")));
}

#[test]
fn test_partial_toml_uses_defaults() {
    let settings = RconSettings::from_toml(
        r#"
        [rcon]
        host = "192.168.1.20"
        password = "hunter2"
        reconnect_delay = 2500

        [logging]
        log_level = "debug"
        "#,
    )
    .expect("Failed to parse");

    assert_eq!(settings.rcon.host, "192.168.1.20");
    assert_eq!(settings.rcon.port, DEFAULT_RCON_PORT);
    assert_eq!(settings.rcon.reconnect_delay, Duration::from_millis(2500));
    assert_eq!(settings.logging.log_level, Level::DEBUG);
    assert!(settings.validate().is_empty());
}

#[test]
fn test_invalid_toml_is_config_error() {
    let result = RconSettings::from_toml("[rcon]\nport = \"not a number\"");
    assert!(matches!(result, Err(RconError::ConfigError(_))));
}

#[test]
fn test_save_and_load_roundtrip() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("rcon.toml");
    let settings = RconSettings::default_with_overrides(|s| {
        s.rcon.password = "secret".into();
        s.rcon.max_reconnect_attempts = 7;
        s.logging.json_format = true;
    });

    settings.save_to_file(&path).expect("Failed to save");
    let loaded = RconSettings::from_file(&path).expect("Failed to load");

    assert_eq!(loaded.rcon.password, "secret");
    assert_eq!(loaded.rcon.max_reconnect_attempts, 7);
    assert_eq!(loaded.rcon.keepalive_interval, settings.rcon.keepalive_interval);
    assert!(loaded.logging.json_format);
}

#[test]
fn test_missing_file_is_config_error() {
    let result = RconSettings::from_file("/nonexistent/rcon.toml");
    assert!(matches!(result, Err(RconError::ConfigError(_))));
}

#[test]
fn test_env_overrides() {
    let env: HashMap<&str, &str> = HashMap::from([
        ("SQUAD_RCON_HOST", "game.example.net"),
        ("SQUAD_RCON_PORT", "21115"),
        ("SQUAD_RCON_PASSWORD", "from-env"),
        ("SQUAD_RCON_AUTO_RECONNECT", "false"),
        ("SQUAD_RCON_RESPONSE_TIMEOUT_MS", "750"),
    ]);
    let mut config = RconConfig::default();

    config
        .apply_env(|key| env.get(key).map(|v| v.to_string()))
        .expect("Failed to apply env");

    assert_eq!(config.address(), "game.example.net:21115");
    assert_eq!(config.password, "from-env");
    assert!(!config.auto_reconnect);
    assert_eq!(config.response_timeout, Duration::from_millis(750));
}

#[test]
fn test_env_rejects_bad_port() {
    let mut config = RconConfig::default();
    let result = config.apply_env(|key| (key == "SQUAD_RCON_PORT").then(|| "lots".to_string()));
    assert!(matches!(result, Err(RconError::ConfigError(_))));
}

#[test]
fn test_example_config_parses() {
    let example = RconSettings::example_config();
    assert!(RconSettings::from_toml(&example).is_ok());
}

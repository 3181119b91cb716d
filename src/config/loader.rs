//! Configuration loading from disk.

use std::env;
use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding `api.base_url`.
pub const ENV_BASE_URL: &str = "CONSOLE_GATEWAY_BASE_URL";

/// Environment variable overriding `observability.log_level`.
pub const ENV_LOG: &str = "CONSOLE_GATEWAY_LOG";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse configuration from TOML text, apply environment overrides and
/// validate the result.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = toml::from_str(content)?;
    finish(config)
}

/// Defaults plus environment overrides, for running without a config file.
pub fn default_config() -> Result<GatewayConfig, ConfigError> {
    finish(GatewayConfig::default())
}

fn finish(config: GatewayConfig) -> Result<GatewayConfig, ConfigError> {
    let config = with_env_overrides(config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn with_env_overrides(mut config: GatewayConfig) -> GatewayConfig {
    if let Ok(v) = env::var(ENV_BASE_URL) {
        config.api.base_url = v;
    }
    if let Ok(v) = env::var(ENV_LOG) {
        config.observability.log_level = v;
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_invalid_values() {
        let err = parse_config(
            r#"
            [api]
            unauthorized_code = 0
            login_path = "login"
            "#,
        )
        .unwrap_err();

        let msg = err.to_string();
        assert!(msg.starts_with("Validation failed"));
        assert!(msg.contains("unauthorized_code"));
        assert!(msg.contains("login_path"));
    }

    #[test]
    fn test_parse_reports_toml_errors() {
        let err = parse_config("[api\nbase_url = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}

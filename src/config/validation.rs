//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges and URL shapes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>

use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("api.base_url '{0}' is not a valid URL")]
    InvalidBaseUrl(String),

    #[error("api.base_url must use http or https, got '{0}'")]
    UnsupportedScheme(String),

    #[error("api.unauthorized_code must be nonzero (0 means success)")]
    ZeroUnauthorizedCode,

    #[error("{field} must start with '/', got '{value}'")]
    RelativePath { field: &'static str, value: String },

    #[error("session.key must not be empty")]
    EmptySessionKey,
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match Url::parse(&config.api.base_url) {
        Ok(url) if url.scheme() != "http" && url.scheme() != "https" => {
            errors.push(ValidationError::UnsupportedScheme(url.scheme().to_string()));
        }
        Ok(_) => {}
        Err(_) => errors.push(ValidationError::InvalidBaseUrl(config.api.base_url.clone())),
    }

    if config.api.unauthorized_code == 0 {
        errors.push(ValidationError::ZeroUnauthorizedCode);
    }

    for (field, value) in [
        ("api.login_path", &config.api.login_path),
        ("api.login_endpoint", &config.api.login_endpoint),
    ] {
        if !value.starts_with('/') {
            errors.push(ValidationError::RelativePath {
                field,
                value: value.clone(),
            });
        }
    }

    if config.session.key.trim().is_empty() {
        errors.push(ValidationError::EmptySessionKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

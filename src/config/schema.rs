//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the API client pipeline.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Remote API settings (base URL, sentinel code, login routes).
    pub api: ApiConfig,

    /// Session persistence settings.
    pub session: SessionConfig,

    /// HTTP transport settings.
    pub transport: TransportConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Remote API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every relative request path is joined onto.
    pub base_url: String,

    /// Envelope code the server uses to signal an invalid session.
    pub unauthorized_code: i64,

    /// Login entry point the user is sent to when the session expires.
    pub login_path: String,

    /// API endpoint that exchanges credentials for a token.
    pub login_endpoint: String,

    /// Attach an `x-request-id` header to every outgoing request.
    pub request_id: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            unauthorized_code: 401,
            login_path: "/login".to_string(),
            login_endpoint: "/auth/login".to_string(),
            request_id: true,
        }
    }
}

/// Session persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// JSON file holding the persisted session. In-memory only when unset.
    pub store_path: Option<String>,

    /// Key the session is stored under.
    pub key: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            key: "session".to_string(),
        }
    }
}

/// HTTP transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Connection establishment timeout in seconds. Requests themselves are
    /// never given a deadline by the pipeline.
    pub connect_timeout_secs: Option<u64>,

    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: Some(10),
            user_agent: format!("console-gateway/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

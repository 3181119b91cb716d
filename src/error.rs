//! Error types for the request pipeline.

use std::fmt;

use http::StatusCode;
use thiserror::Error;

/// Network-level failures. The pipeline never classifies these further and
/// never retries them.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection could not be established (DNS, refused, TLS).
    #[error("connection failed: {0}")]
    Connect(#[source] reqwest::Error),

    /// The transport's own connect timeout fired.
    #[error("request timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    /// The caller's abort signal fired before the response arrived.
    #[error("request aborted by caller")]
    Aborted,

    /// The response head arrived but reading the body failed.
    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),

    /// The request could not be converted for the underlying client.
    #[error("request could not be built: {0}")]
    InvalidRequest(String),

    /// Any other client error.
    #[error("transport error: {0}")]
    Request(#[source] reqwest::Error),

    /// Failure reported by a non-reqwest transport.
    #[error("transport error: {0}")]
    Other(String),
}

/// Which signal told us the session is no longer valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthorizedSource {
    /// HTTP status 401.
    Status,
    /// Envelope carrying the unauthorized sentinel code.
    Envelope,
}

impl UnauthorizedSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnauthorizedSource::Status => "status",
            UnauthorizedSource::Envelope => "envelope",
        }
    }
}

impl fmt::Display for UnauthorizedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a `send` can fail with.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Session expired or was rejected. Teardown has already run.
    #[error("unauthorized ({0}): session expired or invalid")]
    Unauthorized(UnauthorizedSource),

    /// Envelope with a nonzero code. `message` is the server's text.
    #[error("{message}")]
    Application { code: i64, message: String },

    /// Non-success status without an application error to report.
    #[error("unexpected HTTP status {status}")]
    Status { status: StatusCode },

    /// Success status, but the body is not a `{code, message, data}` envelope.
    #[error("response with HTTP status {status} is not an API envelope")]
    Malformed { status: StatusCode },

    /// The envelope's `data` did not match the requested type.
    #[error("response data did not match the expected shape: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("invalid request: {0}")]
    InvalidDescriptor(String),

    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
}

impl PipelineError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, PipelineError::Unauthorized(_))
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, PipelineError::Transport(TransportError::Aborted))
    }

    /// Short label used for metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            PipelineError::Transport(TransportError::Aborted) => "aborted",
            PipelineError::Transport(_) => "transport_error",
            PipelineError::Unauthorized(_) => "unauthorized",
            PipelineError::Application { .. } => "application_error",
            PipelineError::Status { .. } => "http_error",
            PipelineError::Malformed { .. } => "malformed_response",
            PipelineError::Decode(_) => "decode_error",
            PipelineError::InvalidDescriptor(_) | PipelineError::InvalidBaseUrl(_) => "invalid_request",
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_error_displays_server_message() {
        let err = PipelineError::Application {
            code: 1,
            message: "stock insufficient".into(),
        };
        assert_eq!(err.to_string(), "stock insufficient");
        assert_eq!(err.outcome(), "application_error");
    }

    #[test]
    fn test_error_kinds() {
        let err = PipelineError::Unauthorized(UnauthorizedSource::Envelope);
        assert!(err.is_unauthorized());
        assert!(err.to_string().contains("envelope"));

        let err = PipelineError::from(TransportError::Aborted);
        assert!(err.is_aborted());
        assert!(!err.is_unauthorized());
        assert_eq!(err.outcome(), "aborted");

        let err = PipelineError::Malformed { status: StatusCode::OK };
        assert_eq!(err.outcome(), "malformed_response");
        assert!(err.to_string().contains("not an API envelope"));
    }
}

//! Response interception.
//!
//! # Responsibilities
//! - Detect an invalid session (HTTP 401 or the envelope sentinel code)
//! - Run the expiry handler exactly once per unauthorized call
//! - Turn nonzero envelope codes into typed application errors
//!
//! # Design Decisions
//! - HTTP 401 short-circuits before the body is looked at
//! - Only a 2xx `code == 0` envelope resolves; a body without an envelope is
//!   rejected unless it is the empty body of a HEAD or 204
//! - Successful responses are handed back untouched; `data` extraction is
//!   left to the caller

use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::{Method, Request, Response, StatusCode};
use tower::{Layer, Service};

use crate::error::{PipelineError, PipelineResult, UnauthorizedSource};
use crate::http::descriptor::CurrentLocation;
use crate::http::envelope::EnvelopeHead;
use crate::observability::metrics;
use crate::session::{ExpiryContext, SessionExpiredHandler};

struct EnvelopePolicy {
    unauthorized_code: i64,
    handler: Arc<dyn SessionExpiredHandler>,
}

impl EnvelopePolicy {
    fn inspect(
        &self,
        response: Response<Bytes>,
        head_request: bool,
        return_path: String,
    ) -> PipelineResult<Response<Bytes>> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(self.expire(UnauthorizedSource::Status, return_path));
        }

        match EnvelopeHead::peek(response.body()) {
            Some(head) if head.code == 0 && status.is_success() => Ok(response),
            Some(head) if head.code == 0 => Err(PipelineError::Status { status }),
            Some(head) if head.code == self.unauthorized_code => {
                Err(self.expire(UnauthorizedSource::Envelope, return_path))
            }
            Some(head) => {
                let code = head.code;
                let message = head.into_message();
                tracing::debug!(code, message = %message, "Application error in response envelope");
                Err(PipelineError::Application { code, message })
            }
            None if !status.is_success() => Err(PipelineError::Status { status }),
            // Nothing to carry an envelope in.
            None if response.body().is_empty() && (head_request || status == StatusCode::NO_CONTENT) => {
                Ok(response)
            }
            None => {
                tracing::warn!(status = %status, bytes = response.body().len(), "Response body is not an envelope");
                Err(PipelineError::Malformed { status })
            }
        }
    }

    fn expire(&self, source: UnauthorizedSource, return_path: String) -> PipelineError {
        tracing::warn!(source = %source, return_path = %return_path, "Session rejected by server, tearing down");
        metrics::record_session_expired(source.as_str());
        self.handler.on_session_expired(&ExpiryContext { source, return_path });
        PipelineError::Unauthorized(source)
    }
}

/// Where the user should land after logging in again.
pub fn return_path_for<B>(req: &Request<B>) -> String {
    if let Some(CurrentLocation(location)) = req.extensions().get::<CurrentLocation>() {
        return location.clone();
    }
    req.uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string())
}

/// Outermost layer of the pipeline.
#[derive(Clone)]
pub struct EnvelopeLayer {
    policy: Arc<EnvelopePolicy>,
}

impl EnvelopeLayer {
    pub fn new(unauthorized_code: i64, handler: Arc<dyn SessionExpiredHandler>) -> Self {
        Self {
            policy: Arc::new(EnvelopePolicy {
                unauthorized_code,
                handler,
            }),
        }
    }
}

impl<S> Layer<S> for EnvelopeLayer {
    type Service = EnvelopeCheck<S>;

    fn layer(&self, inner: S) -> Self::Service {
        EnvelopeCheck {
            inner,
            policy: self.policy.clone(),
        }
    }
}

#[derive(Clone)]
pub struct EnvelopeCheck<S> {
    inner: S,
    policy: Arc<EnvelopePolicy>,
}

impl<S> Service<Request<Bytes>> for EnvelopeCheck<S>
where
    S: Service<Request<Bytes>, Response = Response<Bytes>, Error = PipelineError>,
    S::Future: Send + 'static,
{
    type Response = Response<Bytes>;
    type Error = PipelineError;
    type Future = BoxFuture<'static, PipelineResult<Response<Bytes>>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Bytes>) -> Self::Future {
        // Captured now: the inner layers own the request from here on.
        let return_path = return_path_for(&req);
        let head_request = req.method() == Method::HEAD;
        let policy = self.policy.clone();
        let response = self.inner.call(req);

        Box::pin(async move {
            let response = response.await?;
            policy.inspect(response, head_request, return_path)
        })
    }
}

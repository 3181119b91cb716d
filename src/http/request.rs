//! Request interception.
//!
//! # Responsibilities
//! - Attach the bearer credential from the current session
//! - Clean query strings of read-only requests
//! - Deep clean JSON bodies of mutating requests
//!
//! # Design Decisions
//! - Requests are rebuilt from their parts; method, version, unrelated
//!   headers and extensions (abort signal, transport options) carry over as is
//! - A body that cannot be cleaned is sent unmodified, never rejected

use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use http::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use http::uri::{PathAndQuery, Uri};
use http::{Method, Request};
use tower::{Layer, Service};

use crate::http::clean::{clean_query, clean_value};
use crate::session::{Session, SessionProvider};

/// Layer adding `Authorization: Bearer <token>` when the session holds a token.
#[derive(Clone)]
pub struct AuthLayer {
    provider: Arc<dyn SessionProvider>,
}

impl AuthLayer {
    pub fn new(provider: Arc<dyn SessionProvider>) -> Self {
        Self { provider }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = Auth<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Auth {
            inner,
            provider: self.provider.clone(),
        }
    }
}

#[derive(Clone)]
pub struct Auth<S> {
    inner: S,
    provider: Arc<dyn SessionProvider>,
}

impl<S> Service<Request<Bytes>> for Auth<S>
where
    S: Service<Request<Bytes>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Bytes>) -> Self::Future {
        attach_bearer(req.headers_mut(), &self.provider.current());
        self.inner.call(req)
    }
}

/// Insert the bearer header for `session`. No-op without a token.
pub fn attach_bearer(headers: &mut HeaderMap, session: &Session) {
    let Some(token) = session.token.as_deref().filter(|t| !t.is_empty()) else {
        return;
    };

    match HeaderValue::try_from(format!("Bearer {}", token)) {
        Ok(mut value) => {
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        Err(_) => {
            tracing::warn!("Session token is not a valid header value, sending request without credentials");
        }
    }
}

/// Layer applying query/body cleaning.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanParamsLayer;

impl<S> Layer<S> for CleanParamsLayer {
    type Service = CleanParams<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CleanParams { inner }
    }
}

#[derive(Debug, Clone)]
pub struct CleanParams<S> {
    inner: S,
}

impl<S> Service<Request<Bytes>> for CleanParams<S>
where
    S: Service<Request<Bytes>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Bytes>) -> Self::Future {
        self.inner.call(clean_request(req))
    }
}

fn is_read_only(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD
}

fn is_mutating(method: &Method) -> bool {
    method == Method::POST || method == Method::PUT || method == Method::PATCH || method == Method::DELETE
}

/// Apply the method-specific cleaning to one request.
pub fn clean_request(req: Request<Bytes>) -> Request<Bytes> {
    let (mut parts, body) = req.into_parts();

    let body = if is_read_only(&parts.method) {
        parts.uri = rebuild_query(&parts.uri);
        body
    } else if is_mutating(&parts.method) {
        clean_json_body(&mut parts.headers, body)
    } else {
        body
    };

    Request::from_parts(parts, body)
}

fn rebuild_query(uri: &Uri) -> Uri {
    let Some(query) = uri.query() else {
        return uri.clone();
    };

    let path_and_query = match clean_query(query) {
        Some(cleaned) => format!("{}?{}", uri.path(), cleaned),
        None => uri.path().to_string(),
    };

    let mut parts = uri.clone().into_parts();
    let rebuilt = PathAndQuery::try_from(path_and_query)
        .ok()
        .and_then(|pq| {
            parts.path_and_query = Some(pq);
            Uri::from_parts(parts).ok()
        });

    match rebuilt {
        Some(uri) => uri,
        None => {
            tracing::warn!(uri = %uri, "Could not rebuild query string, sending it unmodified");
            uri.clone()
        }
    }
}

fn is_json_content_type(value: &HeaderValue) -> bool {
    value
        .to_str()
        .map(|ct| {
            let ct = ct.to_ascii_lowercase();
            ct.starts_with("application/json") || ct.contains("+json")
        })
        .unwrap_or(false)
}

fn clean_json_body(headers: &mut HeaderMap, body: Bytes) -> Bytes {
    if body.is_empty() {
        return body;
    }

    let declared_json = match headers.get(CONTENT_TYPE) {
        Some(ct) if is_json_content_type(ct) => true,
        Some(_) => return body,
        None => false,
    };

    let mut value = match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(value) => value,
        Err(e) => {
            if declared_json {
                tracing::warn!(error = %e, "Malformed JSON request body, sending it unmodified");
            } else {
                tracing::debug!("Untyped request body is not JSON, sending it unmodified");
            }
            return body;
        }
    };

    clean_value(&mut value);
    match serde_json::to_vec(&value) {
        Ok(cleaned) => {
            if headers.contains_key(CONTENT_LENGTH) {
                headers.insert(CONTENT_LENGTH, HeaderValue::from(cleaned.len()));
            }
            Bytes::from(cleaned)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to re-serialize cleaned body, sending it unmodified");
            body
        }
    }
}

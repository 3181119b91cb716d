//! The request pipeline entry point.
//!
//! # Responsibilities
//! - Turn a [`RequestDescriptor`] into a wire request against the base URL
//! - Run it through envelope checking, auth, cleaning and request-id layers
//! - Decode envelope `data` for typed callers
//! - Record per-call outcome metrics
//!
//! # Design Decisions
//! - The layer stack is assembled per call around a clone of the transport,
//!   so `ApiClient` stays `Sync` and calls never share mutable state
//! - No retries, no timeouts: failures go straight back to the caller

use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tower::{Service, ServiceBuilder, ServiceExt};
use tower_http::request_id::{MakeRequestUuid, SetRequestIdLayer};
use tracing::Instrument;
use url::Url;

use crate::config::{ApiConfig, GatewayConfig};
use crate::error::{PipelineError, PipelineResult, TransportError};
use crate::http::descriptor::RequestDescriptor;
use crate::http::envelope::{Envelope, Page};
use crate::http::request::{AuthLayer, CleanParamsLayer};
use crate::http::response::EnvelopeLayer;
use crate::observability::metrics;
use crate::session::{Anonymous, IgnoreExpiry, SessionExpiredHandler, SessionProvider};
use crate::transport::HttpTransport;

/// Authenticated API client.
pub struct ApiClient<T = HttpTransport> {
    base_url: Url,
    transport: T,
    auth: AuthLayer,
    envelope: EnvelopeLayer,
    request_id: bool,
}

/// Builder for [`ApiClient`].
pub struct ApiClientBuilder<T> {
    base_url: String,
    unauthorized_code: i64,
    request_id: bool,
    transport: T,
    session: Arc<dyn SessionProvider>,
    on_session_expired: Arc<dyn SessionExpiredHandler>,
}

impl<T> ApiClientBuilder<T> {
    pub fn session(mut self, provider: Arc<dyn SessionProvider>) -> Self {
        self.session = provider;
        self
    }

    pub fn on_session_expired(mut self, handler: Arc<dyn SessionExpiredHandler>) -> Self {
        self.on_session_expired = handler;
        self
    }

    pub fn unauthorized_code(mut self, code: i64) -> Self {
        self.unauthorized_code = code;
        self
    }

    pub fn request_id(mut self, enabled: bool) -> Self {
        self.request_id = enabled;
        self
    }

    pub fn build(self) -> PipelineResult<ApiClient<T>> {
        let base_url = Url::parse(&self.base_url)?;
        Ok(ApiClient {
            base_url,
            transport: self.transport,
            auth: AuthLayer::new(self.session),
            envelope: EnvelopeLayer::new(self.unauthorized_code, self.on_session_expired),
            request_id: self.request_id,
        })
    }
}

impl ApiClient<HttpTransport> {
    /// One-call setup with the default reqwest transport.
    pub fn configure(
        base_url: &str,
        provider: Arc<dyn SessionProvider>,
        on_session_expired: Arc<dyn SessionExpiredHandler>,
    ) -> PipelineResult<Self> {
        let config = GatewayConfig::default();
        let transport = HttpTransport::new(&config.transport)?;
        let api = ApiConfig {
            base_url: base_url.to_string(),
            ..config.api
        };

        ApiClient::builder(&api, transport)
            .session(provider)
            .on_session_expired(on_session_expired)
            .build()
    }

    /// Build from a loaded configuration file.
    pub fn from_config(
        config: &GatewayConfig,
        provider: Arc<dyn SessionProvider>,
        on_session_expired: Arc<dyn SessionExpiredHandler>,
    ) -> PipelineResult<Self> {
        let transport = HttpTransport::new(&config.transport)?;
        ApiClient::builder(&config.api, transport)
            .session(provider)
            .on_session_expired(on_session_expired)
            .build()
    }
}

impl<T> ApiClient<T> {
    /// Start from `[api]` settings. Anonymous session and no expiry reaction
    /// until configured otherwise.
    pub fn builder(api: &ApiConfig, transport: T) -> ApiClientBuilder<T> {
        ApiClientBuilder {
            base_url: api.base_url.clone(),
            unauthorized_code: api.unauthorized_code,
            request_id: api.request_id,
            transport,
            session: Arc::new(Anonymous),
            on_session_expired: Arc::new(IgnoreExpiry),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

impl<T> ApiClient<T>
where
    T: Service<Request<Bytes>, Response = Response<Bytes>, Error = TransportError> + Clone + Send + 'static,
    T::Future: Send + 'static,
{
    /// Run one call through the pipeline. On success the response is
    /// envelope-checked; its body is the untouched buffer.
    pub async fn send(&self, descriptor: RequestDescriptor) -> PipelineResult<Response<Bytes>> {
        let method = descriptor.method().clone();
        let span = tracing::debug_span!("pipeline", method = %method, target = %descriptor.target());

        let result = self.dispatch(descriptor).instrument(span).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.outcome(),
        };
        metrics::record_request(method.as_str(), outcome);
        result
    }

    /// Send and decode the envelope's `data` into `D`.
    pub async fn send_json<D: DeserializeOwned>(&self, descriptor: RequestDescriptor) -> PipelineResult<D> {
        let response = self.send(descriptor).await?;
        decode_data(response.body())
    }

    /// Send to a list endpoint.
    pub async fn send_page<D: DeserializeOwned>(&self, descriptor: RequestDescriptor) -> PipelineResult<Page<D>> {
        self.send_json(descriptor).await
    }

    async fn dispatch(&self, descriptor: RequestDescriptor) -> PipelineResult<Response<Bytes>> {
        let request = descriptor.into_request(&self.base_url)?;

        let stack = ServiceBuilder::new()
            .layer(self.envelope.clone())
            .layer(self.auth.clone())
            .layer(CleanParamsLayer)
            .option_layer(self.request_id.then(|| SetRequestIdLayer::x_request_id(MakeRequestUuid)))
            .map_request(log_outgoing)
            .service(self.transport.clone().map_err(PipelineError::Transport));

        stack.oneshot(request).await
    }
}

fn log_outgoing(req: Request<Bytes>) -> Request<Bytes> {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    tracing::debug!(
        uri = %req.uri(),
        request_id = %request_id,
        authenticated = req.headers().contains_key(http::header::AUTHORIZATION),
        "Dispatching request"
    );
    req
}

/// Decode the `data` field of an envelope body.
pub fn decode_data<D: DeserializeOwned>(body: &[u8]) -> PipelineResult<D> {
    let envelope: Envelope<Value> = serde_json::from_slice(body).map_err(PipelineError::Decode)?;
    envelope.into_data()
}

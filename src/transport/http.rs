//! reqwest-backed transport.

use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::{Request, Response};
use tower::Service;

use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::http::abort::AbortSignal;

/// Sends pipeline requests with a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(secs) = config.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(TransportError::Request)?;
        Ok(Self { client })
    }

    /// Wrap an existing client (custom TLS, proxies, ...).
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Service<Request<Bytes>> for HttpTransport {
    type Response = Response<Bytes>;
    type Error = TransportError;
    type Future = BoxFuture<'static, Result<Response<Bytes>, TransportError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Bytes>) -> Self::Future {
        let client = self.client.clone();
        Box::pin(async move { execute(client, req).await })
    }
}

async fn execute(client: reqwest::Client, req: Request<Bytes>) -> Result<Response<Bytes>, TransportError> {
    let signal = req.extensions().get::<AbortSignal>().cloned();
    let request = reqwest::Request::try_from(req).map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

    let Some(signal) = signal else {
        return fetch(&client, request).await;
    };
    if signal.is_aborted() {
        return Err(TransportError::Aborted);
    }

    tokio::select! {
        biased;
        _ = signal.aborted() => {
            tracing::debug!("Request aborted by caller");
            Err(TransportError::Aborted)
        }
        result = fetch(&client, request) => result,
    }
}

async fn fetch(client: &reqwest::Client, request: reqwest::Request) -> Result<Response<Bytes>, TransportError> {
    let response = client.execute(request).await.map_err(classify)?;

    let mut builder = Response::builder()
        .status(response.status())
        .version(response.version());
    if let Some(headers) = builder.headers_mut() {
        *headers = response.headers().clone();
    }

    let body = response.bytes().await.map_err(TransportError::Body)?;
    builder.body(body).map_err(|e| TransportError::Other(e.to_string()))
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err)
    } else if err.is_connect() {
        TransportError::Connect(err)
    } else {
        TransportError::Request(err)
    }
}

//! Request descriptors: what a call site asks for, before interception.

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{Extensions, HeaderMap, Method, Request, Uri};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::error::PipelineError;
use crate::http::abort::AbortSignal;
use crate::http::clean::is_absent_param;

/// Where the user was when the call was made. Used as the post-login return
/// path if the session turns out to be expired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentLocation(pub String);

#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(Value),
    Raw {
        bytes: Bytes,
        content_type: Option<String>,
    },
}

/// Method, target, headers, query, body and transport extensions of one call.
#[derive(Debug)]
pub struct RequestDescriptor {
    method: Method,
    target: String,
    headers: HeaderMap,
    query: Vec<(String, Value)>,
    body: Option<RequestBody>,
    extensions: Extensions,
    error: Option<String>,
}

impl RequestDescriptor {
    /// `target` is either a path joined onto the client's base URL or an
    /// absolute `http(s)://` URL used as is.
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: None,
            extensions: Extensions::new(),
            error: None,
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::GET, target)
    }

    pub fn post(target: impl Into<String>) -> Self {
        Self::new(Method::POST, target)
    }

    pub fn put(target: impl Into<String>) -> Self {
        Self::new(Method::PUT, target)
    }

    pub fn patch(target: impl Into<String>) -> Self {
        Self::new(Method::PATCH, target)
    }

    pub fn delete(target: impl Into<String>) -> Self {
        Self::new(Method::DELETE, target)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Add one query parameter. Arrays are sent comma-joined.
    pub fn query<V: Serialize>(mut self, key: impl Into<String>, value: V) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => self.query.push((key.into(), value)),
            Err(e) => self.fail(format!("query parameter could not be serialized: {}", e)),
        }
        self
    }

    /// Add every field of a serializable filter struct or map as a query
    /// parameter, sorted by key.
    pub fn query_object<V: Serialize>(mut self, params: &V) -> Self {
        match serde_json::to_value(params) {
            Ok(Value::Object(map)) => self.query.extend(map),
            Ok(other) => self.fail(format!("query object must serialize to a map, got {}", other)),
            Err(e) => self.fail(format!("query object could not be serialized: {}", e)),
        }
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => self.fail(format!("invalid header '{}'", name)),
        }
        self
    }

    pub fn json<V: Serialize>(mut self, body: &V) -> Self {
        match serde_json::to_value(body) {
            Ok(value) => self.body = Some(RequestBody::Json(value)),
            Err(e) => self.fail(format!("body could not be serialized: {}", e)),
        }
        self
    }

    pub fn body(mut self, bytes: impl Into<Bytes>, content_type: Option<&str>) -> Self {
        self.body = Some(RequestBody::Raw {
            bytes: bytes.into(),
            content_type: content_type.map(str::to_string),
        });
        self
    }

    pub fn abort_signal(self, signal: AbortSignal) -> Self {
        self.extension(signal)
    }

    pub fn location(self, location: impl Into<String>) -> Self {
        self.extension(CurrentLocation(location.into()))
    }

    /// Attach any transport option. Extensions reach the transport unchanged.
    pub fn extension<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.extensions.insert(value);
        self
    }

    fn fail(&mut self, message: String) {
        if self.error.is_none() {
            self.error = Some(message);
        }
    }

    /// Resolve against `base_url` and build the wire request.
    pub fn into_request(self, base_url: &Url) -> Result<Request<Bytes>, PipelineError> {
        if let Some(message) = self.error {
            return Err(PipelineError::InvalidDescriptor(message));
        }

        let mut url = resolve_target(base_url, &self.target)?;
        let params = to_search_params(&self.query);
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params.iter());
        }
        let uri: Uri = url
            .as_str()
            .parse()
            .map_err(|e| PipelineError::InvalidDescriptor(format!("{}: {}", url, e)))?;

        let mut headers = self.headers;
        let body = match self.body {
            None => Bytes::new(),
            Some(RequestBody::Json(value)) => {
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
                serde_json::to_vec(&value)
                    .map(Bytes::from)
                    .map_err(|e| PipelineError::InvalidDescriptor(e.to_string()))?
            }
            Some(RequestBody::Raw { bytes, content_type }) => {
                if let Some(ct) = content_type {
                    let value = HeaderValue::try_from(ct.as_str())
                        .map_err(|_| PipelineError::InvalidDescriptor(format!("invalid content type '{}'", ct)))?;
                    headers.insert(CONTENT_TYPE, value);
                }
                bytes
            }
        };

        let mut request = Request::new(body);
        *request.method_mut() = self.method;
        *request.uri_mut() = uri;
        *request.headers_mut() = headers;
        *request.extensions_mut() = self.extensions;
        Ok(request)
    }
}

fn resolve_target(base_url: &Url, target: &str) -> Result<Url, PipelineError> {
    if target.starts_with("http://") || target.starts_with("https://") {
        return Ok(Url::parse(target)?);
    }

    let joined = format!(
        "{}/{}",
        base_url.as_str().trim_end_matches('/'),
        target.trim_start_matches('/')
    );
    Ok(Url::parse(&joined)?)
}

fn scalar_to_param(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    };
    if is_absent_param(&text) {
        None
    } else {
        Some(text)
    }
}

/// Encode query values: absent ones are skipped, arrays are comma-joined.
pub fn to_search_params(query: &[(String, Value)]) -> Vec<(String, String)> {
    query
        .iter()
        .filter_map(|(key, value)| {
            let text = match value {
                Value::Array(items) => {
                    let parts: Vec<String> = items.iter().filter_map(scalar_to_param).collect();
                    if parts.is_empty() {
                        return None;
                    }
                    parts.join(",")
                }
                other => scalar_to_param(other)?,
            };
            Some((key.clone(), text))
        })
        .collect()
}

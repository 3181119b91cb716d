//! Response envelope shared by every API endpoint.

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::PipelineError;

/// `{ "code": 0, "message": "...", "data": ... }`. Only `code == 0` is success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(deserialize_with = "deserialize_code")]
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

impl Envelope<Value> {
    /// Convert `data` into the caller's type. A missing `data` is treated as
    /// JSON `null`, so `()` and `Option<_>` targets work for empty replies.
    pub fn into_data<T: DeserializeOwned>(self) -> Result<T, PipelineError> {
        serde_json::from_value(self.data.unwrap_or(Value::Null)).map_err(PipelineError::Decode)
    }
}

/// Some backends send the code as a numeric string (`"code": "1"`).
fn deserialize_code<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Code {
        Int(i64),
        Text(String),
    }

    match Code::deserialize(deserializer)? {
        Code::Int(code) => Ok(code),
        Code::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("envelope code '{}' is not an integer", text))),
    }
}

/// Just enough of an envelope to classify a response.
#[derive(Debug, Deserialize)]
pub(crate) struct EnvelopeHead {
    #[serde(deserialize_with = "deserialize_code")]
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
}

impl EnvelopeHead {
    /// Parse `body` as an envelope. `None` when the body is not a JSON object
    /// with an integer (or integer string) `code`.
    pub fn peek(body: &[u8]) -> Option<Self> {
        if body.is_empty() {
            return None;
        }
        match serde_json::from_slice::<Value>(body).ok()? {
            value @ Value::Object(_) => serde_json::from_value(value).ok(),
            _ => None,
        }
    }

    pub fn into_message(self) -> String {
        match self.message {
            Some(message) if !message.is_empty() => message,
            _ => format!("request failed with code {}", self.code),
        }
    }
}

/// `data` of a list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub paginate: Paginate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginate {
    pub page_index: u64,
    pub page_size: u64,
    pub total: u64,
}

impl Paginate {
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            0
        } else {
            self.total.div_ceil(self.page_size)
        }
    }
}

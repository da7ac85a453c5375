//! Per-call request options and decoded responses.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tenantlink_domain::{Result, SdkError};
use tokio_util::sync::CancellationToken;

/// Request body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Serialized as JSON with `Content-Type: application/json`
    Json(Value),
    /// Sent verbatim with the given content type
    Raw { content_type: String, body: String },
}

impl RequestBody {
    pub(crate) fn content_type(&self) -> &str {
        match self {
            Self::Json(_) => "application/json",
            Self::Raw { content_type, .. } => content_type,
        }
    }

    pub(crate) fn into_string(self) -> String {
        match self {
            Self::Json(value) => value.to_string(),
            Self::Raw { body, .. } => body,
        }
    }
}

/// Options for one API call.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Query parameters, appended in order
    pub params: Vec<(String, String)>,
    /// Headers overriding the client and context defaults
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    /// Cancels the in-flight HTTP call when triggered
    pub cancel: Option<CancellationToken>,
}

impl RequestOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// JSON body from any serializable value.
    ///
    /// # Errors
    /// Returns `SdkError::Validation` if `body` does not serialize
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| SdkError::validation(format!("Cannot serialize request body: {e}")))?;
        self.body = Some(RequestBody::Json(value));
        Ok(self)
    }

    #[must_use]
    pub fn raw_body(mut self, content_type: impl Into<String>, body: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Raw { content_type: content_type.into(), body: body.into() });
        self
    }

    #[must_use]
    pub fn cancel_with(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Decoded successful response.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// JSON body; an empty body decodes as `Value::Null`
    Json(Value),
    /// Text body, for XML accept headers or non-JSON content
    Text(String),
    /// 204 No Content
    NoContent,
}

impl ApiResponse {
    #[must_use]
    pub const fn is_no_content(&self) -> bool {
        matches!(self, Self::NoContent)
    }

    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Deserialize into `T`.
    ///
    /// No-content decodes from `null` (so `()` and `Option<_>` work), text
    /// decodes from a JSON string.
    ///
    /// # Errors
    /// Returns `SdkError::Validation` if the body does not fit `T`
    pub fn decode<T: DeserializeOwned>(self) -> Result<T> {
        let value = match self {
            Self::Json(value) => value,
            Self::Text(text) => Value::String(text),
            Self::NoContent => Value::Null,
        };
        serde_json::from_value(value)
            .map_err(|e| SdkError::validation(format!("Unexpected response shape: {e}")))
    }
}

/// Merge header layers, later layers winning. Names compare
/// case-insensitively; the winning layer's spelling is kept.
pub(crate) fn merge_headers(layers: &[&[(String, String)]]) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = Vec::new();
    for layer in layers {
        for (name, value) in layer.iter() {
            match merged.iter_mut().find(|(existing, _)| existing.eq_ignore_ascii_case(name)) {
                Some(slot) => *slot = (name.clone(), value.clone()),
                None => merged.push((name.clone(), value.clone())),
            }
        }
    }
    merged
}

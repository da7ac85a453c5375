use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use tenantlink_domain::{ErrorInfo, NetworkErrorKind, SdkError};
use thiserror::Error;
use url::Url;

/// HTTP verbs the SDK issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl HttpMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            other => Err(format!("unsupported HTTP method `{other}`")),
        }
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, value)| value.as_str())
}

/// Outbound request as handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    #[must_use]
    pub const fn new(method: HttpMethod, url: Url) -> Self {
        Self { method, url, headers: Vec::new(), body: None }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Response as returned by the transport, body fully read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Canonical reason phrase, e.g. `"Not Found"`
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, status_text: String::new(), headers: Vec::new(), body: body.into() }
    }

    #[must_use]
    pub fn with_status_text(mut self, status_text: impl Into<String>) -> Self {
        self.status_text = status_text.into();
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Failure before any HTTP status was received.
///
/// `name` is the failure class reported by the HTTP stack (for example
/// `TimeoutError` or `ConnectError`); together with `message` it decides
/// the [`NetworkErrorKind`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name}: {message}")]
pub struct TransportError {
    pub name: String,
    pub message: String,
}

impl TransportError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: name.into(), message: message.into() }
    }

    /// The request was cancelled by its caller.
    pub fn aborted(message: impl Into<String>) -> Self {
        Self::new("AbortError", message)
    }

    #[must_use]
    pub fn kind(&self) -> NetworkErrorKind {
        NetworkErrorKind::classify(&self.name, &self.message)
    }
}

impl From<TransportError> for SdkError {
    fn from(err: TransportError) -> Self {
        let kind = err.kind();
        let message = match kind {
            NetworkErrorKind::Aborted => format!("Request aborted: {}", err.message),
            NetworkErrorKind::Timeout => format!("Request timed out: {}", err.message),
            NetworkErrorKind::Generic => format!("Network error: {}", err.message),
        };
        Self::Network { kind, info: ErrorInfo::new(message) }
    }
}

/// The HTTP stack.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform `request` and read the whole response body.
    ///
    /// Non-2xx statuses are successful transports; only failures that
    /// produced no status are errors.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use tenantlink_domain::ErrorType;

    use super::*;

    #[test]
    fn test_method_round_trip() {
        for method in [HttpMethod::Get, HttpMethod::Post, HttpMethod::Delete] {
            assert_eq!(method.as_str().parse::<HttpMethod>().unwrap(), method);
        }
        assert_eq!("patch".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);
        assert!("TRACE".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let response = HttpResponse::new(200, "").with_header("X-Request-Id", "abc");
        assert_eq!(response.header("x-request-id"), Some("abc"));
        assert_eq!(response.header("missing"), None);
    }

    #[test]
    fn test_transport_error_maps_to_network_error() {
        let err: SdkError = TransportError::new("TimeoutError", "deadline elapsed").into();
        assert_eq!(err.error_type(), ErrorType::Network);
        assert_eq!(err.network_kind(), Some(NetworkErrorKind::Timeout));
        assert!(err.message().contains("timed out"));

        let err: SdkError = TransportError::aborted("caller went away").into();
        assert_eq!(err.network_kind(), Some(NetworkErrorKind::Aborted));

        let err: SdkError = TransportError::new("ConnectError", "dns error").into();
        assert_eq!(err.network_kind(), Some(NetworkErrorKind::Generic));
        assert!(err.status_code().is_none());
    }
}

//! Error types used throughout the SDK
//!
//! Every failed operation surfaces as exactly one [`SdkError`]. Each variant
//! carries an [`ErrorInfo`] with a human readable message, the HTTP status
//! when one exists, the backend trace id when one was reported, and the
//! instant the error was produced.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Machine-checkable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorType {
    /// 401, missing/expired token, failed refresh, bad authorization code
    #[serde(rename = "AuthenticationError")]
    Authentication,
    /// 403
    #[serde(rename = "AuthorizationError")]
    Authorization,
    /// 400 and unmapped statuses
    #[serde(rename = "ValidationError")]
    Validation,
    /// 404
    #[serde(rename = "NotFoundError")]
    NotFound,
    /// 429
    #[serde(rename = "RateLimitError")]
    RateLimit,
    /// 5xx
    #[serde(rename = "ServerError")]
    Server,
    /// Transport-level failure before any HTTP status was received
    #[serde(rename = "NetworkError")]
    Network,
}

impl ErrorType {
    /// Stable wire name, e.g. `"NotFoundError"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authentication => "AuthenticationError",
            Self::Authorization => "AuthorizationError",
            Self::Validation => "ValidationError",
            Self::NotFound => "NotFoundError",
            Self::RateLimit => "RateLimitError",
            Self::Server => "ServerError",
            Self::Network => "NetworkError",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sub-kind of a [`SdkError::Network`] failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkErrorKind {
    /// The caller cancelled the request
    Aborted,
    /// The transport gave up waiting
    Timeout,
    /// DNS, connect, TLS, reset, or anything else
    Generic,
}

impl NetworkErrorKind {
    /// Classify a transport failure from its name and message.
    ///
    /// Abort wins over timeout when both appear, since a cancelled request
    /// commonly reports the timer that cancelled it.
    #[must_use]
    pub fn classify(name: &str, message: &str) -> Self {
        let haystack = format!("{name} {message}").to_ascii_lowercase();
        if haystack.contains("abort") || haystack.contains("cancel") {
            Self::Aborted
        } else if haystack.contains("timeout") || haystack.contains("timed out") {
            Self::Timeout
        } else {
            Self::Generic
        }
    }
}

/// Payload shared by every error variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    /// Human readable description
    pub message: String,
    /// HTTP status, absent for local and transport failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Backend trace/request id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// When the error was produced
    pub timestamp: DateTime<Utc>,
    /// Format-specific extras from the error body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
}

impl ErrorInfo {
    /// Create an info stamped with the current time.
    pub fn new(message: impl Into<String>) -> Self {
        Self::at(message, Utc::now())
    }

    /// Create an info stamped with `timestamp`.
    pub fn at(message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            message: message.into(),
            status_code: None,
            request_id: None,
            timestamp,
            details: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details = if details.is_empty() { None } else { Some(details) };
        self
    }
}

/// Main error type for the SDK
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "type")]
pub enum SdkError {
    #[error("{}", .0.message)]
    #[serde(rename = "AuthenticationError")]
    Authentication(ErrorInfo),

    #[error("{}", .0.message)]
    #[serde(rename = "AuthorizationError")]
    Authorization(ErrorInfo),

    #[error("{}", .0.message)]
    #[serde(rename = "ValidationError")]
    Validation(ErrorInfo),

    #[error("{}", .0.message)]
    #[serde(rename = "NotFoundError")]
    NotFound(ErrorInfo),

    #[error("{}", .0.message)]
    #[serde(rename = "RateLimitError")]
    RateLimit(ErrorInfo),

    #[error("{}", .0.message)]
    #[serde(rename = "ServerError")]
    Server(ErrorInfo),

    #[error("{}", info.message)]
    #[serde(rename = "NetworkError")]
    Network {
        kind: NetworkErrorKind,
        #[serde(flatten)]
        info: ErrorInfo,
    },
}

impl SdkError {
    /// Wrap `info` in the variant for `error_type`.
    ///
    /// Network errors built this way are [`NetworkErrorKind::Generic`].
    #[must_use]
    pub fn from_info(error_type: ErrorType, info: ErrorInfo) -> Self {
        match error_type {
            ErrorType::Authentication => Self::Authentication(info),
            ErrorType::Authorization => Self::Authorization(info),
            ErrorType::Validation => Self::Validation(info),
            ErrorType::NotFound => Self::NotFound(info),
            ErrorType::RateLimit => Self::RateLimit(info),
            ErrorType::Server => Self::Server(info),
            ErrorType::Network => Self::Network { kind: NetworkErrorKind::Generic, info },
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication(ErrorInfo::new(message))
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization(ErrorInfo::new(message))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(ErrorInfo::new(message))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(ErrorInfo::new(message))
    }

    pub fn network(kind: NetworkErrorKind, message: impl Into<String>) -> Self {
        Self::Network { kind, info: ErrorInfo::new(message) }
    }

    /// Category of this error.
    #[must_use]
    pub const fn error_type(&self) -> ErrorType {
        match self {
            Self::Authentication(_) => ErrorType::Authentication,
            Self::Authorization(_) => ErrorType::Authorization,
            Self::Validation(_) => ErrorType::Validation,
            Self::NotFound(_) => ErrorType::NotFound,
            Self::RateLimit(_) => ErrorType::RateLimit,
            Self::Server(_) => ErrorType::Server,
            Self::Network { .. } => ErrorType::Network,
        }
    }

    /// Shared payload.
    #[must_use]
    pub const fn info(&self) -> &ErrorInfo {
        match self {
            Self::Authentication(info)
            | Self::Authorization(info)
            | Self::Validation(info)
            | Self::NotFound(info)
            | Self::RateLimit(info)
            | Self::Server(info)
            | Self::Network { info, .. } => info,
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.info().message
    }

    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        self.info().status_code
    }

    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.info().request_id.as_deref()
    }

    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.info().timestamp
    }

    /// Network sub-kind, `None` for HTTP-level errors.
    #[must_use]
    pub const fn network_kind(&self) -> Option<NetworkErrorKind> {
        match self {
            Self::Network { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether repeating the same request may succeed.
    ///
    /// Server errors are retryable only for 502, 503 and 504. Network
    /// failures are retryable unless the caller aborted them.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Server(info) => matches!(info.status_code, Some(502..=504)),
            Self::Network { kind, .. } => !matches!(kind, NetworkErrorKind::Aborted),
            _ => false,
        }
    }
}

/// Result type alias for SDK operations
pub type Result<T> = std::result::Result<T, SdkError>;

/// Normalized view of a backend error body.
///
/// Short-lived: produced per failed response and consumed by the error
/// factory, never persisted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedErrorInfo {
    pub message: String,
    pub code: String,
    pub details: Map<String, Value>,
    pub request_id: Option<String>,
}

//! HTTP status to [`SdkError`] mapping.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tenantlink_domain::{ErrorInfo, ErrorType, ParsedErrorInfo, SdkError};

/// Error category for an HTTP status.
///
/// Statuses without a dedicated category are validation errors.
#[must_use]
pub const fn error_type_for_status(status: u16) -> ErrorType {
    match status {
        400 => ErrorType::Validation,
        401 => ErrorType::Authentication,
        403 => ErrorType::Authorization,
        404 => ErrorType::NotFound,
        429 => ErrorType::RateLimit,
        500.. => ErrorType::Server,
        _ => ErrorType::Validation,
    }
}

const fn is_mapped(status: u16) -> bool {
    matches!(status, 400 | 401 | 403 | 404 | 429 | 500..)
}

/// Build the error for a failed response with status `status`.
///
/// Unmapped statuses get `(HTTP {status})` appended to the message so the
/// original status stays visible. The parsed code lands in
/// `details["code"]`.
#[must_use]
pub fn create_error(status: u16, parsed: ParsedErrorInfo, now: DateTime<Utc>) -> SdkError {
    let message = if is_mapped(status) {
        parsed.message
    } else {
        format!("{} (HTTP {status})", parsed.message)
    };

    let mut details = parsed.details;
    if !parsed.code.is_empty() {
        details.insert("code".to_string(), Value::String(parsed.code));
    }

    let info = ErrorInfo::at(message, now)
        .with_status(status)
        .with_request_id(parsed.request_id)
        .with_details(details);

    SdkError::from_info(error_type_for_status(status), info)
}

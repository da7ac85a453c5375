//! Backend error body normalization
//!
//! Each backend service reports errors in its own JSON shape. The parser
//! walks an ordered list of [`ErrorFormat`]s and lets the first one that
//! recognizes the body produce a [`ParsedErrorInfo`]. The last format is a
//! catch-all, so parsing never fails.

use serde_json::{Map, Value};
use tenantlink_domain::ParsedErrorInfo;
use tracing::trace;

/// Longest raw body echoed back as a message.
const MAX_TEXT_MESSAGE: usize = 512;

/// A failed response as seen by the parsers.
#[derive(Debug, Clone)]
pub struct ErrorBody<'a> {
    pub status: u16,
    pub status_text: &'a str,
    pub raw: &'a str,
    /// The body when it is a JSON object
    pub json: Option<Map<String, Value>>,
}

impl<'a> ErrorBody<'a> {
    #[must_use]
    pub fn new(status: u16, status_text: &'a str, raw: &'a str) -> Self {
        let json = match serde_json::from_str(raw) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        };
        Self { status, status_text, raw, json }
    }

    fn field(&self, name: &str) -> Option<&Value> {
        self.json.as_ref().and_then(|map| map.get(name))
    }

    fn string(&self, name: &str) -> Option<String> {
        self.field(name).and_then(value_to_string)
    }

    fn details(&self) -> Map<String, Value> {
        self.json.clone().unwrap_or_default()
    }
}

/// One recognizable error shape.
#[derive(Clone, Copy)]
pub struct ErrorFormat {
    pub name: &'static str,
    pub can_handle: fn(&ErrorBody<'_>) -> bool,
    pub parse: fn(&ErrorBody<'_>) -> ParsedErrorInfo,
}

impl std::fmt::Debug for ErrorFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorFormat").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Ordered chain of error formats.
#[derive(Debug, Clone)]
pub struct ErrorParser {
    formats: Vec<ErrorFormat>,
}

impl Default for ErrorParser {
    fn default() -> Self {
        Self::new(vec![ORCHESTRATOR_FORMAT, DATA_SERVICE_FORMAT, WORKFLOW_FORMAT, GENERIC_FORMAT])
    }
}

impl ErrorParser {
    /// Build a parser from `formats`, tried in order.
    ///
    /// If no format matches, the generic format is applied anyway.
    #[must_use]
    pub fn new(formats: Vec<ErrorFormat>) -> Self {
        Self { formats }
    }

    #[must_use]
    pub fn parse(&self, status: u16, status_text: &str, raw: &str) -> ParsedErrorInfo {
        let body = ErrorBody::new(status, status_text, raw);
        let format = self
            .formats
            .iter()
            .find(|format| (format.can_handle)(&body))
            .unwrap_or(&GENERIC_FORMAT);
        trace!(format = format.name, status, "parsed error body");
        (format.parse)(&body)
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Orchestrator services: `{"message": "...", "errorCode": 1002, "traceId": "..."}`.
pub const ORCHESTRATOR_FORMAT: ErrorFormat =
    ErrorFormat { name: "orchestrator", can_handle: is_orchestrator, parse: parse_orchestrator };

fn is_orchestrator(body: &ErrorBody<'_>) -> bool {
    matches!(body.field("message"), Some(Value::String(_))) && body.field("errorCode").is_some()
}

fn parse_orchestrator(body: &ErrorBody<'_>) -> ParsedErrorInfo {
    ParsedErrorInfo {
        message: body.string("message").unwrap_or_default(),
        code: body.string("errorCode").unwrap_or_else(|| body.status.to_string()),
        details: body.details(),
        request_id: body.string("traceId"),
    }
}

/// Data services: `{"error": "..." | {"message": ...}, "traceId": "..."}`.
pub const DATA_SERVICE_FORMAT: ErrorFormat =
    ErrorFormat { name: "data-service", can_handle: is_data_service, parse: parse_data_service };

fn is_data_service(body: &ErrorBody<'_>) -> bool {
    body.field("error").is_some() && body.field("traceId").is_some()
}

fn parse_data_service(body: &ErrorBody<'_>) -> ParsedErrorInfo {
    let (message, code) = match body.field("error") {
        Some(Value::Object(error)) => (
            error.get("message").and_then(value_to_string),
            error.get("code").and_then(value_to_string),
        ),
        Some(other) => (value_to_string(other).or_else(|| Some(other.to_string())), None),
        None => (None, None),
    };

    ParsedErrorInfo {
        message: message.unwrap_or_else(|| fallback_message(body)),
        code: code.unwrap_or_else(|| body.status.to_string()),
        details: body.details(),
        request_id: body.string("traceId"),
    }
}

/// Workflow services, RFC 7807 problem details with validation errors:
/// `{"type": "...", "title": "...", "status": 400, "errors": {"field": ["msg"]}}`.
pub const WORKFLOW_FORMAT: ErrorFormat =
    ErrorFormat { name: "workflow", can_handle: is_workflow, parse: parse_workflow };

fn is_workflow(body: &ErrorBody<'_>) -> bool {
    body.field("type").is_some() && body.field("title").is_some() && body.field("status").is_some()
}

/// `field: m1, m2; other: m3`
fn flatten_field_errors(errors: &Map<String, Value>) -> String {
    errors
        .iter()
        .filter_map(|(field, messages)| {
            let messages: Vec<String> = match messages {
                Value::Array(items) => items.iter().filter_map(value_to_string).collect(),
                other => value_to_string(other).into_iter().collect(),
            };
            (!messages.is_empty()).then(|| format!("{field}: {}", messages.join(", ")))
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn parse_workflow(body: &ErrorBody<'_>) -> ParsedErrorInfo {
    let title = body.string("title").unwrap_or_else(|| fallback_message(body));
    let message = match body.field("errors") {
        Some(Value::Object(errors)) => {
            let flattened = flatten_field_errors(errors);
            if flattened.is_empty() { title } else { format!("{title}: {flattened}") }
        }
        _ => title,
    };

    ParsedErrorInfo {
        message,
        code: body.string("type").unwrap_or_else(|| body.status.to_string()),
        details: body.details(),
        request_id: body.string("traceId"),
    }
}

/// Anything else.
pub const GENERIC_FORMAT: ErrorFormat =
    ErrorFormat { name: "generic", can_handle: always, parse: parse_generic };

const fn always(_body: &ErrorBody<'_>) -> bool {
    true
}

fn fallback_message(body: &ErrorBody<'_>) -> String {
    if body.status_text.is_empty() {
        format!("HTTP {}", body.status)
    } else {
        body.status_text.to_string()
    }
}

fn parse_generic(body: &ErrorBody<'_>) -> ParsedErrorInfo {
    let text = body.raw.trim();
    let message = match &body.json {
        Some(_) => body.string("message").unwrap_or_else(|| fallback_message(body)),
        None if !text.is_empty() && serde_json::from_str::<Value>(text).is_err() => {
            text.chars().take(MAX_TEXT_MESSAGE).collect()
        }
        None => fallback_message(body),
    };

    let mut details = Map::new();
    if !body.raw.is_empty() {
        details.insert("rawBody".to_string(), Value::String(body.raw.to_string()));
    }

    ParsedErrorInfo { message, code: body.status.to_string(), details, request_id: None }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(status: u16, raw: &str) -> ParsedErrorInfo {
        ErrorParser::default().parse(status, "Bad Request", raw)
    }

    #[test]
    fn test_orchestrator_format() {
        let parsed =
            parse(400, r#"{"message":"Folder not found","errorCode":1002,"traceId":"t-1"}"#);

        assert_eq!(parsed.message, "Folder not found");
        assert_eq!(parsed.code, "1002");
        assert_eq!(parsed.request_id.as_deref(), Some("t-1"));
    }

    #[test]
    fn test_data_service_format() {
        let parsed = parse(409, r#"{"error":"Entity already exists","traceId":"t-2"}"#);

        assert_eq!(parsed.message, "Entity already exists");
        assert_eq!(parsed.code, "409");
        assert_eq!(parsed.request_id.as_deref(), Some("t-2"));

        let nested = parse(
            400,
            r#"{"error":{"message":"Bad filter","code":"InvalidFilter"},"traceId":"t-3"}"#,
        );
        assert_eq!(nested.message, "Bad filter");
        assert_eq!(nested.code, "InvalidFilter");
    }

    #[test]
    fn test_workflow_format_flattens_field_errors() {
        let parsed = parse(
            400,
            r#"{"type":"https://errors.example.com/validation","title":"Required field missing",
                "status":400,"errors":{"name":["required"],"age":["must be positive","too small"]}}"#,
        );

        assert!(parsed.message.starts_with("Required field missing: "));
        assert!(parsed.message.contains("name: required"));
        assert!(parsed.message.contains("age: must be positive, too small"));
        assert_eq!(parsed.code, "https://errors.example.com/validation");
    }

    #[test]
    fn test_first_matching_format_wins() {
        let parsed =
            parse(400, r#"{"message":"from orchestrator","errorCode":"E1","error":"x","traceId":"t"}"#);
        assert_eq!(parsed.message, "from orchestrator");
        assert_eq!(parsed.code, "E1");
    }

    #[test]
    fn test_plain_text_body_becomes_message() {
        let parsed = parse(502, "upstream connect error");

        assert_eq!(parsed.message, "upstream connect error");
        assert_eq!(parsed.code, "502");
        assert_eq!(parsed.details["rawBody"], "upstream connect error");
    }

    #[test]
    fn test_empty_body_uses_status_text() {
        assert_eq!(parse(400, "").message, "Bad Request");
        assert_eq!(ErrorParser::default().parse(418, "", "").message, "HTTP 418");
    }

    #[test]
    fn test_unrecognized_json_keeps_raw_body() {
        let parsed = parse(400, r#"{"detail":"nope"}"#);
        assert_eq!(parsed.message, "Bad Request");
        assert_eq!(parsed.details["rawBody"], r#"{"detail":"nope"}"#);
    }

    #[test]
    fn test_custom_chain_falls_back_to_generic() {
        let parser = ErrorParser::new(vec![WORKFLOW_FORMAT]);
        let parsed = parser.parse(500, "Internal Server Error", r#"{"message":"m","errorCode":1}"#);
        assert_eq!(parsed.message, "m");
        assert_eq!(parsed.code, "500");
    }
}

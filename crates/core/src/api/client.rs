//! Authenticated request pipeline
//!
//! Every call resolves `{baseUrl}/{org}/{tenant}/{path}`, attaches a valid
//! bearer token, layers headers (context defaults, then client defaults,
//! then per-call headers), sends through the transport and turns the
//! response into an [`ApiResponse`] or exactly one [`SdkError`].

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tenantlink_common::Clock;
use tenantlink_domain::{Result, SdkConfig, SdkError};
use tracing::{debug, instrument};
use url::Url;

use super::error_factory::create_error;
use super::error_parser::ErrorParser;
use super::request::{merge_headers, ApiResponse, RequestBody, RequestOptions};
use crate::auth::TokenManager;
use crate::ports::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportError};
use crate::telemetry::{track, Telemetry};

fn is_json_content_type(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.to_ascii_lowercase().contains("json"))
}

/// Tenant-scoped API client
pub struct ApiClient {
    base_url: String,
    org_name: String,
    tenant_name: String,
    default_headers: Vec<(String, String)>,
    tokens: Arc<TokenManager>,
    transport: Arc<dyn HttpTransport>,
    parser: ErrorParser,
    clock: Arc<dyn Clock>,
    telemetry: Arc<dyn Telemetry>,
}

impl ApiClient {
    pub fn new(
        config: &SdkConfig,
        tokens: Arc<TokenManager>,
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        Self {
            base_url: config.base_url().to_string(),
            org_name: config.org_name().to_string(),
            tenant_name: config.tenant_name().to_string(),
            default_headers: Vec::new(),
            tokens,
            transport,
            parser: ErrorParser::default(),
            clock,
            telemetry,
        }
    }

    /// Headers sent with every request, overridable per call.
    #[must_use]
    pub fn with_default_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.default_headers = headers;
        self
    }

    #[must_use]
    pub fn with_error_parser(mut self, parser: ErrorParser) -> Self {
        self.parser = parser;
        self
    }

    /// Absolute URL for `path` with `params` appended.
    ///
    /// # Errors
    /// Returns `SdkError::Validation` if the result is not a valid URL
    pub fn resolve_url(&self, path: &str, params: &[(String, String)]) -> Result<Url> {
        let raw = format!(
            "{}/{}/{}/{}",
            self.base_url,
            urlencoding::encode(&self.org_name),
            urlencoding::encode(&self.tenant_name),
            path.trim_start_matches('/')
        );
        let mut url = Url::parse(&raw)
            .map_err(|e| SdkError::validation(format!("Invalid request URL `{raw}`: {e}")))?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    /// Send a request and decode the response.
    ///
    /// # Errors
    /// Authentication errors from token acquisition pass through unchanged,
    /// transport failures become `SdkError::Network`, non-2xx statuses are
    /// mapped by status, and an unreadable JSON body is a validation error
    #[instrument(skip(self, options), fields(method = %method, path = %path))]
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse> {
        track(self.telemetry.as_ref(), "api.request", self.execute(method, path, options)).await
    }

    async fn execute(
        &self,
        method: HttpMethod,
        path: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse> {
        let RequestOptions { params, headers, body, cancel } = options;

        if cancel.as_ref().is_some_and(|token| token.is_cancelled()) {
            return Err(TransportError::aborted("request cancelled before it was sent").into());
        }

        let url = self.resolve_url(path, &params)?;
        let token = self.tokens.get_valid_token().await?;

        let mut context_headers = vec![
            ("Accept".to_string(), "application/json".to_string()),
            ("Authorization".to_string(), format!("Bearer {token}")),
        ];
        if let Some(body) = &body {
            context_headers.push(("Content-Type".to_string(), body.content_type().to_string()));
        }
        let headers = merge_headers(&[&context_headers, &self.default_headers, &headers]);

        let mut request = HttpRequest::new(method, url);
        request.headers = headers;
        request.body = body.map(RequestBody::into_string);
        let wants_text = request.header_value("accept").is_some_and(|v| v.contains("xml"));

        debug!(url = %request.url, "sending request");
        let sent = match cancel {
            Some(cancel) => tokio::select! {
                biased;
                () = cancel.cancelled() => Err(TransportError::aborted("request cancelled by caller")),
                response = self.transport.send(request) => response,
            },
            None => self.transport.send(request).await,
        };
        let response = sent?;
        debug!(status = response.status, "received response");

        if !response.is_success() {
            return Err(self.error_for(&response));
        }
        decode_success(response, wants_text)
    }

    fn error_for(&self, response: &HttpResponse) -> SdkError {
        let mut parsed = self.parser.parse(response.status, &response.status_text, &response.body);
        if parsed.request_id.is_none() {
            parsed.request_id = response.header("x-request-id").map(str::to_string);
        }
        create_error(response.status, parsed, self.clock.now())
    }

    /// `GET` and decode into `T`.
    ///
    /// # Errors
    /// See [`ApiClient::request`]; also fails if the body does not fit `T`
    pub async fn get<T: DeserializeOwned>(&self, path: &str, options: RequestOptions) -> Result<T> {
        self.request(HttpMethod::Get, path, options).await?.decode()
    }

    /// `POST` `body` as JSON and decode into `T`.
    ///
    /// # Errors
    /// See [`ApiClient::request`]
    pub async fn post<B, T>(&self, path: &str, body: &B, options: RequestOptions) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(HttpMethod::Post, path, options.json(body)?).await?.decode()
    }

    /// `PUT` `body` as JSON and decode into `T`.
    ///
    /// # Errors
    /// See [`ApiClient::request`]
    pub async fn put<B, T>(&self, path: &str, body: &B, options: RequestOptions) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(HttpMethod::Put, path, options.json(body)?).await?.decode()
    }

    /// `PATCH` `body` as JSON and decode into `T`.
    ///
    /// # Errors
    /// See [`ApiClient::request`]
    pub async fn patch<B, T>(&self, path: &str, body: &B, options: RequestOptions) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(HttpMethod::Patch, path, options.json(body)?).await?.decode()
    }

    /// `DELETE` and decode into `T`; use `()` for 204 responses.
    ///
    /// # Errors
    /// See [`ApiClient::request`]
    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T> {
        self.request(HttpMethod::Delete, path, options).await?.decode()
    }
}

fn decode_success(response: HttpResponse, wants_text: bool) -> Result<ApiResponse> {
    if response.status == 204 {
        return Ok(ApiResponse::NoContent);
    }
    if wants_text {
        return Ok(ApiResponse::Text(response.body));
    }
    if response.body.trim().is_empty() {
        return Ok(ApiResponse::Json(serde_json::Value::Null));
    }

    match serde_json::from_str(&response.body) {
        Ok(value) => Ok(ApiResponse::Json(value)),
        Err(_) if !is_json_content_type(response.header("content-type")) => {
            Ok(ApiResponse::Text(response.body))
        }
        Err(e) => Err(SdkError::validation(format!("Response body is not valid JSON: {e}"))),
    }
}

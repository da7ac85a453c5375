//! reqwest implementation of the [`HttpTransport`] port
//!
//! Requests go out exactly as the core pipeline built them. Responses of
//! every status come back as [`HttpResponse`]; only failures to reach the
//! server surface as [`TransportError`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client as ReqwestClient, Method};
use tenantlink_core::ports::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportError};
use tracing::debug;

use crate::errors::transport_error;

const DEFAULT_USER_AGENT: &str = concat!("tenantlink/", env!("CARGO_PKG_VERSION"));

/// [`HttpTransport`] over a reqwest client.
///
/// Connection failures can be retried with exponential backoff; nothing is
/// retried once the server has answered, and HTTP error statuses are
/// returned as responses.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: ReqwestClient,
    max_attempts: usize,
    base_backoff: Duration,
}

impl ReqwestTransport {
    /// Start building a new transport.
    #[must_use]
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }

    /// Transport with default settings.
    ///
    /// # Errors
    /// Returns `TransportError` if the TLS backend cannot be initialized
    pub fn new() -> Result<Self, TransportError> {
        Self::builder().build()
    }

    fn backoff_delay(&self, retry_number: usize) -> Duration {
        let shift = u32::try_from(retry_number.saturating_sub(1).min(8)).unwrap_or(8);
        self.base_backoff.saturating_mul(1u32 << shift)
    }

    async fn execute(&self, request: &HttpRequest) -> Result<reqwest::Response, reqwest::Error> {
        let mut builder = self.client.request(to_reqwest_method(request.method), request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        builder.send().await
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let attempts = self.max_attempts.max(1);
        let method = request.method;
        let url = request.url.clone();

        for attempt in 1..=attempts {
            debug!(attempt, %method, %url, "sending HTTP request");

            match self.execute(&request).await {
                Ok(response) => {
                    let status = response.status();
                    debug!(attempt, %method, %url, %status, "received HTTP response");
                    return read_response(response).await;
                }
                Err(err) => {
                    debug!(attempt, %method, %url, error = %err, "HTTP request failed");

                    if attempt < attempts && err.is_connect() {
                        let delay = self.backoff_delay(attempt);
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                        continue;
                    }
                    return Err(transport_error(&err));
                }
            }
        }

        Err(TransportError::new("RequestError", "transport exhausted retries without a result"))
    }
}

async fn read_response(response: reqwest::Response) -> Result<HttpResponse, TransportError> {
    let status = response.status();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value.to_str().ok().map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();
    let body = response.text().await.map_err(|err| transport_error(&err))?;

    Ok(HttpResponse {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        headers,
        body,
    })
}

const fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Head => Method::HEAD,
    }
}

/// Builder for [`ReqwestTransport`].
#[derive(Debug)]
pub struct ReqwestTransportBuilder {
    timeout: Option<Duration>,
    connect_timeout: Duration,
    max_attempts: usize,
    base_backoff: Duration,
    user_agent: String,
    default_headers: Vec<(String, String)>,
    use_system_proxy: bool,
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self {
            timeout: None,
            connect_timeout: Duration::from_secs(10),
            max_attempts: 1,
            base_backoff: Duration::from_millis(200),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            default_headers: Vec::new(),
            use_system_proxy: true,
        }
    }
}

impl ReqwestTransportBuilder {
    /// Overall deadline per request. Unset by default; callers cancel instead.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Total attempts for requests that failed to connect (initial try + retries).
    #[must_use]
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub const fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    #[must_use]
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Ignore `HTTP(S)_PROXY` environment settings.
    #[must_use]
    pub const fn no_proxy(mut self) -> Self {
        self.use_system_proxy = false;
        self
    }

    /// Build the transport.
    ///
    /// # Errors
    /// Returns `TransportError` for an invalid default header or when the
    /// reqwest client cannot be constructed
    pub fn build(self) -> Result<ReqwestTransport, TransportError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.default_headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
                TransportError::new("RequestError", format!("invalid header name `{name}`: {err}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|err| {
                TransportError::new("RequestError", format!("invalid header value: {err}"))
            })?;
            headers.insert(name, value);
        }

        let mut builder = ReqwestClient::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(self.user_agent)
            .default_headers(headers);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if !self.use_system_proxy {
            builder = builder.no_proxy();
        }

        let client = builder.build().map_err(|err| transport_error(&err))?;

        Ok(ReqwestTransport {
            client,
            max_attempts: self.max_attempts,
            base_backoff: self.base_backoff,
        })
    }
}

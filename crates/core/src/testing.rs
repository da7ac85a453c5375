//! Test doubles for the SDK ports
//!
//! Available to this crate's tests and, through the `test-utils` feature,
//! to downstream crates.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tenantlink_domain::{Result, TokenResponse};
use url::Url;

use crate::auth::{CodeExchange, TokenEndpoint};
use crate::ports::{
    HttpRequest, HttpResponse, HttpTransport, Navigator, NavigatorError, TransportError,
};
use crate::telemetry::{Telemetry, TelemetryEvent};

/// Build a token endpoint response.
#[must_use]
pub fn token_response(
    access_token: &str,
    expires_in: i64,
    refresh_token: Option<&str>,
) -> TokenResponse {
    TokenResponse {
        access_token: access_token.to_string(),
        token_type: "Bearer".to_string(),
        expires_in,
        scope: None,
        refresh_token: refresh_token.map(str::to_string),
        id_token: None,
    }
}

/// Transport that replays scripted responses in order and records every
/// request it receives.
#[derive(Debug, Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<std::result::Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
    delay: Option<Duration>,
}

impl MockTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait `delay` before answering each request.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_response(&self, response: HttpResponse) {
        self.script.lock().push_back(Ok(response));
    }

    pub fn push_error(&self, error: TransportError) {
        self.script.lock().push_back(Err(error));
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(
        &self,
        request: HttpRequest,
    ) -> std::result::Result<HttpResponse, TransportError> {
        self.requests.lock().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::new("MockError", "no scripted response left")))
    }
}

/// Token endpoint with queued outcomes.
///
/// When a queue runs dry it issues `access-{n}` / `refresh-{n}` tokens
/// valid for an hour.
#[derive(Debug, Default)]
pub struct MockTokenEndpoint {
    exchanges: Mutex<VecDeque<Result<TokenResponse>>>,
    refreshes: Mutex<VecDeque<Result<TokenResponse>>>,
    delay: Option<Duration>,
    exchange_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    last_exchange: Mutex<Option<CodeExchange>>,
    last_refresh_token: Mutex<Option<String>>,
}

impl MockTokenEndpoint {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_exchange(&self, outcome: Result<TokenResponse>) {
        self.exchanges.lock().push_back(outcome);
    }

    pub fn push_refresh(&self, outcome: Result<TokenResponse>) {
        self.refreshes.lock().push_back(outcome);
    }

    #[must_use]
    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn last_exchange(&self) -> Option<CodeExchange> {
        self.last_exchange.lock().clone()
    }

    #[must_use]
    pub fn last_refresh_token(&self) -> Option<String> {
        self.last_refresh_token.lock().clone()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl TokenEndpoint for MockTokenEndpoint {
    async fn exchange_code(&self, exchange: &CodeExchange) -> Result<TokenResponse> {
        let n = self.exchange_calls.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_exchange.lock() = Some(exchange.clone());
        self.pause().await;
        let scripted = self.exchanges.lock().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(token_response(&format!("access-{n}"), 3600, Some(&format!("refresh-{n}"))))
        })
    }

    async fn refresh(&self, _client_id: &str, refresh_token: &str) -> Result<TokenResponse> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_refresh_token.lock() = Some(refresh_token.to_string());
        self.pause().await;
        let scripted = self.refreshes.lock().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(token_response(&format!("access-{n}"), 3600, Some(&format!("refresh-{n}"))))
        })
    }
}

/// Navigator that remembers the URLs it was asked to open.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    opened: Mutex<Vec<Url>>,
}

impl RecordingNavigator {
    #[must_use]
    pub fn opened(&self) -> Vec<Url> {
        self.opened.lock().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn open(&self, url: &Url) -> std::result::Result<(), NavigatorError> {
        self.opened.lock().push(url.clone());
        Ok(())
    }
}

/// Telemetry sink that keeps every event.
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
    flushes: AtomicUsize,
}

impl RecordingTelemetry {
    #[must_use]
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().clone()
    }

    #[must_use]
    pub fn event_names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(|event| event.name).collect()
    }

    #[must_use]
    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

impl Telemetry for RecordingTelemetry {
    fn record(&self, event: &TelemetryEvent) {
        self.events.lock().push(event.clone());
    }

    fn flush(&self) {
        self.flushes.fetch_add(1, Ordering::SeqCst);
    }
}

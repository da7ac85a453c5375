//! Token lifecycle
//!
//! Hands out valid bearer tokens, refreshing expired OAuth tokens on demand.
//!
//! Refresh is single-flight: while one refresh is running, every other
//! caller that needs a refresh waits for it and receives the same outcome
//! instead of issuing its own grant. Refresh failures are fail-closed: the
//! token that could not be refreshed is cleared from memory and storage.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tenantlink_common::Clock;
use tenantlink_domain::constants::token_storage_key;
use tenantlink_domain::{Result, SdkError, TokenInfo};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::token_client::TokenEndpoint;
use super::token_store::TokenStore;
use crate::ports::Storage;

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// No token held
    Empty,
    /// Hydrating from storage
    Loading,
    /// Holding a usable token
    Valid,
    /// Holding an expired OAuth token
    Expired,
    /// A refresh grant is in flight
    Refreshing,
}

/// Outcome of the most recent refresh, shared with callers that waited on it.
#[derive(Default)]
struct RefreshGate {
    last_outcome: Option<Result<String>>,
}

struct LoadingGuard<'a>(&'a AtomicBool);

impl<'a> LoadingGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Token manager with on-demand refresh
pub struct TokenManager {
    store: TokenStore,
    endpoint: Arc<dyn TokenEndpoint>,
    clock: Arc<dyn Clock>,
    client_id: Option<String>,
    gate: Mutex<RefreshGate>,
    /// Bumped each time a refresh settles
    generation: AtomicU64,
    loading: AtomicBool,
}

impl TokenManager {
    /// Create a token manager.
    ///
    /// With a `client_id`, OAuth tokens persist under a key derived from it
    /// and refreshes are possible. Without one everything stays in memory.
    pub fn new(
        storage: Arc<dyn Storage>,
        endpoint: Arc<dyn TokenEndpoint>,
        clock: Arc<dyn Clock>,
        client_id: Option<String>,
    ) -> Self {
        let key = client_id.as_deref().map(token_storage_key);
        Self {
            store: TokenStore::new(storage, key),
            endpoint,
            clock,
            client_id,
            gate: Mutex::new(RefreshGate::default()),
            generation: AtomicU64::new(0),
            loading: AtomicBool::new(false),
        }
    }

    /// Start out holding `info`.
    #[must_use]
    pub fn with_token(mut self, info: TokenInfo) -> Self {
        self.store = self.store.with_token(info);
        self
    }

    /// Restore a persisted OAuth token.
    ///
    /// Returns `true` only when a usable token was restored.
    pub async fn load(&self) -> bool {
        let _loading = LoadingGuard::enter(&self.loading);
        let restored = self.store.load(self.clock.now()).await;
        if restored {
            info!("restored persisted access token");
        }
        restored
    }

    /// Replace the current token.
    pub async fn set_token(&self, info: TokenInfo) {
        debug!(kind = ?info.kind(), "token updated");
        self.store.replace(info).await;
    }

    /// Forget the current token, in memory and in storage.
    pub async fn clear(&self) {
        self.store.clear().await;
        debug!("token cleared");
    }

    /// Snapshot of the current token.
    pub async fn current(&self) -> Option<TokenInfo> {
        self.store.current().await
    }

    /// Whether a token usable right now is held. Never refreshes.
    pub async fn has_valid_token(&self) -> bool {
        let now = self.clock.now();
        self.store.current().await.is_some_and(|info| info.is_valid_at(now))
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> TokenState {
        if self.loading.load(Ordering::Acquire) {
            return TokenState::Loading;
        }
        if self.gate.try_lock().is_err() {
            return TokenState::Refreshing;
        }
        match self.store.current().await {
            None => TokenState::Empty,
            Some(info) if info.is_valid_at(self.clock.now()) => TokenState::Valid,
            Some(_) => TokenState::Expired,
        }
    }

    /// A bearer token usable right now, refreshing if necessary.
    ///
    /// # Errors
    /// Returns `SdkError::Authentication` when no token is held, when an
    /// expired token has no refresh token (the token is cleared), or when
    /// the refresh fails
    pub async fn get_valid_token(&self) -> Result<String> {
        let observed = self.generation.load(Ordering::Acquire);
        let Some(info) = self.store.current().await else {
            return Err(SdkError::authentication("No access token available; authenticate first"));
        };

        if info.is_valid_at(self.clock.now()) {
            return Ok(info.token().to_string());
        }

        if info.refresh_token().is_none() {
            warn!("access token expired and cannot be refreshed");
            self.store.clear_if_current(&info).await;
            return Err(SdkError::authentication(
                "Access token expired and no refresh token is available",
            ));
        }

        self.refresh_from(observed, info).await
    }

    /// Refresh the OAuth token now.
    ///
    /// Concurrent callers share one grant and its outcome.
    ///
    /// # Errors
    /// Returns `SdkError::Authentication` if there is nothing to refresh or
    /// the grant fails
    #[instrument(skip(self))]
    pub async fn refresh_token(&self) -> Result<String> {
        let observed = self.generation.load(Ordering::Acquire);
        let Some(info) = self.store.current().await else {
            return Err(SdkError::authentication("No token to refresh"));
        };
        self.refresh_from(observed, info).await
    }

    /// Refresh `stale`, a snapshot taken no earlier than generation
    /// `observed` was read.
    ///
    /// Precondition failures return before the gate and are not shared
    /// with other callers.
    async fn refresh_from(&self, observed: u64, stale: TokenInfo) -> Result<String> {
        self.refresh_grant(&stale)?;
        let mut gate = self.gate.lock().await;

        if self.generation.load(Ordering::Acquire) != observed {
            if let Some(outcome) = gate.last_outcome.clone() {
                debug!("joined refresh completed while waiting");
                return outcome;
            }
        }

        // The slot may have moved on since `stale` was taken
        let Some(current) = self.store.current().await else {
            return Err(SdkError::authentication("No token to refresh"));
        };
        if current != stale {
            if current.is_valid_at(self.clock.now()) {
                debug!("token replaced while waiting; skipping refresh");
                return Ok(current.token().to_string());
            }
            self.refresh_grant(&current)?;
        }

        let outcome = self.perform_refresh(&current).await;
        gate.last_outcome = Some(outcome.clone());
        self.generation.fetch_add(1, Ordering::AcqRel);
        outcome
    }

    /// Client id and refresh token for a grant on `info`.
    fn refresh_grant<'a>(&'a self, info: &'a TokenInfo) -> Result<(&'a str, &'a str)> {
        if info.is_secret() {
            return Err(SdkError::authentication("Secret tokens cannot be refreshed"));
        }
        let Some(refresh_token) = info.refresh_token() else {
            return Err(SdkError::authentication("No refresh token available"));
        };
        let Some(client_id) = self.client_id.as_deref() else {
            return Err(SdkError::authentication("No OAuth client id configured for refresh"));
        };
        Ok((client_id, refresh_token))
    }

    async fn perform_refresh(&self, info: &TokenInfo) -> Result<String> {
        let (client_id, refresh_token) = self.refresh_grant(info)?;

        match self.endpoint.refresh(client_id, refresh_token).await {
            Ok(response) => {
                let issued = TokenInfo::from_response(&response, self.clock.now());
                let next = match (issued.refresh_token(), issued.expires_at()) {
                    (None, Some(expires_at)) => TokenInfo::oauth(
                        issued.token(),
                        expires_at,
                        Some(refresh_token.to_string()),
                    ),
                    _ => issued,
                };
                let token = next.token().to_string();
                self.store.replace(next).await;
                info!(expires_in = response.expires_in, "access token refreshed");
                Ok(token)
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed; clearing token");
                self.store.clear_if_current(info).await;
                Err(refresh_failure(&err))
            }
        }
    }
}

fn refresh_failure(err: &SdkError) -> SdkError {
    let mut info = err.info().clone();
    info.message = format!("Token refresh failed: {}", info.message);
    SdkError::Authentication(info)
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use chrono::Duration;
    use futures::future::join_all;
    use tenantlink_common::testing::MockClock;
    use tenantlink_domain::{ErrorInfo, ErrorType};

    use super::*;
    use crate::ports::MemoryStorage;
    use crate::testing::{token_response, MockTokenEndpoint};

    struct Fixture {
        clock: MockClock,
        storage: MemoryStorage,
        endpoint: Arc<MockTokenEndpoint>,
        manager: Arc<TokenManager>,
    }

    fn fixture(endpoint: MockTokenEndpoint) -> Fixture {
        let clock = MockClock::new();
        let storage = MemoryStorage::new();
        let endpoint = Arc::new(endpoint);
        let manager = Arc::new(TokenManager::new(
            Arc::new(storage.clone()),
            endpoint.clone(),
            Arc::new(clock.clone()),
            Some("cid".to_string()),
        ));
        Fixture { clock, storage, endpoint, manager }
    }

    async fn install_expired(f: &Fixture, refresh: Option<&str>) {
        let expired = f.clock.now() - Duration::seconds(1);
        f.manager.set_token(TokenInfo::oauth("old", expired, refresh.map(str::to_string))).await;
    }

    #[tokio::test]
    async fn test_valid_token_is_returned_without_refresh() {
        let f = fixture(MockTokenEndpoint::new());
        f.manager
            .set_token(TokenInfo::oauth("at", f.clock.now() + Duration::hours(1), None))
            .await;

        assert_eq!(f.manager.get_valid_token().await.unwrap(), "at");
        assert_eq!(f.endpoint.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_token_is_authentication_error() {
        let f = fixture(MockTokenEndpoint::new());
        let err = f.manager.get_valid_token().await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Authentication);
    }

    #[tokio::test]
    async fn test_secret_token_is_always_valid_and_never_refreshed() {
        let f = fixture(MockTokenEndpoint::new());
        f.manager.set_token(TokenInfo::secret("pat")).await;
        f.clock.advance(Duration::days(3650));

        assert_eq!(f.manager.get_valid_token().await.unwrap(), "pat");
        let err = f.manager.refresh_token().await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Authentication);
        assert_eq!(f.endpoint.refresh_calls(), 0);
        assert!(f.storage.is_empty());
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_and_persisted() {
        let f = fixture(MockTokenEndpoint::new());
        f.endpoint.push_refresh(Ok(token_response("fresh", 3600, Some("rt2"))));
        install_expired(&f, Some("rt1")).await;

        assert_eq!(f.manager.get_valid_token().await.unwrap(), "fresh");

        let current = f.manager.current().await.unwrap();
        assert_eq!(current.refresh_token(), Some("rt2"));
        assert_eq!(current.expires_at(), Some(f.clock.now() + Duration::seconds(3600)));
        assert_eq!(f.endpoint.last_refresh_token().as_deref(), Some("rt1"));
        assert!(f.storage.peek(&token_storage_key("cid")).unwrap().contains("fresh"));
    }

    #[tokio::test]
    async fn test_refresh_keeps_refresh_token_when_not_rotated() {
        let f = fixture(MockTokenEndpoint::new());
        f.endpoint.push_refresh(Ok(token_response("fresh", 600, None)));
        install_expired(&f, Some("rt1")).await;

        f.manager.get_valid_token().await.unwrap();

        assert_eq!(f.manager.current().await.unwrap().refresh_token(), Some("rt1"));
    }

    #[tokio::test]
    async fn test_expired_without_refresh_token_is_cleared() {
        let f = fixture(MockTokenEndpoint::new());
        install_expired(&f, None).await;

        let err = f.manager.get_valid_token().await.unwrap_err();

        assert_eq!(err.error_type(), ErrorType::Authentication);
        assert!(f.manager.current().await.is_none());
        assert_eq!(f.endpoint.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let f = fixture(MockTokenEndpoint::new().with_delay(StdDuration::from_millis(50)));
        f.endpoint.push_refresh(Ok(token_response("shared", 3600, Some("rt2"))));
        install_expired(&f, Some("rt1")).await;

        let results = join_all((0..8).map(|_| {
            let manager = f.manager.clone();
            async move { manager.get_valid_token().await }
        }))
        .await;

        assert_eq!(f.endpoint.refresh_calls(), 1);
        for result in results {
            assert_eq!(result.unwrap(), "shared");
        }
    }

    #[tokio::test]
    async fn test_failed_refresh_fails_closed_for_every_waiter() {
        let f = fixture(MockTokenEndpoint::new().with_delay(StdDuration::from_millis(20)));
        f.endpoint.push_refresh(Err(SdkError::Authentication(
            ErrorInfo::new("invalid_grant").with_status(400).with_request_id(Some("r-1".into())),
        )));
        install_expired(&f, Some("rt1")).await;

        let results = join_all((0..4).map(|_| {
            let manager = f.manager.clone();
            async move { manager.get_valid_token().await }
        }))
        .await;

        assert_eq!(f.endpoint.refresh_calls(), 1);
        for result in results {
            let err = result.unwrap_err();
            assert_eq!(err.error_type(), ErrorType::Authentication);
            assert_eq!(err.status_code(), Some(400));
            assert_eq!(err.request_id(), Some("r-1"));
        }
        assert!(f.manager.current().await.is_none());
        assert!(!f.storage.contains(&token_storage_key("cid")));
    }

    #[tokio::test]
    async fn test_network_failure_during_refresh_becomes_authentication_error() {
        let f = fixture(MockTokenEndpoint::new());
        f.endpoint.push_refresh(Err(SdkError::network(
            tenantlink_domain::NetworkErrorKind::Generic,
            "connection reset",
        )));
        install_expired(&f, Some("rt1")).await;

        let err = f.manager.get_valid_token().await.unwrap_err();

        assert_eq!(err.error_type(), ErrorType::Authentication);
        assert!(err.message().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_later_refresh_issues_a_new_grant() {
        let f = fixture(MockTokenEndpoint::new());
        f.endpoint.push_refresh(Ok(token_response("first", 60, Some("rt2"))));
        f.endpoint.push_refresh(Ok(token_response("second", 60, Some("rt3"))));
        install_expired(&f, Some("rt1")).await;

        assert_eq!(f.manager.get_valid_token().await.unwrap(), "first");
        f.clock.advance(Duration::seconds(61));
        assert_eq!(f.manager.get_valid_token().await.unwrap(), "second");
        assert_eq!(f.endpoint.refresh_calls(), 2);
    }

    #[tokio::test]
    async fn test_refresh_without_client_id_is_rejected() {
        let clock = MockClock::new();
        let endpoint = Arc::new(MockTokenEndpoint::new());
        let manager = TokenManager::new(
            Arc::new(MemoryStorage::new()),
            endpoint.clone(),
            Arc::new(clock.clone()),
            None,
        )
        .with_token(TokenInfo::oauth("old", clock.now(), Some("rt".into())));

        assert!(manager.get_valid_token().await.is_err());
        assert_eq!(endpoint.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_precondition_failures_do_not_settle_a_refresh() {
        let f = fixture(MockTokenEndpoint::new());
        f.manager.set_token(TokenInfo::secret("pat")).await;
        assert!(f.manager.refresh_token().await.is_err());

        install_expired(&f, None).await;
        assert!(f.manager.refresh_token().await.is_err());

        assert_eq!(f.manager.generation.load(Ordering::Acquire), 0);
        assert!(f.manager.gate.lock().await.last_outcome.is_none());
        assert_eq!(f.endpoint.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_refresh_settled_before_generation_read_is_reused() {
        let f = fixture(MockTokenEndpoint::new());
        f.endpoint.push_refresh(Ok(token_response("fresh", 3600, Some("rt2"))));
        install_expired(&f, Some("rt1")).await;
        let stale = f.manager.current().await.unwrap();

        assert_eq!(f.manager.get_valid_token().await.unwrap(), "fresh");
        let observed = f.manager.generation.load(Ordering::Acquire);

        assert_eq!(f.manager.refresh_from(observed, stale).await.unwrap(), "fresh");
        assert_eq!(f.endpoint.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn test_token_replaced_while_waiting_skips_refresh() {
        let f = fixture(MockTokenEndpoint::new());
        install_expired(&f, Some("rt1")).await;
        let stale = f.manager.current().await.unwrap();
        let observed = f.manager.generation.load(Ordering::Acquire);

        f.manager
            .set_token(TokenInfo::oauth("other", f.clock.now() + Duration::hours(1), None))
            .await;

        assert_eq!(f.manager.refresh_from(observed, stale).await.unwrap(), "other");
        assert_eq!(f.endpoint.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_state_reports_lifecycle() {
        let f = fixture(MockTokenEndpoint::new().with_delay(StdDuration::from_millis(50)));
        assert_eq!(f.manager.state().await, TokenState::Empty);

        f.manager
            .set_token(TokenInfo::oauth("at", f.clock.now() + Duration::seconds(10), Some("rt".into())))
            .await;
        assert_eq!(f.manager.state().await, TokenState::Valid);

        f.clock.advance(Duration::seconds(10));
        assert_eq!(f.manager.state().await, TokenState::Expired);

        let manager = f.manager.clone();
        let refresh = tokio::spawn(async move { manager.get_valid_token().await });
        tokio::time::sleep(StdDuration::from_millis(10)).await;
        assert_eq!(f.manager.state().await, TokenState::Refreshing);

        refresh.await.unwrap().unwrap();
        assert_eq!(f.manager.state().await, TokenState::Valid);
    }

    #[tokio::test]
    async fn test_load_restores_persisted_token() {
        let f = fixture(MockTokenEndpoint::new());
        f.manager
            .set_token(TokenInfo::oauth("at", f.clock.now() + Duration::hours(1), None))
            .await;

        let restored = TokenManager::new(
            Arc::new(f.storage.clone()),
            f.endpoint.clone(),
            Arc::new(f.clock.clone()),
            Some("cid".to_string()),
        );

        assert!(restored.load().await);
        assert!(restored.has_valid_token().await);
        assert_eq!(restored.state().await, TokenState::Valid);
    }
}

//! Authentication facade
//!
//! [`AuthService`] is what hosts call: it picks secret or OAuth behaviour
//! from the configuration it was built with and wraps every operation in
//! telemetry.

use std::sync::Arc;

use tenantlink_domain::{AuthMode, Result, SdkConfig, SdkError, TokenInfo};
use tracing::{info, instrument, warn};
use url::Url;

use super::flow::{CallbackOutcome, FlowState, OAuthFlow};
use super::token_manager::{TokenManager, TokenState};
use crate::ports::Navigator;
use crate::telemetry::{track, Telemetry};

/// Authentication service for one SDK instance
pub struct AuthService {
    config: SdkConfig,
    tokens: Arc<TokenManager>,
    flow: Option<OAuthFlow>,
    navigator: Arc<dyn Navigator>,
    telemetry: Arc<dyn Telemetry>,
}

impl AuthService {
    /// `flow` must be present for OAuth configurations.
    pub fn new(
        config: SdkConfig,
        tokens: Arc<TokenManager>,
        flow: Option<OAuthFlow>,
        navigator: Arc<dyn Navigator>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        Self { config, tokens, flow, navigator, telemetry }
    }

    fn flow(&self) -> Result<&OAuthFlow> {
        self.flow
            .as_ref()
            .ok_or_else(|| SdkError::validation("OAuth operations need an OAuth configuration"))
    }

    /// Make sure a token is available.
    ///
    /// Secret mode installs the configured secret and returns `true`. OAuth
    /// mode returns `true` if a valid token is held or can be restored from
    /// storage; otherwise it starts the authorization flow, opens the
    /// authorize URL with the navigator and returns `false`. The host then
    /// delivers the callback to [`AuthService::handle_callback`].
    ///
    /// # Errors
    /// Returns an error if the flow cannot be started or the navigator fails
    #[instrument(skip(self))]
    pub async fn authenticate(&self) -> Result<bool> {
        track(self.telemetry.as_ref(), "auth.authenticate", async {
            match self.config.auth() {
                AuthMode::Secret(secret) => {
                    self.tokens.set_token(TokenInfo::secret(secret.expose())).await;
                    Ok(true)
                }
                AuthMode::OAuth(_) => {
                    if self.tokens.has_valid_token().await || self.tokens.load().await {
                        return Ok(true);
                    }
                    let url = self.flow()?.initiate().await?;
                    self.navigator.open(&url).map_err(|e| {
                        SdkError::authentication(format!("Cannot open authorization URL: {e}"))
                    })?;
                    info!("waiting for authorization callback");
                    Ok(false)
                }
            }
        })
        .await
    }

    /// Use `secret` as the bearer token from now on.
    ///
    /// Returns `false` for an empty secret.
    pub async fn authenticate_with_secret(&self, secret: &str) -> Result<bool> {
        track(self.telemetry.as_ref(), "auth.authenticate_with_secret", async {
            let secret = secret.trim();
            if secret.is_empty() {
                warn!("ignoring empty secret");
                return Ok(false);
            }
            self.tokens.set_token(TokenInfo::secret(secret)).await;
            Ok(true)
        })
        .await
    }

    /// Whether a token usable right now is held. Never refreshes.
    pub async fn has_valid_token(&self) -> bool {
        self.tokens.has_valid_token().await
    }

    /// The current token if it is valid right now. Never refreshes.
    pub async fn get_token(&self) -> Option<String> {
        let now_valid = self.tokens.has_valid_token().await;
        if !now_valid {
            return None;
        }
        self.tokens.current().await.map(|info| info.token().to_string())
    }

    /// A valid bearer token, refreshing it first when expired.
    ///
    /// # Errors
    /// Returns `SdkError::Authentication` when no usable token can be had
    pub async fn access_token(&self) -> Result<String> {
        track(self.telemetry.as_ref(), "auth.access_token", self.tokens.get_valid_token()).await
    }

    /// Replace the current token, e.g. with one obtained out of band.
    pub async fn update_token(&self, info: TokenInfo) {
        self.tokens.set_token(info).await;
    }

    /// Whether `url` is a callback for a pending flow. Always `false` in
    /// secret mode.
    pub async fn is_callback(&self, url: &Url) -> bool {
        match &self.flow {
            Some(flow) => flow.is_callback(url).await,
            None => false,
        }
    }

    /// Finish the OAuth flow from a callback URL.
    ///
    /// # Errors
    /// See [`OAuthFlow::handle_callback`]
    pub async fn handle_callback(&self, url: &Url) -> Result<CallbackOutcome> {
        track(self.telemetry.as_ref(), "auth.handle_callback", async {
            self.flow()?.handle_callback(url).await
        })
        .await
    }

    /// Finish the OAuth flow with a bare authorization code.
    ///
    /// # Errors
    /// See [`OAuthFlow::complete_callback`]
    pub async fn complete_callback(&self, code: &str) -> Result<bool> {
        track(self.telemetry.as_ref(), "auth.complete_callback", async {
            self.flow()?.complete_callback(code).await
        })
        .await
    }

    /// Drop the token and any pending flow.
    pub async fn logout(&self) {
        self.tokens.clear().await;
        if let Some(flow) = &self.flow {
            flow.cancel().await;
        }
        info!("logged out");
    }

    pub async fn token_state(&self) -> TokenState {
        self.tokens.state().await
    }

    /// `None` in secret mode.
    #[must_use]
    pub fn flow_state(&self) -> Option<FlowState> {
        self.flow.as_ref().map(OAuthFlow::state)
    }

    #[must_use]
    pub const fn token_manager(&self) -> &Arc<TokenManager> {
        &self.tokens
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use tenantlink_common::testing::MockClock;
    use tenantlink_common::Clock;
    use tenantlink_domain::constants::token_storage_key;
    use tenantlink_domain::{ErrorType, OAuthSettings};

    use super::*;
    use crate::ports::{MemoryStorage, Storage};
    use crate::telemetry::Outcome;
    use crate::testing::{MockTokenEndpoint, RecordingNavigator, RecordingTelemetry};

    struct Fixture {
        clock: MockClock,
        storage: MemoryStorage,
        navigator: Arc<RecordingNavigator>,
        telemetry: Arc<RecordingTelemetry>,
        service: AuthService,
    }

    fn oauth_config() -> SdkConfig {
        SdkConfig::oauth(
            "https://cloud.example.com",
            "acme",
            "DefaultTenant",
            OAuthSettings::new("cid", "http://localhost:8080/callback", "openid"),
        )
        .unwrap()
    }

    fn fixture(config: SdkConfig) -> Fixture {
        let clock = MockClock::new();
        let storage = MemoryStorage::new();
        let endpoint = Arc::new(MockTokenEndpoint::new());
        let navigator = Arc::new(RecordingNavigator::default());
        let telemetry = Arc::new(RecordingTelemetry::default());
        let client_id = config.oauth_settings().map(|s| s.client_id.clone());
        let tokens = Arc::new(TokenManager::new(
            Arc::new(storage.clone()),
            endpoint.clone(),
            Arc::new(clock.clone()),
            client_id,
        ));
        let flow = OAuthFlow::new(
            &config,
            Arc::new(storage.clone()),
            endpoint,
            tokens.clone(),
            Arc::new(clock.clone()),
        )
        .ok();
        let service = AuthService::new(config, tokens, flow, navigator.clone(), telemetry.clone());
        Fixture { clock, storage, navigator, telemetry, service }
    }

    #[tokio::test]
    async fn test_secret_mode_authenticates_immediately() {
        let config = SdkConfig::secret("https://cloud.example.com", "acme", "t", "pat").unwrap();
        let f = fixture(config);

        assert!(f.service.authenticate().await.unwrap());
        assert_eq!(f.service.get_token().await.as_deref(), Some("pat"));
        assert!(f.navigator.opened().is_empty());
        assert!(!f.service.is_callback(&Url::parse("http://x/?code=a").unwrap()).await);
        assert_eq!(f.service.flow_state(), None);
        assert_eq!(f.telemetry.event_names(), vec!["auth.authenticate"]);
    }

    #[tokio::test]
    async fn test_oauth_without_token_opens_browser() {
        let f = fixture(oauth_config());

        assert!(!f.service.authenticate().await.unwrap());

        let opened = f.navigator.opened();
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].path(), "/acme/identity_/connect/authorize");
        assert_eq!(f.service.flow_state(), Some(FlowState::AwaitingCallback));
    }

    #[tokio::test]
    async fn test_oauth_restores_persisted_token() {
        let f = fixture(oauth_config());
        let expires = (f.clock.now() + Duration::hours(1)).to_rfc3339();
        f.storage
            .set(
                &token_storage_key("cid"),
                &format!(r#"{{"token":"saved","type":"oauth","expiresAt":"{expires}"}}"#),
            )
            .await
            .unwrap();

        assert!(f.service.authenticate().await.unwrap());
        assert_eq!(f.service.get_token().await.as_deref(), Some("saved"));
        assert!(f.navigator.opened().is_empty());
    }

    #[tokio::test]
    async fn test_full_redirect_round_trip() {
        let f = fixture(oauth_config());
        f.service.authenticate().await.unwrap();
        let state = f.navigator.opened()[0]
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        let callback =
            Url::parse(&format!("http://localhost:8080/callback?code=abc&state={state}")).unwrap();

        assert!(f.service.is_callback(&callback).await);
        let outcome = f.service.handle_callback(&callback).await.unwrap();

        assert!(outcome.authenticated);
        assert_eq!(outcome.clean_url.as_str(), "http://localhost:8080/callback");
        assert_eq!(f.service.access_token().await.unwrap(), "access-1");
    }

    #[tokio::test]
    async fn test_get_token_hides_expired_token() {
        let f = fixture(oauth_config());
        f.service
            .update_token(TokenInfo::oauth("at", f.clock.now() + Duration::seconds(5), None))
            .await;
        assert_eq!(f.service.get_token().await.as_deref(), Some("at"));

        f.clock.advance(Duration::seconds(5));

        assert_eq!(f.service.get_token().await, None);
        assert!(!f.service.has_valid_token().await);
    }

    #[tokio::test]
    async fn test_empty_secret_is_refused() {
        let f = fixture(oauth_config());
        assert!(!f.service.authenticate_with_secret("  ").await.unwrap());
        assert!(f.service.authenticate_with_secret("pat").await.unwrap());
        assert_eq!(f.service.get_token().await.as_deref(), Some("pat"));
    }

    #[tokio::test]
    async fn test_logout_clears_token_and_flow() {
        let f = fixture(oauth_config());
        f.service.authenticate().await.unwrap();
        f.service
            .update_token(TokenInfo::oauth("at", f.clock.now() + Duration::hours(1), None))
            .await;

        f.service.logout().await;

        assert!(f.storage.is_empty());
        assert_eq!(f.service.token_state().await, TokenState::Empty);
        assert_eq!(f.service.flow_state(), Some(FlowState::Idle));
    }

    #[tokio::test]
    async fn test_failures_are_reported_to_telemetry() {
        let f = fixture(oauth_config());

        let err = f.service.access_token().await.unwrap_err();

        assert_eq!(err.error_type(), ErrorType::Authentication);
        assert_eq!(
            f.telemetry.events()[0].outcome,
            Outcome::Failure { error_type: ErrorType::Authentication, status_code: None }
        );
    }
}

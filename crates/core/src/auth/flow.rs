//! Authorization-code flow with PKCE
//!
//! [`OAuthFlow::initiate`] builds the authorize URL and persists a
//! [`FlowContext`] so the exchange can be finished after the redirect, even
//! by a different process. The callback side validates the returned code,
//! exchanges it once, installs the token and deletes the context.

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex as SyncMutex;
use regex::Regex;
use tenantlink_common::auth::{
    build_authorization_url, with_offline_access, AuthorizationRequest, PkceChallenge,
};
use tenantlink_common::Clock;
use tenantlink_domain::constants::{CALLBACK_QUERY_PARAMS, CODE_VERIFIER_KEY, FLOW_CONTEXT_KEY};
use tenantlink_domain::{FlowContext, OAuthSettings, Result, SdkConfig, SdkError, TokenInfo};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::token_client::{CodeExchange, TokenEndpoint};
use super::token_manager::TokenManager;
use crate::ports::Storage;

/// Characters an authorization code may contain: base64/base64url plus
/// trailing padding.
static AUTH_CODE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9\-._~+/]+=*$")
        .expect("AUTH_CODE_PATTERN should compile - this is a bug")
});

/// Whether `code` is shaped like an authorization code.
#[must_use]
pub fn is_valid_authorization_code(code: &str) -> bool {
    AUTH_CODE_PATTERN.is_match(code)
}

/// How a callback's `state` is verified against the pending flow.
#[derive(Debug, Clone, Copy)]
enum StateCheck<'a> {
    /// Bare code handed over by the host; there is no state to compare
    Skip,
    /// State as returned on the callback URL
    Returned(Option<&'a str>),
}

/// Where the flow stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    AwaitingCallback,
    Exchanging,
    Complete,
    Failed,
}

/// Result of handling a callback URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackOutcome {
    pub authenticated: bool,
    /// The callback URL with `code`, `state` and `session_state` removed,
    /// suitable for replacing the address bar
    pub clean_url: Url,
}

/// Query parameter `name` of `url`, if present and non-empty.
fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Drop the OAuth callback parameters from `url`, keeping everything else.
#[must_use]
pub fn strip_callback_params(url: &Url) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !CALLBACK_QUERY_PARAMS.contains(&key.as_ref()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut clean = url.clone();
    if kept.is_empty() {
        clean.set_query(None);
    } else {
        clean.query_pairs_mut().clear().extend_pairs(kept);
    }
    clean
}

/// Orchestrates one OAuth client's authorization-code flow.
pub struct OAuthFlow {
    base_url: String,
    org_name: String,
    tenant_name: String,
    settings: OAuthSettings,
    storage: Arc<dyn Storage>,
    endpoint: Arc<dyn TokenEndpoint>,
    tokens: Arc<TokenManager>,
    clock: Arc<dyn Clock>,
    state: SyncMutex<FlowState>,
    /// Serializes callback completion so a code is exchanged at most once
    completion: Mutex<()>,
}

impl OAuthFlow {
    /// Create the flow for an OAuth-mode configuration.
    ///
    /// # Errors
    /// Returns `SdkError::Validation` when `config` is in secret mode
    pub fn new(
        config: &SdkConfig,
        storage: Arc<dyn Storage>,
        endpoint: Arc<dyn TokenEndpoint>,
        tokens: Arc<TokenManager>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let settings = config
            .oauth_settings()
            .cloned()
            .ok_or_else(|| SdkError::validation("OAuth flow requires an OAuth configuration"))?;

        Ok(Self {
            base_url: config.base_url().to_string(),
            org_name: config.org_name().to_string(),
            tenant_name: config.tenant_name().to_string(),
            settings,
            storage,
            endpoint,
            tokens,
            clock,
            state: SyncMutex::new(FlowState::Idle),
            completion: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn state(&self) -> FlowState {
        *self.state.lock()
    }

    fn set_state(&self, state: FlowState) {
        *self.state.lock() = state;
    }

    /// Start a flow and return the URL the user must visit.
    ///
    /// # Errors
    /// Returns `SdkError::Validation` if the authorize URL cannot be built
    /// and `SdkError::Authentication` if the flow context cannot be stored
    #[instrument(skip(self), fields(client_id = %self.settings.client_id))]
    pub async fn initiate(&self) -> Result<Url> {
        let pkce = PkceChallenge::generate();

        let url = build_authorization_url(&AuthorizationRequest {
            base_url: &self.base_url,
            org_name: &self.org_name,
            client_id: &self.settings.client_id,
            redirect_uri: &self.settings.redirect_uri,
            code_challenge: &pkce.code_challenge,
            scope: &self.settings.scope,
            state: &pkce.state,
        })
        .map_err(|e| SdkError::validation(format!("Cannot build authorization URL: {e}")))?;

        let context = FlowContext {
            code_verifier: pkce.code_verifier,
            client_id: self.settings.client_id.clone(),
            redirect_uri: self.settings.redirect_uri.clone(),
            base_url: self.base_url.clone(),
            org_name: self.org_name.clone(),
            tenant_name: self.tenant_name.clone(),
            scope: with_offline_access(&self.settings.scope),
            state: Some(pkce.state),
        };
        let encoded = serde_json::to_string(&context)
            .map_err(|e| SdkError::validation(format!("Cannot encode flow context: {e}")))?;

        self.storage.set(FLOW_CONTEXT_KEY, &encoded).await.map_err(|e| {
            SdkError::authentication(format!("Cannot persist OAuth flow context: {e}"))
        })?;
        self.storage.set(CODE_VERIFIER_KEY, &context.code_verifier).await.map_err(|e| {
            SdkError::authentication(format!("Cannot persist OAuth flow context: {e}"))
        })?;

        self.set_state(FlowState::AwaitingCallback);
        info!("authorization flow started");
        Ok(url)
    }

    /// Whether `url` is an OAuth callback for a flow this storage started.
    pub async fn is_callback(&self, url: &Url) -> bool {
        if query_param(url, "code").is_none() {
            return false;
        }
        match self.storage.get(CODE_VERIFIER_KEY).await {
            Ok(verifier) => verifier.is_some(),
            Err(err) => {
                warn!(error = %err, "cannot read code verifier");
                false
            }
        }
    }

    /// Finish the flow with an authorization code.
    ///
    /// Returns `true` once a valid token is held. If one already is, the
    /// exchange is skipped, which makes repeated delivery of the same
    /// callback harmless.
    ///
    /// # Errors
    /// Returns `SdkError::Authentication` when no flow is pending, the code
    /// is malformed, or the exchange is rejected
    pub async fn complete_callback(&self, code: &str) -> Result<bool> {
        self.complete(code, StateCheck::Skip).await
    }

    /// Finish the flow from the full callback URL.
    ///
    /// Also verifies the returned `state` against the pending flow, which
    /// must be present when the flow issued one, and surfaces provider
    /// errors (`error`, `error_description`).
    ///
    /// # Errors
    /// Same as [`OAuthFlow::complete_callback`], plus state mismatch and
    /// provider-reported errors
    pub async fn handle_callback(&self, url: &Url) -> Result<CallbackOutcome> {
        if let Some(error) = query_param(url, "error") {
            let description = query_param(url, "error_description");
            self.fail().await;
            let reason = description.map_or_else(|| error.clone(), |d| format!("{error}: {d}"));
            return Err(SdkError::authentication(format!("Authorization denied: {reason}")));
        }

        let code = query_param(url, "code").ok_or_else(|| {
            SdkError::authentication("Callback URL carries no authorization code")
        })?;
        let returned_state = query_param(url, "state");

        let authenticated =
            self.complete(&code, StateCheck::Returned(returned_state.as_deref())).await?;
        Ok(CallbackOutcome { authenticated, clean_url: strip_callback_params(url) })
    }

    /// Abandon any pending flow.
    pub async fn cancel(&self) {
        self.discard_context().await;
        self.set_state(FlowState::Idle);
        debug!("authorization flow cancelled");
    }

    async fn complete(&self, code: &str, state_check: StateCheck<'_>) -> Result<bool> {
        let _serialized = self.completion.lock().await;

        if self.tokens.has_valid_token().await {
            debug!("valid token already held; skipping code exchange");
            self.discard_context().await;
            self.set_state(FlowState::Complete);
            return Ok(true);
        }

        let Some(context) = self.load_context().await else {
            self.set_state(FlowState::Failed);
            return Err(SdkError::authentication("No OAuth flow in progress"));
        };

        if let (Some(expected), StateCheck::Returned(returned)) =
            (context.state.as_deref(), state_check)
        {
            match returned {
                None => {
                    warn!("callback carries no state");
                    self.fail().await;
                    return Err(SdkError::authentication("OAuth state missing"));
                }
                Some(returned) if returned != expected => {
                    warn!("callback state does not match pending flow");
                    self.fail().await;
                    return Err(SdkError::authentication("OAuth state mismatch"));
                }
                Some(_) => {}
            }
        }

        if !is_valid_authorization_code(code) {
            warn!("rejecting malformed authorization code");
            self.fail().await;
            return Err(SdkError::authentication("Invalid authorization code format"));
        }

        self.set_state(FlowState::Exchanging);
        self.discard_context().await;

        let exchange = CodeExchange {
            client_id: context.client_id,
            code: code.to_string(),
            redirect_uri: context.redirect_uri,
            code_verifier: context.code_verifier,
        };
        match self.endpoint.exchange_code(&exchange).await {
            Ok(response) => {
                let info = TokenInfo::from_response(&response, self.clock.now());
                self.tokens.set_token(info).await;
                self.set_state(FlowState::Complete);
                info!("authorization code exchanged");
                Ok(true)
            }
            Err(err) => {
                warn!(error = %err, "authorization code exchange failed");
                self.set_state(FlowState::Failed);
                Err(err)
            }
        }
    }

    async fn load_context(&self) -> Option<FlowContext> {
        let raw = match self.storage.get(FLOW_CONTEXT_KEY).await {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(error = %err, "cannot read flow context");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(context) => Some(context),
            Err(err) => {
                warn!(error = %err, "discarding unreadable flow context");
                self.discard_context().await;
                None
            }
        }
    }

    async fn fail(&self) {
        self.discard_context().await;
        self.set_state(FlowState::Failed);
    }

    async fn discard_context(&self) {
        for key in [FLOW_CONTEXT_KEY, CODE_VERIFIER_KEY] {
            if let Err(err) = self.storage.remove(key).await {
                warn!(key, error = %err, "cannot remove flow context");
            }
        }
    }
}

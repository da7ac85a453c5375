//! SDK entry point
//!
//! [`Sdk`] wires the ports to the auth and API layers for one configuration.
//! Instances share nothing: two SDKs in one process have separate tokens,
//! flows and telemetry sinks.

use std::sync::Arc;

use tenantlink_common::{Clock, SystemClock};
use tenantlink_domain::{AuthMode, Result, SdkConfig, SdkError, TokenInfo};
use tracing::info;

use crate::api::{ApiClient, ErrorParser};
use crate::auth::{AuthService, IdentityClient, OAuthFlow, TokenEndpoint, TokenManager};
use crate::ports::{HttpTransport, LogNavigator, MemoryStorage, Navigator, Storage};
use crate::telemetry::{Telemetry, TracingTelemetry};

/// Builder for [`Sdk`]. Only the transport is required.
pub struct SdkBuilder {
    config: SdkConfig,
    transport: Option<Arc<dyn HttpTransport>>,
    storage: Option<Arc<dyn Storage>>,
    clock: Option<Arc<dyn Clock>>,
    navigator: Option<Arc<dyn Navigator>>,
    telemetry: Option<Arc<dyn Telemetry>>,
    token_endpoint: Option<Arc<dyn TokenEndpoint>>,
    error_parser: Option<ErrorParser>,
    default_headers: Vec<(String, String)>,
}

impl SdkBuilder {
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Where OAuth tokens and flow context persist. Defaults to memory.
    #[must_use]
    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// How the authorize URL is shown to the user. Defaults to logging it.
    #[must_use]
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    #[must_use]
    pub fn telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Override the identity provider client.
    #[must_use]
    pub fn token_endpoint(mut self, endpoint: Arc<dyn TokenEndpoint>) -> Self {
        self.token_endpoint = Some(endpoint);
        self
    }

    #[must_use]
    pub fn error_parser(mut self, parser: ErrorParser) -> Self {
        self.error_parser = Some(parser);
        self
    }

    #[must_use]
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Assemble the SDK.
    ///
    /// Secret configurations start out holding their secret token.
    ///
    /// # Errors
    /// Returns `SdkError::Validation` if no transport was set or the token
    /// endpoint URL cannot be derived from the base URL
    pub fn build(self) -> Result<Sdk> {
        let transport =
            self.transport.ok_or_else(|| SdkError::validation("An HTTP transport is required"))?;
        let storage = self.storage.unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let navigator = self.navigator.unwrap_or_else(|| Arc::new(LogNavigator));
        let telemetry = self.telemetry.unwrap_or_else(|| Arc::new(TracingTelemetry));
        let config = self.config;

        let endpoint: Arc<dyn TokenEndpoint> = match self.token_endpoint {
            Some(endpoint) => endpoint,
            None => Arc::new(IdentityClient::for_organization(
                transport.clone(),
                config.base_url(),
                config.org_name(),
            )?),
        };

        let client_id = config.oauth_settings().map(|settings| settings.client_id.clone());
        let mut tokens =
            TokenManager::new(storage.clone(), endpoint.clone(), clock.clone(), client_id);
        if let AuthMode::Secret(secret) = config.auth() {
            tokens = tokens.with_token(TokenInfo::secret(secret.expose()));
        }
        let tokens = Arc::new(tokens);

        let flow = match config.auth() {
            AuthMode::OAuth(_) => Some(OAuthFlow::new(
                &config,
                storage,
                endpoint,
                tokens.clone(),
                clock.clone(),
            )?),
            AuthMode::Secret(_) => None,
        };

        let mut api =
            ApiClient::new(&config, tokens.clone(), transport, clock, telemetry.clone())
                .with_default_headers(self.default_headers);
        if let Some(parser) = self.error_parser {
            api = api.with_error_parser(parser);
        }

        let auth = AuthService::new(config.clone(), tokens, flow, navigator, telemetry.clone());

        info!(
            org = config.org_name(),
            tenant = config.tenant_name(),
            oauth = config.oauth_settings().is_some(),
            "sdk initialized"
        );
        Ok(Sdk { config, auth, api, telemetry })
    }
}

/// One configured SDK instance
pub struct Sdk {
    config: SdkConfig,
    auth: AuthService,
    api: ApiClient,
    telemetry: Arc<dyn Telemetry>,
}

impl Sdk {
    #[must_use]
    pub fn builder(config: SdkConfig) -> SdkBuilder {
        SdkBuilder {
            config,
            transport: None,
            storage: None,
            clock: None,
            navigator: None,
            telemetry: None,
            token_endpoint: None,
            error_parser: None,
            default_headers: Vec::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &SdkConfig {
        &self.config
    }

    #[must_use]
    pub const fn auth(&self) -> &AuthService {
        &self.auth
    }

    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Flush telemetry and release the instance.
    pub fn dispose(self) {
        self.telemetry.flush();
        info!(org = self.config.org_name(), "sdk disposed");
    }
}

//! SDK configuration
//!
//! [`RawConfig`] mirrors what hosts write in files or environment variables:
//! every field optional. [`SdkConfig`] is the validated form and can only be
//! built with exactly one auth mode, so downstream code matches on
//! [`AuthMode`] instead of probing for missing fields.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("both `secret` and OAuth settings are set; configure exactly one auth mode")]
    ConflictingAuthModes,

    #[error("no auth mode configured; set `secret` or all of `clientId`, `redirectUri`, `scope`")]
    NoAuthMode,

    #[error("incomplete OAuth settings, missing: {}", .0.join(", "))]
    IncompleteOAuth(Vec<&'static str>),

    #[error("invalid {field} `{value}`: {reason}")]
    InvalidUrl { field: &'static str, value: String, reason: String },

    #[error("failed to read config from {source_name}: {message}")]
    Io { source_name: String, message: String },

    #[error("failed to parse config from {source_name}: {message}")]
    Parse { source_name: String, message: String },
}

/// Unvalidated configuration as read from a file or the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawConfig {
    #[serde(alias = "base_url")]
    pub base_url: Option<String>,
    #[serde(alias = "org_name")]
    pub org_name: Option<String>,
    #[serde(alias = "tenant_name")]
    pub tenant_name: Option<String>,
    #[serde(alias = "client_id")]
    pub client_id: Option<String>,
    #[serde(alias = "redirect_uri")]
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    pub secret: Option<String>,
}

impl RawConfig {
    /// Fill every unset field from `fallback`.
    #[must_use]
    pub fn or(self, fallback: Self) -> Self {
        Self {
            base_url: self.base_url.or(fallback.base_url),
            org_name: self.org_name.or(fallback.org_name),
            tenant_name: self.tenant_name.or(fallback.tenant_name),
            client_id: self.client_id.or(fallback.client_id),
            redirect_uri: self.redirect_uri.or(fallback.redirect_uri),
            scope: self.scope.or(fallback.scope),
            secret: self.secret.or(fallback.secret),
        }
    }
}

/// Pre-issued secret (personal access token or client credential token).
#[derive(Clone, PartialEq, Eq)]
pub struct SecretCredentials {
    secret: String,
}

impl SecretCredentials {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    /// The raw secret. Never log this.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for SecretCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretCredentials").field("secret", &"<redacted>").finish()
    }
}

/// OAuth public-client registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthSettings {
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
}

impl OAuthSettings {
    pub fn new(
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self { client_id: client_id.into(), redirect_uri: redirect_uri.into(), scope: scope.into() }
    }
}

/// How the SDK obtains its bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// Static secret, never expires, never refreshed
    Secret(SecretCredentials),
    /// Authorization code + PKCE with refresh
    OAuth(OAuthSettings),
}

/// Validated, immutable SDK configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkConfig {
    base_url: String,
    org_name: String,
    tenant_name: String,
    auth: AuthMode,
}

impl SdkConfig {
    /// Secret-mode configuration.
    ///
    /// # Errors
    /// Returns an error if a field is empty or the base URL is not http(s).
    pub fn secret(
        base_url: impl Into<String>,
        org_name: impl Into<String>,
        tenant_name: impl Into<String>,
        secret: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let secret = non_empty(Some(secret.into())).ok_or(ConfigError::MissingField("secret"))?;
        Self::build(
            base_url.into(),
            org_name.into(),
            tenant_name.into(),
            AuthMode::Secret(SecretCredentials::new(secret)),
        )
    }

    /// OAuth-mode configuration.
    ///
    /// # Errors
    /// Returns an error if a field is empty or a URL does not parse.
    pub fn oauth(
        base_url: impl Into<String>,
        org_name: impl Into<String>,
        tenant_name: impl Into<String>,
        settings: OAuthSettings,
    ) -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        if settings.client_id.trim().is_empty() {
            missing.push("clientId");
        }
        if settings.redirect_uri.trim().is_empty() {
            missing.push("redirectUri");
        }
        if settings.scope.trim().is_empty() {
            missing.push("scope");
        }
        if !missing.is_empty() {
            return Err(ConfigError::IncompleteOAuth(missing));
        }
        parse_url("redirectUri", &settings.redirect_uri)?;

        Self::build(base_url.into(), org_name.into(), tenant_name.into(), AuthMode::OAuth(settings))
    }

    fn build(
        base_url: String,
        org_name: String,
        tenant_name: String,
        auth: AuthMode,
    ) -> Result<Self, ConfigError> {
        let base_url = non_empty(Some(base_url)).ok_or(ConfigError::MissingField("baseUrl"))?;
        let org_name = non_empty(Some(org_name)).ok_or(ConfigError::MissingField("orgName"))?;
        let tenant_name =
            non_empty(Some(tenant_name)).ok_or(ConfigError::MissingField("tenantName"))?;

        let base_url = base_url.trim_end_matches('/').to_string();
        let parsed = parse_url("baseUrl", &base_url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                field: "baseUrl",
                value: base_url,
                reason: "scheme must be http or https".into(),
            });
        }

        Ok(Self { base_url, org_name, tenant_name, auth })
    }

    /// Base URL without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn org_name(&self) -> &str {
        &self.org_name
    }

    #[must_use]
    pub fn tenant_name(&self) -> &str {
        &self.tenant_name
    }

    #[must_use]
    pub const fn auth(&self) -> &AuthMode {
        &self.auth
    }

    /// OAuth settings when configured for OAuth.
    #[must_use]
    pub const fn oauth_settings(&self) -> Option<&OAuthSettings> {
        match &self.auth {
            AuthMode::OAuth(settings) => Some(settings),
            AuthMode::Secret(_) => None,
        }
    }
}

impl TryFrom<RawConfig> for SdkConfig {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        let base_url = non_empty(raw.base_url).ok_or(ConfigError::MissingField("baseUrl"))?;
        let org_name = non_empty(raw.org_name).ok_or(ConfigError::MissingField("orgName"))?;
        let tenant_name =
            non_empty(raw.tenant_name).ok_or(ConfigError::MissingField("tenantName"))?;

        let secret = non_empty(raw.secret);
        let client_id = non_empty(raw.client_id);
        let redirect_uri = non_empty(raw.redirect_uri);
        let scope = non_empty(raw.scope);
        let any_oauth = client_id.is_some() || redirect_uri.is_some() || scope.is_some();

        match (secret, any_oauth) {
            (Some(_), true) => Err(ConfigError::ConflictingAuthModes),
            (Some(secret), false) => Self::secret(base_url, org_name, tenant_name, secret),
            (None, false) => Err(ConfigError::NoAuthMode),
            (None, true) => Self::oauth(
                base_url,
                org_name,
                tenant_name,
                OAuthSettings::new(
                    client_id.unwrap_or_default(),
                    redirect_uri.unwrap_or_default(),
                    scope.unwrap_or_default(),
                ),
            ),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|err| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
        reason: err.to_string(),
    })
}

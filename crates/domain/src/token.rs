//! Token records
//!
//! [`TokenInfo`] is replaced wholesale on every update. Its fields are
//! private so the secret-token invariant (no expiry, no refresh token)
//! holds by construction.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_TOKEN_TYPE;

/// Where a bearer token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    /// Pre-issued secret, valid until revoked out of band
    #[serde(rename = "secret")]
    Secret,
    /// Issued by the identity provider, expires, refreshable
    #[serde(rename = "oauth")]
    OAuth,
}

/// The bearer token currently in use plus its metadata.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenInfo {
    token: String,
    kind: TokenKind,
    expires_at: Option<DateTime<Utc>>,
    refresh_token: Option<String>,
}

impl TokenInfo {
    /// A secret token. Never expires, never refreshed.
    pub fn secret(token: impl Into<String>) -> Self {
        Self { token: token.into(), kind: TokenKind::Secret, expires_at: None, refresh_token: None }
    }

    /// An OAuth access token.
    pub fn oauth(
        token: impl Into<String>,
        expires_at: DateTime<Utc>,
        refresh_token: Option<String>,
    ) -> Self {
        Self {
            token: token.into(),
            kind: TokenKind::OAuth,
            expires_at: Some(expires_at),
            refresh_token: refresh_token.filter(|t| !t.is_empty()),
        }
    }

    /// Build from a token endpoint response received at `now`.
    #[must_use]
    pub fn from_response(response: &TokenResponse, now: DateTime<Utc>) -> Self {
        let lifetime =
            Duration::try_seconds(response.expires_in.max(0)).unwrap_or_else(Duration::zero);
        let expires_at = now.checked_add_signed(lifetime).unwrap_or(now);
        Self::oauth(response.access_token.clone(), expires_at, response.refresh_token.clone())
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    #[must_use]
    pub const fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Expiry instant; always `None` for secret tokens.
    #[must_use]
    pub const fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Refresh token; always `None` for secret tokens.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    #[must_use]
    pub const fn is_secret(&self) -> bool {
        matches!(self.kind, TokenKind::Secret)
    }

    /// Whether the token can be used at `now`.
    ///
    /// Expiry is strict: a token whose `expires_at == now` is expired.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match self.kind {
            TokenKind::Secret => true,
            TokenKind::OAuth => self.expires_at.is_some_and(|expires_at| now < expires_at),
        }
    }

    /// Seconds left before expiry, `None` for secret tokens.
    #[must_use]
    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> Option<i64> {
        self.expires_at.map(|expires_at| (expires_at - now).num_seconds())
    }
}

impl fmt::Debug for TokenInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenInfo")
            .field("token", &"<redacted>")
            .field("kind", &self.kind)
            .field("expires_at", &self.expires_at)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

fn default_token_type() -> String {
    DEFAULT_TOKEN_TYPE.to_string()
}

/// Token endpoint response body.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime in seconds
    pub expires_in: i64,
    #[serde(default)]
    pub scope: Option<String>,
    /// Present when the provider issues or rotates a refresh token
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish_non_exhaustive()
    }
}

//! In-memory token slot with persistence through the storage port.
//!
//! Only OAuth tokens are ever written to storage. Secret tokens live in
//! memory so that several SDK instances with different secrets cannot see
//! each other's credentials through a shared key.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tenantlink_domain::{TokenInfo, TokenKind};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::ports::Storage;

/// Persisted JSON shape.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedToken {
    token: String,
    #[serde(rename = "type")]
    kind: TokenKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

/// Why a persisted value was not restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    Malformed,
    NotOAuth,
    EmptyToken,
    MissingExpiry,
    BadExpiry,
    Expired,
}

impl Rejection {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Malformed => "malformed JSON",
            Self::NotOAuth => "not an OAuth token",
            Self::EmptyToken => "empty token",
            Self::MissingExpiry => "missing expiresAt",
            Self::BadExpiry => "unparseable expiresAt",
            Self::Expired => "expired",
        }
    }
}

fn decode(raw: &str, now: DateTime<Utc>) -> Result<TokenInfo, Rejection> {
    let persisted: PersistedToken =
        serde_json::from_str(raw).map_err(|_| Rejection::Malformed)?;

    if persisted.kind != TokenKind::OAuth {
        return Err(Rejection::NotOAuth);
    }
    if persisted.token.is_empty() {
        return Err(Rejection::EmptyToken);
    }

    let expires_at = persisted.expires_at.ok_or(Rejection::MissingExpiry)?;
    let expires_at = DateTime::parse_from_rfc3339(&expires_at)
        .map_err(|_| Rejection::BadExpiry)?
        .with_timezone(&Utc);

    let info = TokenInfo::oauth(persisted.token, expires_at, persisted.refresh_token);
    if !info.is_valid_at(now) {
        return Err(Rejection::Expired);
    }
    Ok(info)
}

fn encode(info: &TokenInfo) -> Result<String, serde_json::Error> {
    serde_json::to_string(&PersistedToken {
        token: info.token().to_string(),
        kind: info.kind(),
        expires_at: info.expires_at().map(|at| at.to_rfc3339()),
        refresh_token: info.refresh_token().map(str::to_string),
    })
}

/// Holder of the current [`TokenInfo`].
pub struct TokenStore {
    storage: Arc<dyn Storage>,
    key: Option<String>,
    current: RwLock<Option<TokenInfo>>,
}

impl TokenStore {
    /// `key` is where OAuth tokens persist; `None` keeps everything in
    /// memory.
    pub fn new(storage: Arc<dyn Storage>, key: Option<String>) -> Self {
        Self { storage, key, current: RwLock::new(None) }
    }

    /// Seed the slot without touching storage.
    #[must_use]
    pub fn with_token(mut self, info: TokenInfo) -> Self {
        *self.current.get_mut() = Some(info);
        self
    }

    /// Snapshot of the current token.
    pub async fn current(&self) -> Option<TokenInfo> {
        self.current.read().await.clone()
    }

    /// Hydrate from storage.
    ///
    /// Returns `false` (and removes the persisted value) when it is
    /// malformed, not an OAuth token, lacks or has an unparseable expiry, or
    /// is expired at `now`. Storage failures are logged and read as absence.
    pub async fn load(&self, now: DateTime<Utc>) -> bool {
        let Some(key) = self.key.as_deref() else {
            return false;
        };

        let mut slot = self.current.write().await;
        let raw = match self.storage.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("no persisted token");
                return false;
            }
            Err(err) => {
                warn!(error = %err, "failed to read persisted token");
                return false;
            }
        };

        match decode(&raw, now) {
            Ok(info) => {
                *slot = Some(info);
                true
            }
            Err(rejection) => {
                warn!(reason = rejection.as_str(), "discarding persisted token");
                if let Err(err) = self.storage.remove(key).await {
                    warn!(error = %err, "failed to remove rejected token");
                }
                false
            }
        }
    }

    /// Replace the slot wholesale, persisting OAuth tokens.
    pub async fn replace(&self, info: TokenInfo) {
        let mut slot = self.current.write().await;

        if let (Some(key), TokenKind::OAuth) = (self.key.as_deref(), info.kind()) {
            match encode(&info) {
                Ok(encoded) => {
                    if let Err(err) = self.storage.set(key, &encoded).await {
                        warn!(error = %err, "failed to persist token; keeping it in memory only");
                    }
                }
                Err(err) => warn!(error = %err, "failed to encode token for persistence"),
            }
        }

        *slot = Some(info);
    }

    /// Drop the in-memory token and any persisted copy. Idempotent.
    pub async fn clear(&self) {
        let mut slot = self.current.write().await;
        self.remove_persisted().await;
        *slot = None;
    }

    /// Clear only if the slot still holds `expected`.
    ///
    /// Returns whether anything was cleared.
    pub async fn clear_if_current(&self, expected: &TokenInfo) -> bool {
        let mut slot = self.current.write().await;
        if slot.as_ref() != Some(expected) {
            return false;
        }
        self.remove_persisted().await;
        *slot = None;
        true
    }

    async fn remove_persisted(&self) {
        if let Some(key) = self.key.as_deref() {
            if let Err(err) = self.storage.remove(key).await {
                warn!(error = %err, "failed to remove persisted token");
            }
        }
    }
}

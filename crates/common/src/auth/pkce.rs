//! PKCE (Proof Key for Code Exchange) implementation for OAuth 2.0
//!
//! Implements RFC 7636 for public clients that cannot keep a client secret.
//! Everything here is pure: no storage, no network.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use url::Url;

/// Challenge method sent with every authorization request.
pub const CHALLENGE_METHOD: &str = "S256";

/// Scope that makes the identity provider issue a refresh token.
pub const OFFLINE_ACCESS_SCOPE: &str = "offline_access";

const VERIFIER_BYTES: usize = 32;

fn random_urlsafe(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a cryptographically secure code verifier
///
/// 32 bytes from the operating system CSPRNG, base64url without padding,
/// which yields 43 characters (RFC 7636 allows 43-128).
#[must_use]
pub fn generate_code_verifier() -> String {
    random_urlsafe(VERIFIER_BYTES)
}

/// Derive the S256 code challenge: `BASE64URL(SHA256(verifier))`.
#[must_use]
pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Generate a random state token for CSRF protection
#[must_use]
pub fn generate_state() -> String {
    random_urlsafe(VERIFIER_BYTES)
}

/// Return `scope` with `offline_access` appended unless it is already there.
#[must_use]
pub fn with_offline_access(scope: &str) -> String {
    let mut scopes: Vec<&str> = scope.split_whitespace().collect();
    if !scopes.contains(&OFFLINE_ACCESS_SCOPE) {
        scopes.push(OFFLINE_ACCESS_SCOPE);
    }
    scopes.join(" ")
}

/// Inputs for [`build_authorization_url`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest<'a> {
    /// Platform base URL, e.g. `https://cloud.example.com`
    pub base_url: &'a str,
    /// Organization segment of the identity path
    pub org_name: &'a str,
    /// OAuth client id
    pub client_id: &'a str,
    /// Registered redirect URI
    pub redirect_uri: &'a str,
    /// S256 challenge derived from the verifier
    pub code_challenge: &'a str,
    /// Space-separated scopes as configured
    pub scope: &'a str,
    /// CSRF state echoed back on the callback
    pub state: &'a str,
}

/// Build `GET {base}/{org}/identity_/connect/authorize?...`.
///
/// Query parameters are emitted in a fixed order so identical inputs always
/// produce identical URLs.
///
/// # Errors
/// Returns an error if `base_url` is not an absolute URL that can carry a
/// path.
pub fn build_authorization_url(request: &AuthorizationRequest<'_>) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(request.base_url.trim_end_matches('/'))?;
    url.path_segments_mut()
        .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .extend([request.org_name, "identity_", "connect", "authorize"]);

    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", request.client_id)
        .append_pair("redirect_uri", request.redirect_uri)
        .append_pair("code_challenge", request.code_challenge)
        .append_pair("code_challenge_method", CHALLENGE_METHOD)
        .append_pair("scope", &with_offline_access(request.scope))
        .append_pair("state", request.state);

    Ok(url)
}

/// PKCE challenge pair for OAuth 2.0 authorization
///
/// Contains the code verifier (sent during token exchange), the code
/// challenge (sent during the authorization request) and a CSRF state.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    /// Random string, kept secret until token exchange
    pub code_verifier: String,

    /// SHA256 hash of `code_verifier` (base64url encoded)
    pub code_challenge: String,

    /// Random CSRF protection token
    pub state: String,
}

impl PkceChallenge {
    /// Generate a fresh verifier, its challenge, and a state token.
    #[must_use]
    pub fn generate() -> Self {
        let code_verifier = generate_code_verifier();
        let code_challenge = generate_code_challenge(&code_verifier);
        let state = generate_state();

        Self { code_verifier, code_challenge, state }
    }
}

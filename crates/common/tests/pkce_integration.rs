//! Integration tests for the PKCE engine.
//!
//! These exercise the public surface the way the flow orchestrator does:
//! generate a challenge, build the authorize URL, then check that the URL
//! carries a challenge derivable from the verifier.

use regex::Regex;
use tenantlink_common::auth::{build_authorization_url, generate_code_challenge};
use tenantlink_common::{AuthorizationRequest, PkceChallenge};

/// Round-trips a generated challenge through the authorize URL.
///
/// # Test Steps
/// 1. Generate a PKCE challenge
/// 2. Build the authorization URL from it
/// 3. Extract `code_challenge` and `state` from the query
/// 4. Recompute the challenge from the verifier and compare
#[test]
fn authorize_url_carries_challenge_of_verifier() {
    let pkce = PkceChallenge::generate();
    let url = build_authorization_url(&AuthorizationRequest {
        base_url: "https://cloud.example.com",
        org_name: "acme",
        client_id: "cli",
        redirect_uri: "http://localhost:8104/oidc/login",
        code_challenge: &pkce.code_challenge,
        scope: "openid",
        state: &pkce.state,
    })
    .expect("authorize url");

    let challenge = url
        .query_pairs()
        .find(|(k, _)| k == "code_challenge")
        .map(|(_, v)| v.into_owned())
        .expect("code_challenge present");
    let state = url
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .expect("state present");

    assert_eq!(challenge, generate_code_challenge(&pkce.code_verifier));
    assert_eq!(state, pkce.state);
}

#[test]
fn generated_values_use_base64url_alphabet_only() {
    let alphabet = Regex::new(r"^[A-Za-z0-9_-]+$").unwrap();

    for _ in 0..64 {
        let pkce = PkceChallenge::generate();
        assert!(alphabet.is_match(&pkce.code_verifier), "verifier: {}", pkce.code_verifier);
        assert!(alphabet.is_match(&pkce.code_challenge), "challenge: {}", pkce.code_challenge);
        assert!(alphabet.is_match(&pkce.state), "state: {}", pkce.state);
    }
}

//! OAuth 2.0 primitives that need no I/O.
//!
//! - **[`pkce`]**: verifier/challenge/state generation and authorization URL
//!   construction (RFC 7636)

pub mod pkce;

pub use pkce::{
    build_authorization_url, generate_code_challenge, generate_code_verifier, generate_state,
    with_offline_access, AuthorizationRequest, PkceChallenge, CHALLENGE_METHOD,
    OFFLINE_ACCESS_SCOPE,
};

//! Persistence keys and identity endpoint paths
//!
//! Keys are logical names handed to whatever storage backend the host
//! application injects; they carry no backend-specific prefixes.

/// Prefix of the per-client token key, see [`token_storage_key`].
pub const TOKEN_KEY_PREFIX: &str = "tenantlink.auth.token.";

/// Transient OAuth flow context, present only while a redirect is pending.
pub const FLOW_CONTEXT_KEY: &str = "tenantlink.auth.flow_context";

/// Bare PKCE verifier, stored beside the flow context so that "is a flow in
/// progress" can be answered without deserializing the context.
pub const CODE_VERIFIER_KEY: &str = "tenantlink.auth.code_verifier";

/// Path segments under `{base}/{org}/` for the token endpoint.
pub const TOKEN_ENDPOINT_SEGMENTS: [&str; 3] = ["identity_", "connect", "token"];

/// Default `token_type` when the identity provider omits it.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Query parameters stripped from a callback URL once it has been consumed.
pub const CALLBACK_QUERY_PARAMS: [&str; 3] = ["code", "state", "session_state"];

/// Storage key holding the OAuth token of `client_id`.
#[must_use]
pub fn token_storage_key(client_id: &str) -> String {
    format!("{TOKEN_KEY_PREFIX}{client_id}")
}

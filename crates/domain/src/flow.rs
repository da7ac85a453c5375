//! OAuth flow context
//!
//! Survives the redirect round-trip through the storage port and is deleted
//! exactly once, when the callback is exchanged or rejected.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Everything needed to finish an authorization-code exchange after the
/// browser comes back.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowContext {
    pub code_verifier: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub base_url: String,
    pub org_name: String,
    pub tenant_name: String,
    pub scope: String,
    /// CSRF value sent on the authorize URL; absent in contexts written by
    /// hosts that do not round-trip it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl fmt::Debug for FlowContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowContext")
            .field("code_verifier", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .field("base_url", &self.base_url)
            .field("org_name", &self.org_name)
            .field("tenant_name", &self.tenant_name)
            .field("scope", &self.scope)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape_is_camel_case() {
        let context = FlowContext {
            code_verifier: "v".into(),
            client_id: "cid".into(),
            redirect_uri: "http://localhost/cb".into(),
            base_url: "https://cloud.example.com".into(),
            org_name: "acme".into(),
            tenant_name: "t".into(),
            scope: "openid offline_access".into(),
            state: Some("s".into()),
        };

        let json = serde_json::to_value(&context).unwrap();
        assert_eq!(json["codeVerifier"], "v");
        assert_eq!(json["redirectUri"], "http://localhost/cb");

        let back: FlowContext = serde_json::from_value(json).unwrap();
        assert_eq!(back, context);
    }

    #[test]
    fn test_state_is_optional_on_read() {
        let context: FlowContext = serde_json::from_str(
            r#"{"codeVerifier":"v","clientId":"c","redirectUri":"r","baseUrl":"b",
                "orgName":"o","tenantName":"t","scope":"s"}"#,
        )
        .unwrap();
        assert_eq!(context.state, None);
    }
}

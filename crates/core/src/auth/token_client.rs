//! Identity provider token endpoint
//!
//! [`TokenEndpoint`] abstracts the two grants the SDK uses so the token
//! manager and the OAuth flow can be tested without a provider.
//! [`IdentityClient`] is the production implementation on top of the
//! [`HttpTransport`] port.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tenantlink_domain::constants::TOKEN_ENDPOINT_SEGMENTS;
use tenantlink_domain::{ErrorInfo, Result, SdkError, TokenResponse};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::ports::{HttpMethod, HttpRequest, HttpTransport};

/// Inputs of an authorization-code exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct CodeExchange {
    pub client_id: String,
    pub code: String,
    pub redirect_uri: String,
    pub code_verifier: String,
}

impl fmt::Debug for CodeExchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeExchange")
            .field("client_id", &self.client_id)
            .field("code", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("code_verifier", &"<redacted>")
            .finish()
    }
}

/// Trait for token endpoint operations
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchange an authorization code for tokens
    ///
    /// # Errors
    /// Returns `SdkError::Authentication` when the provider rejects the
    /// grant or answers with an unreadable body, `SdkError::Network` when
    /// the provider cannot be reached
    async fn exchange_code(&self, exchange: &CodeExchange) -> Result<TokenResponse>;

    /// Obtain a new access token from a refresh token
    ///
    /// # Errors
    /// Same as [`TokenEndpoint::exchange_code`]
    async fn refresh(&self, client_id: &str, refresh_token: &str) -> Result<TokenResponse>;
}

/// OAuth error body, RFC 6749 section 5.2.
#[derive(Debug, Default, Deserialize)]
struct OAuthErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

fn encode_form(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Token endpoint client for `{baseUrl}/{org}/identity_/connect/token`.
#[derive(Clone)]
pub struct IdentityClient {
    transport: Arc<dyn HttpTransport>,
    token_url: Url,
}

impl IdentityClient {
    pub const fn new(transport: Arc<dyn HttpTransport>, token_url: Url) -> Self {
        Self { transport, token_url }
    }

    /// Derive the token URL from the platform base URL and organization.
    ///
    /// # Errors
    /// Returns `SdkError::Validation` if `base_url` cannot carry a path
    pub fn for_organization(
        transport: Arc<dyn HttpTransport>,
        base_url: &str,
        org_name: &str,
    ) -> Result<Self> {
        let mut token_url = Url::parse(base_url)
            .map_err(|e| SdkError::validation(format!("Invalid base URL `{base_url}`: {e}")))?;
        token_url
            .path_segments_mut()
            .map_err(|()| SdkError::validation(format!("Base URL `{base_url}` cannot be a base")))?
            .pop_if_empty()
            .push(org_name)
            .extend(TOKEN_ENDPOINT_SEGMENTS);
        Ok(Self::new(transport, token_url))
    }

    #[must_use]
    pub const fn token_url(&self) -> &Url {
        &self.token_url
    }

    async fn post_form(&self, grant: &str, pairs: &[(&str, &str)]) -> Result<TokenResponse> {
        let request = HttpRequest::new(HttpMethod::Post, self.token_url.clone())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Accept", "application/json")
            .body(encode_form(pairs));

        let response = self.transport.send(request).await?;

        if !response.is_success() {
            let body: OAuthErrorBody = serde_json::from_str(&response.body).unwrap_or_default();
            let reason = match (body.error, body.error_description) {
                (Some(error), Some(description)) => format!("{error}: {description}"),
                (Some(error), None) => error,
                (None, Some(description)) => description,
                (None, None) => format!("HTTP {}", response.status),
            };
            warn!(grant, status = response.status, "token endpoint rejected grant");
            return Err(SdkError::Authentication(
                ErrorInfo::new(format!("Token request failed ({grant}): {reason}"))
                    .with_status(response.status)
                    .with_request_id(response.header("x-request-id").map(str::to_string)),
            ));
        }

        serde_json::from_str(&response.body).map_err(|e| {
            SdkError::authentication(format!("Token endpoint returned an unreadable body: {e}"))
        })
    }
}

impl fmt::Debug for IdentityClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityClient").field("token_url", &self.token_url.as_str()).finish()
    }
}

#[async_trait]
impl TokenEndpoint for IdentityClient {
    #[instrument(skip_all, fields(client_id = %exchange.client_id))]
    async fn exchange_code(&self, exchange: &CodeExchange) -> Result<TokenResponse> {
        debug!("exchanging authorization code");
        self.post_form(
            "authorization_code",
            &[
                ("grant_type", "authorization_code"),
                ("client_id", &exchange.client_id),
                ("code", &exchange.code),
                ("redirect_uri", &exchange.redirect_uri),
                ("code_verifier", &exchange.code_verifier),
            ],
        )
        .await
    }

    #[instrument(skip(self, refresh_token))]
    async fn refresh(&self, client_id: &str, refresh_token: &str) -> Result<TokenResponse> {
        debug!("refreshing access token");
        self.post_form(
            "refresh_token",
            &[
                ("grant_type", "refresh_token"),
                ("client_id", client_id),
                ("refresh_token", refresh_token),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use tenantlink_domain::{ErrorType, NetworkErrorKind};

    use super::*;
    use crate::ports::{HttpResponse, TransportError};
    use crate::testing::MockTransport;

    fn client(transport: &Arc<MockTransport>) -> IdentityClient {
        IdentityClient::for_organization(transport.clone(), "https://cloud.example.com/", "acme")
            .unwrap()
    }

    fn exchange() -> CodeExchange {
        CodeExchange {
            client_id: "cid".into(),
            code: "abc+/=".into(),
            redirect_uri: "http://localhost:8080/cb".into(),
            code_verifier: "verifier".into(),
        }
    }

    #[test]
    fn test_token_url_is_under_organization() {
        let transport = Arc::new(MockTransport::new());
        assert_eq!(
            client(&transport).token_url().as_str(),
            "https://cloud.example.com/acme/identity_/connect/token"
        );
    }

    #[tokio::test]
    async fn test_exchange_posts_form_encoded_grant() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(HttpResponse::new(
            200,
            r#"{"access_token":"at","expires_in":3600,"refresh_token":"rt"}"#,
        ));

        let response = client(&transport).exchange_code(&exchange()).await.unwrap();

        assert_eq!(response.access_token, "at");
        let sent = &transport.requests()[0];
        assert_eq!(sent.method, HttpMethod::Post);
        assert_eq!(sent.header_value("content-type"), Some("application/x-www-form-urlencoded"));
        let body = sent.body.as_deref().unwrap();
        assert!(body.contains("grant_type=authorization_code"));
        assert!(body.contains("code=abc%2B%2F%3D"));
        assert!(body.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fcb"));
        assert!(body.contains("code_verifier=verifier"));
    }

    #[tokio::test]
    async fn test_rejected_grant_is_authentication_error() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(
            HttpResponse::new(
                400,
                r#"{"error":"invalid_grant","error_description":"refresh token revoked"}"#,
            )
            .with_header("x-request-id", "req-9"),
        );

        let err = client(&transport).refresh("cid", "rt").await.unwrap_err();

        assert_eq!(err.error_type(), ErrorType::Authentication);
        assert_eq!(err.status_code(), Some(400));
        assert_eq!(err.request_id(), Some("req-9"));
        assert!(err.message().contains("invalid_grant: refresh token revoked"));
        assert!(transport.requests()[0].body.as_deref().unwrap().contains("grant_type=refresh_token"));
    }

    #[tokio::test]
    async fn test_unreadable_success_body_is_authentication_error() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(HttpResponse::new(200, "<html>login</html>"));

        let err = client(&transport).refresh("cid", "rt").await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Authentication);
    }

    #[tokio::test]
    async fn test_transport_failure_is_network_error() {
        let transport = Arc::new(MockTransport::new());
        transport.push_error(TransportError::new("ConnectError", "connection refused"));

        let err = client(&transport).exchange_code(&exchange()).await.unwrap_err();
        assert_eq!(err.network_kind(), Some(NetworkErrorKind::Generic));
    }

    #[test]
    fn test_debug_redacts_code_and_verifier() {
        let rendered = format!("{:?}", exchange());
        assert!(!rendered.contains("abc+/="));
        assert!(!rendered.contains("verifier\""));
    }
}

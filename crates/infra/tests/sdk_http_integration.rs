//! End-to-end tests: the SDK over the reqwest transport against a mock
//! platform.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use tenantlink_core::api::RequestOptions;
use tenantlink_core::ports::Storage;
use tenantlink_core::testing::RecordingNavigator;
use tenantlink_core::Sdk;
use tenantlink_domain::{ErrorType, NetworkErrorKind, OAuthSettings, SdkConfig, TokenInfo};
use tenantlink_infra::{FileStorage, ReqwestTransport};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REDIRECT_URI: &str = "http://localhost:8765/callback";

fn transport() -> Arc<ReqwestTransport> {
    Arc::new(ReqwestTransport::builder().no_proxy().build().expect("transport"))
}

fn oauth_config(server: &MockServer) -> SdkConfig {
    SdkConfig::oauth(
        server.uri(),
        "acme",
        "DefaultTenant",
        OAuthSettings::new("cli-app", REDIRECT_URI, "openid OR.Folders"),
    )
    .expect("config")
}

fn token_body(access: &str, refresh: &str) -> Value {
    json!({
        "access_token": access,
        "token_type": "Bearer",
        "expires_in": 3600,
        "scope": "openid OR.Folders offline_access",
        "refresh_token": refresh,
    })
}

#[tokio::test]
async fn oauth_login_then_api_call_then_restore() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/acme/identity_/connect/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=the-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-1", "rt-1")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/acme/DefaultTenant/odata/Folders"))
        .and(header("authorization", "Bearer at-1"))
        .and(query_param("$top", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": [{"Id": 1}]})))
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(dir.path().join("session.json")));
    let navigator = Arc::new(RecordingNavigator::default());
    let sdk = Sdk::builder(oauth_config(&server))
        .transport(transport())
        .storage(storage.clone())
        .navigator(navigator.clone())
        .build()
        .unwrap();

    assert!(!sdk.auth().authenticate().await.unwrap());
    let authorize = navigator.opened().pop().expect("authorize URL opened");
    assert_eq!(authorize.path(), "/acme/identity_/connect/authorize");
    let state = authorize
        .query_pairs()
        .find(|(key, _)| key == "state")
        .map(|(_, value)| value.into_owned())
        .expect("state");

    let callback = Url::parse(&format!("{REDIRECT_URI}?code=the-code&state={state}")).unwrap();
    assert!(sdk.auth().is_callback(&callback).await);
    let outcome = sdk.auth().handle_callback(&callback).await.unwrap();
    assert!(outcome.authenticated);
    assert_eq!(outcome.clean_url.as_str(), REDIRECT_URI);

    let folders: Value =
        sdk.api().get("odata/Folders", RequestOptions::new().param("$top", 5)).await.unwrap();
    assert_eq!(folders["value"][0]["Id"], 1);

    let navigator = Arc::new(RecordingNavigator::default());
    let restored = Sdk::builder(oauth_config(&server))
        .transport(transport())
        .storage(Arc::new(FileStorage::new(dir.path().join("session.json"))))
        .navigator(navigator.clone())
        .build()
        .unwrap();
    assert!(restored.auth().authenticate().await.unwrap());
    assert!(navigator.opened().is_empty());
    let _: Value =
        restored.api().get("odata/Folders", RequestOptions::new().param("$top", 5)).await.unwrap();
}

#[tokio::test]
async fn concurrent_requests_share_one_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/acme/identity_/connect/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=rt-old"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("at-new", "rt-new"))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/acme/DefaultTenant/api/Status"))
        .and(header("authorization", "Bearer at-new"))
        .respond_with(ResponseTemplate::new(204))
        .expect(6)
        .mount(&server)
        .await;

    let sdk = Sdk::builder(oauth_config(&server)).transport(transport()).build().unwrap();
    sdk.auth()
        .update_token(TokenInfo::oauth(
            "at-old",
            Utc::now() - chrono::Duration::minutes(1),
            Some("rt-old".into()),
        ))
        .await;

    let calls = (0..6).map(|_| sdk.api().get::<Option<Value>>("api/Status", RequestOptions::new()));
    let results = futures::future::join_all(calls).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(sdk.auth().get_token().await.as_deref(), Some("at-new"));
}

#[tokio::test]
async fn rejected_refresh_logs_the_caller_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/acme/identity_/connect/token"))
        .respond_with(
            ResponseTemplate::new(400)
                .insert_header("x-request-id", "idp-7")
                .set_body_json(json!({"error": "invalid_grant", "error_description": "expired"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let sdk = Sdk::builder(oauth_config(&server)).transport(transport()).build().unwrap();
    sdk.auth()
        .update_token(TokenInfo::oauth("at", Utc::now() - chrono::Duration::seconds(5), Some("rt".into())))
        .await;

    let err = sdk.api().get::<Value>("odata/Folders", RequestOptions::new()).await.unwrap_err();

    assert_eq!(err.error_type(), ErrorType::Authentication);
    assert_eq!(err.status_code(), Some(400));
    assert_eq!(err.request_id(), Some("idp-7"));
    assert!(err.message().contains("invalid_grant"));
    assert!(!sdk.auth().has_valid_token().await);
}

#[tokio::test]
async fn backend_errors_are_normalized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/acme/t/odata/Folders(9)"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "message": "Folder does not exist",
            "errorCode": 1002,
            "traceId": "trace-1",
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/acme/t/api/busy"))
        .respond_with(
            ResponseTemplate::new(503)
                .insert_header("x-request-id", "req-503")
                .set_body_string("upstream unavailable"),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/acme/t/workflow/start"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "type": "https://errors.example.com/validation",
            "title": "One or more validation errors occurred.",
            "status": 422,
            "errors": {"name": ["is required"]},
        })))
        .mount(&server)
        .await;

    let config = SdkConfig::secret(server.uri(), "acme", "t", "pat").unwrap();
    let sdk = Sdk::builder(config).transport(transport()).build().unwrap();

    let err = sdk.api().get::<Value>("odata/Folders(9)", RequestOptions::new()).await.unwrap_err();
    assert_eq!(err.error_type(), ErrorType::NotFound);
    assert_eq!(err.message(), "Folder does not exist");
    assert_eq!(err.request_id(), Some("trace-1"));

    let err = sdk.api().get::<Value>("api/busy", RequestOptions::new()).await.unwrap_err();
    assert_eq!(err.error_type(), ErrorType::Server);
    assert_eq!(err.message(), "upstream unavailable");
    assert_eq!(err.request_id(), Some("req-503"));
    assert!(err.is_retryable());

    let err = sdk.api().post::<_, Value>("workflow/start", &json!({}), RequestOptions::new()).await.unwrap_err();
    assert_eq!(err.error_type(), ErrorType::Validation);
    assert_eq!(err.status_code(), Some(422));
    assert!(err.message().contains("name: is required"));
    assert!(err.message().ends_with("(HTTP 422)"));
}

#[tokio::test]
async fn cancelled_call_is_an_aborted_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let config = SdkConfig::secret(server.uri(), "acme", "t", "pat").unwrap();
    let sdk = Sdk::builder(config).transport(transport()).build().unwrap();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = sdk
        .api()
        .get::<Value>("slow", RequestOptions::new().cancel_with(cancel))
        .await
        .unwrap_err();

    assert_eq!(err.error_type(), ErrorType::Network);
    assert_eq!(err.network_kind(), Some(NetworkErrorKind::Aborted));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn unreachable_platform_is_a_retryable_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = SdkConfig::secret(format!("http://{addr}"), "acme", "t", "pat").unwrap();
    let sdk = Sdk::builder(config).transport(transport()).build().unwrap();

    let err = sdk.api().get::<Value>("odata/Folders", RequestOptions::new()).await.unwrap_err();

    assert_eq!(err.network_kind(), Some(NetworkErrorKind::Generic));
    assert!(err.is_retryable());
}

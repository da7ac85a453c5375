//! Loopback receiver for the OAuth redirect
//!
//! Binds the host, port and path of the configured redirect URI, waits for
//! the identity provider to send the browser back, and hands the full
//! callback URL (query included) to
//! [`AuthService::handle_callback`](tenantlink_core::AuthService::handle_callback).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::RawQuery;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use url::Url;

const SUCCESS_PAGE: &str = r"<!DOCTYPE html>
<html>
<head><title>Authorization Complete</title></head>
<body><h1>Authorization received</h1><p>You can close this window and return to the terminal.</p></body>
</html>";

const FAILURE_PAGE: &str = r"<!DOCTYPE html>
<html>
<head><title>Authorization Failed</title></head>
<body><h1>Authorization Failed</h1><p>The identity provider returned an error. Check the terminal for details.</p></body>
</html>";

const MISSING_PAGE: &str = r"<!DOCTYPE html>
<html>
<head><title>Waiting for Authorization</title></head>
<body><h1>No authorization code</h1><p>This request carried no code or error.</p></body>
</html>";

/// Errors from the loopback callback server
#[derive(Debug, Error)]
pub enum CallbackServerError {
    #[error("redirect URI `{uri}` cannot be served locally: {reason}")]
    UnsupportedRedirectUri { uri: String, reason: String },

    #[error("failed to bind OAuth callback server on {addr}: {message}")]
    Bind { addr: String, message: String },

    #[error("no OAuth callback received within {0:?}")]
    Timeout(Duration),

    #[error("OAuth callback server stopped before a callback arrived")]
    Closed,
}

type CallbackSender = Arc<Mutex<Option<oneshot::Sender<Url>>>>;

/// One-shot HTTP server for the redirect URI.
///
/// The first request carrying `code` or `error` completes the wait; the
/// server shuts down when dropped.
pub struct CallbackServer {
    redirect_uri: Url,
    local_addr: SocketAddr,
    callback_rx: oneshot::Receiver<Url>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CallbackServer {
    /// Bind the address named by `redirect_uri`.
    ///
    /// Only plain `http` loopback URIs are accepted. Port 0 binds an
    /// ephemeral port; [`CallbackServer::redirect_uri`] then reports the
    /// actual one.
    ///
    /// # Errors
    /// Returns `CallbackServerError::UnsupportedRedirectUri` for non-loopback
    /// or non-http URIs and `CallbackServerError::Bind` if the port is taken
    pub async fn bind(redirect_uri: &Url) -> Result<Self, CallbackServerError> {
        let unsupported = |reason: &str| CallbackServerError::UnsupportedRedirectUri {
            uri: redirect_uri.to_string(),
            reason: reason.to_string(),
        };

        if redirect_uri.scheme() != "http" {
            return Err(unsupported("only http:// redirect URIs can be served"));
        }
        let host = match redirect_uri.host_str() {
            Some("localhost" | "127.0.0.1") => "127.0.0.1",
            Some("[::1]") => "[::1]",
            _ => return Err(unsupported("host must be localhost, 127.0.0.1 or [::1]")),
        };
        let port = redirect_uri.port_or_known_default().unwrap_or(80);
        let bind_addr = format!("{host}:{port}");

        let listener = TcpListener::bind(&bind_addr).await.map_err(|err| {
            CallbackServerError::Bind { addr: bind_addr.clone(), message: err.to_string() }
        })?;
        let local_addr = listener.local_addr().map_err(|err| CallbackServerError::Bind {
            addr: bind_addr.clone(),
            message: err.to_string(),
        })?;

        let mut redirect_uri = redirect_uri.clone();
        if port == 0 {
            redirect_uri
                .set_port(Some(local_addr.port()))
                .map_err(|()| unsupported("cannot carry a port"))?;
        }
        let route_path = match redirect_uri.path() {
            "" => "/".to_string(),
            path => path.to_string(),
        };

        let (callback_tx, callback_rx) = oneshot::channel();
        let sender: CallbackSender = Arc::new(Mutex::new(Some(callback_tx)));
        let base = redirect_uri.clone();

        let app = Router::new().route(
            &route_path,
            get(move |query: RawQuery| handle_callback(query, base.clone(), sender.clone())),
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                error!(error = %err, "OAuth callback server error");
            }
        });

        info!(addr = %local_addr, path = %route_path, "OAuth callback server listening");
        Ok(Self {
            redirect_uri,
            local_addr,
            callback_rx,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// The redirect URI being served, with the bound port filled in.
    #[must_use]
    pub const fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the browser to arrive and return the callback URL.
    ///
    /// # Errors
    /// Returns `CallbackServerError::Timeout` when `timeout` elapses first
    pub async fn wait(mut self, timeout: Duration) -> Result<Url, CallbackServerError> {
        let rx = &mut self.callback_rx;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(url)) => Ok(url),
            Ok(Err(_)) => Err(CallbackServerError::Closed),
            Err(_) => Err(CallbackServerError::Timeout(timeout)),
        }
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                handle.abort();
            }
        }
    }
}

async fn handle_callback(
    RawQuery(query): RawQuery,
    base: Url,
    sender: CallbackSender,
) -> (StatusCode, Html<&'static str>) {
    let mut url = base;
    url.set_query(query.as_deref());

    let has = |name: &str| url.query_pairs().any(|(key, _)| key == name);
    let page = if has("error") {
        FAILURE_PAGE
    } else if has("code") {
        SUCCESS_PAGE
    } else {
        debug!("ignoring callback request without code or error");
        return (StatusCode::BAD_REQUEST, Html(MISSING_PAGE));
    };

    match sender.lock().await.take() {
        Some(tx) => {
            let _ = tx.send(url);
            (StatusCode::OK, Html(page))
        }
        None => {
            debug!("duplicate OAuth callback ignored");
            (StatusCode::CONFLICT, Html(page))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ephemeral() -> CallbackServer {
        CallbackServer::bind(&Url::parse("http://localhost:0/callback").unwrap()).await.unwrap()
    }

    fn client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    #[tokio::test]
    async fn delivers_the_full_callback_url() {
        let server = ephemeral().await;
        let port = server.local_addr().port();
        assert_eq!(server.redirect_uri().port(), Some(port));

        let response = client()
            .get(format!("http://127.0.0.1:{port}/callback?code=abc&state=xyz"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let url = server.wait(Duration::from_secs(5)).await.unwrap();
        assert_eq!(url.as_str(), format!("http://localhost:{port}/callback?code=abc&state=xyz"));
    }

    #[tokio::test]
    async fn provider_errors_are_delivered_too() {
        let server = ephemeral().await;
        let port = server.local_addr().port();

        let response = client()
            .get(format!("http://127.0.0.1:{port}/callback?error=access_denied"))
            .send()
            .await
            .unwrap();
        assert!(response.text().await.unwrap().contains("Authorization Failed"));

        let url = server.wait(Duration::from_secs(5)).await.unwrap();
        assert_eq!(url.query(), Some("error=access_denied"));
    }

    #[tokio::test]
    async fn requests_without_code_keep_waiting() {
        let server = ephemeral().await;
        let port = server.local_addr().port();

        let response =
            client().get(format!("http://127.0.0.1:{port}/callback")).send().await.unwrap();
        assert_eq!(response.status(), 400);

        let err = server.wait(Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, CallbackServerError::Timeout(_)));
    }

    #[tokio::test]
    async fn rejects_remote_and_https_redirects() {
        for uri in ["https://localhost:8080/cb", "http://example.com/cb"] {
            let err = CallbackServer::bind(&Url::parse(uri).unwrap()).await.err().unwrap();
            assert!(matches!(err, CallbackServerError::UnsupportedRedirectUri { .. }), "{uri}");
        }
    }

    #[tokio::test]
    async fn port_in_use_is_a_bind_error() {
        let first = ephemeral().await;
        let uri = format!("http://127.0.0.1:{}/callback", first.local_addr().port());

        let err = CallbackServer::bind(&Url::parse(&uri).unwrap()).await.err().unwrap();

        assert!(matches!(err, CallbackServerError::Bind { .. }));
    }
}

use thiserror::Error;
use tracing::info;
use url::Url;

/// The authorization URL could not be handed to a browser.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to open authorization URL: {0}")]
pub struct NavigatorError(pub String);

/// Sends the user agent to the authorization endpoint.
pub trait Navigator: Send + Sync {
    /// Open or redirect to `url`.
    fn open(&self, url: &Url) -> Result<(), NavigatorError>;
}

/// Navigator that only logs the URL, for hosts that present it themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn open(&self, url: &Url) -> Result<(), NavigatorError> {
        info!(url = %url, "authorization required; open this URL to continue");
        Ok(())
    }
}

use tenantlink_core::ports::{Navigator, NavigatorError};
use tracing::{info, warn};
use url::Url;

/// Opens the authorization URL in the default browser.
///
/// The URL is also logged so it can be opened by hand on headless hosts.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserNavigator;

impl Navigator for BrowserNavigator {
    fn open(&self, url: &Url) -> Result<(), NavigatorError> {
        info!(url = %url, "opening browser for authorization");
        webbrowser::open(url.as_str()).map_err(|err| {
            warn!(error = %err, "failed to launch browser");
            NavigatorError(err.to_string())
        })
    }
}

//! Login command
//!
//! Secret configurations only verify that the secret is present. OAuth
//! configurations listen on the redirect URI, send the user to the
//! authorize page and exchange the returned code.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use tenantlink_core::ports::{Navigator, NavigatorError};
use tenantlink_infra::{BrowserNavigator, CallbackServer};
use tracing::{info, warn};
use url::Url;

use crate::context::GlobalArgs;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct LoginCommand {
    /// Seconds to wait for the browser to come back
    #[arg(long, default_value_t = 300)]
    pub timeout: u64,

    /// Print the authorization URL instead of opening a browser
    #[arg(long)]
    pub no_browser: bool,

    /// Sign in again even if a valid session is stored
    #[arg(long)]
    pub force: bool,
}

/// Prints the authorization URL for the user to open.
struct PrintNavigator;

impl Navigator for PrintNavigator {
    fn open(&self, url: &Url) -> Result<(), NavigatorError> {
        eprintln!("Open this URL in a browser to sign in:\n\n  {url}\n");
        Ok(())
    }
}

impl LoginCommand {
    pub async fn execute(&self, globals: &GlobalArgs, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let navigator: Arc<dyn Navigator> =
            if self.no_browser { Arc::new(PrintNavigator) } else { Arc::new(BrowserNavigator) };
        let sdk = globals.sdk(Some(navigator))?;
        let config = sdk.config().clone();

        let Some(settings) = config.oauth_settings() else {
            sdk.auth().authenticate().await?;
            formatter.success(&format!(
                "Using secret credentials for {}/{}",
                config.org_name(),
                config.tenant_name()
            ));
            sdk.dispose();
            return Ok(());
        };

        if self.force {
            sdk.auth().logout().await;
        }

        let redirect_uri = Url::parse(&settings.redirect_uri).context("Invalid redirect URI")?;
        let server = CallbackServer::bind(&redirect_uri)
            .await
            .context("Cannot receive the OAuth redirect on this machine")?;
        info!(redirect_uri = %server.redirect_uri(), "listening for authorization callback");

        if sdk.auth().authenticate().await? {
            formatter.success("Already signed in");
            sdk.dispose();
            return Ok(());
        }

        formatter.info("Waiting for the browser to complete sign-in...");
        let callback = tokio::select! {
            result = server.wait(Duration::from_secs(self.timeout)) => result?,
            _ = tokio::signal::ctrl_c() => {
                warn!("login interrupted; discarding pending flow");
                sdk.auth().logout().await;
                bail!("Login cancelled");
            }
        };

        let outcome = sdk.auth().handle_callback(&callback).await?;
        if !outcome.authenticated {
            bail!("The identity provider did not return a usable session");
        }

        info!(org = config.org_name(), tenant = config.tenant_name(), "login completed");
        formatter.success(&format!(
            "Signed in to {}/{} as client {}",
            config.org_name(),
            config.tenant_name(),
            settings.client_id
        ));
        sdk.dispose();
        Ok(())
    }
}

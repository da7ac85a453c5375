//! Status command - show the configured target and stored session

use anyhow::Result;
use clap::Args;
use serde_json::json;
use tenantlink_core::TokenState;

use crate::context::GlobalArgs;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct StatusCommand {}

impl StatusCommand {
    pub async fn execute(&self, globals: &GlobalArgs, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let sdk = globals.sdk(None)?;
        let config = sdk.config();
        let tokens = sdk.auth().token_manager();

        tokens.load().await;
        let state = tokens.state().await;
        let token = tokens.current().await;
        let expires_at = token.as_ref().and_then(tenantlink_domain::TokenInfo::expires_at);
        let mode = if config.oauth_settings().is_some() { "oauth" } else { "secret" };

        match format {
            OutputFormat::Json => formatter.print_json(&json!({
                "baseUrl": config.base_url(),
                "orgName": config.org_name(),
                "tenantName": config.tenant_name(),
                "authMode": mode,
                "tokenState": format!("{state:?}"),
                "expiresAt": expires_at.map(|at| at.to_rfc3339()),
                "canRefresh": token.as_ref().is_some_and(|t| t.refresh_token().is_some()),
            })),
            OutputFormat::Human => {
                if state == TokenState::Valid {
                    formatter.success("Signed in");
                } else {
                    formatter.warn("Not signed in; run `tenantlink login`");
                }
                formatter.info(&format!("Target:  {}/{}/{}", config.base_url(), config.org_name(), config.tenant_name()));
                formatter.info(&format!("Auth:    {mode}"));
                formatter.info(&format!("State:   {state:?}"));
                if let Some(at) = expires_at {
                    formatter.info(&format!("Expires: {}", at.to_rfc3339()));
                }
            }
        }

        sdk.dispose();
        Ok(())
    }
}

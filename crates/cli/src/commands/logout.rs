use anyhow::Result;
use clap::Args;
use tracing::info;

use crate::context::GlobalArgs;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct LogoutCommand {}

impl LogoutCommand {
    pub async fn execute(&self, globals: &GlobalArgs, format: OutputFormat) -> Result<()> {
        let sdk = globals.sdk(None)?;
        sdk.auth().logout().await;
        info!(org = sdk.config().org_name(), "session cleared");
        get_formatter(format).success("Signed out");
        sdk.dispose();
        Ok(())
    }
}

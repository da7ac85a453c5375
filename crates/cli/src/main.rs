//! TenantLink CLI
//!
//! Provides commands for:
//! - Signing in with OAuth (browser + loopback callback) or a secret
//! - Signing out
//! - Showing the stored session
//! - Sending authorized requests to the tenant API

use anyhow::Result;
use clap::{Parser, Subcommand};
use tenantlink_infra::logging::{self, LogFormat};

mod commands;
mod context;
mod output;

use commands::login::LoginCommand;
use commands::logout::LogoutCommand;
use commands::request::RequestCommand;
use commands::status::StatusCommand;
use context::{GlobalArgs, StorageKind};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "tenantlink", version, about = "Authenticate and call a multi-tenant platform API")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit log lines as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file (TOML or JSON); environment variables still take precedence
    #[arg(long, global = true, env = "TENANTLINK_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Where the session is kept between runs
    #[arg(long, global = true, value_enum, default_value_t = StorageKind::File)]
    storage: StorageKind,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sign in and store the session
    Login(LoginCommand),
    /// Forget the stored session
    Logout(LogoutCommand),
    /// Show the stored session
    Status(StatusCommand),
    /// Send an authorized request to the tenant API
    Request(RequestCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is normal.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_format = if cli.json_logs { LogFormat::Json } else { LogFormat::Pretty };
    logging::init(cli.verbose, log_format)?;

    let format = if cli.json { OutputFormat::Json } else { OutputFormat::Human };
    let globals = GlobalArgs { config: cli.config, storage: cli.storage };

    match cli.command {
        Commands::Login(cmd) => cmd.execute(&globals, format).await,
        Commands::Logout(cmd) => cmd.execute(&globals, format).await,
        Commands::Status(cmd) => cmd.execute(&globals, format).await,
        Commands::Request(cmd) => cmd.execute(&globals, format).await,
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_work_after_the_subcommand() {
        let cli = Cli::try_parse_from(["tenantlink", "status", "--json", "-vv", "--storage", "keyring"])
            .unwrap();

        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.storage, StorageKind::Keyring);
        assert!(matches!(cli.command, Commands::Status(_)));
    }
}

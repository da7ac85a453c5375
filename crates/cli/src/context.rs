//! Shared setup for every command: configuration, storage, SDK

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ValueEnum;
use tenantlink_core::ports::{Navigator, Storage};
use tenantlink_core::Sdk;
use tenantlink_domain::SdkConfig;
use tenantlink_infra::{config, FileStorage, KeyringStorage, ReqwestTransport};
use tracing::debug;

/// Session storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageKind {
    /// JSON file under the user state directory
    File,
    /// System keychain
    Keyring,
}

/// Flags shared by all commands
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub config: Option<PathBuf>,
    pub storage: StorageKind,
}

impl GlobalArgs {
    /// Resolve configuration: environment first, then the given or probed file.
    pub fn load_config(&self) -> Result<SdkConfig> {
        match &self.config {
            Some(path) => {
                let file = config::read_raw_file(path)?;
                SdkConfig::try_from(config::raw_from_env().or(file))
                    .with_context(|| format!("Invalid configuration in {}", path.display()))
            }
            None => config::load().context(
                "No usable configuration; set TENANTLINK_* variables or create tenantlink.toml",
            ),
        }
    }

    pub fn storage(&self) -> Result<Arc<dyn Storage>> {
        Ok(match self.storage {
            StorageKind::Keyring => Arc::new(KeyringStorage::default()),
            StorageKind::File => {
                let path = FileStorage::default_path()
                    .context("Cannot locate a platform state or data directory for the session file")?;
                debug!(path = %path.display(), "using file session storage");
                Arc::new(FileStorage::new(path))
            }
        })
    }

    /// SDK for the loaded configuration, with an optional navigator for
    /// interactive commands.
    pub fn sdk(&self, navigator: Option<Arc<dyn Navigator>>) -> Result<Sdk> {
        let config = self.load_config()?;
        let transport = ReqwestTransport::builder()
            .max_attempts(2)
            .build()
            .context("Failed to initialize HTTP client")?;

        let mut builder =
            Sdk::builder(config).transport(Arc::new(transport)).storage(self.storage()?);
        if let Some(navigator) = navigator {
            builder = builder.navigator(navigator);
        }
        Ok(builder.build()?)
    }
}

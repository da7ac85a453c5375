//! Configuration loader
//!
//! ## Loading Strategy
//! 1. Read the `TENANTLINK_*` environment variables
//! 2. If they form a complete configuration, use them
//! 3. Otherwise probe for a config file and fill the gaps from it
//!    (environment values win)
//! 4. JSON and TOML are supported, chosen by file extension
//!
//! ## Environment Variables
//! - `TENANTLINK_BASE_URL`: platform root, e.g. `https://cloud.example.com`
//! - `TENANTLINK_ORG_NAME`: organization segment
//! - `TENANTLINK_TENANT_NAME`: tenant segment
//! - `TENANTLINK_CLIENT_ID`, `TENANTLINK_REDIRECT_URI`, `TENANTLINK_SCOPE`:
//!   OAuth mode
//! - `TENANTLINK_SECRET`: secret mode
//! - `TENANTLINK_CONFIG`: explicit config file path
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `$TENANTLINK_CONFIG`
//! 2. `./tenantlink.toml`, then `./tenantlink.json`
//! 3. `tenantlink/config.toml` under the platform config directory

use std::path::{Path, PathBuf};

use tenantlink_domain::{ConfigError, RawConfig, SdkConfig};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_VAR: &str = "TENANTLINK_CONFIG";

/// Load configuration from the environment, falling back to a config file.
///
/// # Errors
/// Returns `ConfigError` if neither source (nor their merge) yields a
/// valid configuration, or the config file cannot be read or parsed
pub fn load() -> Result<SdkConfig, ConfigError> {
    let env = raw_from_env();
    match SdkConfig::try_from(env.clone()) {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(env_err) => {
            tracing::debug!(error = %env_err, "Environment incomplete, trying config file");
            let Some(path) = probe_config_paths() else {
                return Err(env_err);
            };
            let file = read_raw_file(&path)?;
            SdkConfig::try_from(env.or(file))
        }
    }
}

/// Load configuration from environment variables only.
///
/// # Errors
/// Returns `ConfigError` if the variables do not form a valid configuration
pub fn load_from_env() -> Result<SdkConfig, ConfigError> {
    SdkConfig::try_from(raw_from_env())
}

/// Unvalidated configuration from the `TENANTLINK_*` variables.
///
/// Unset and empty variables are both treated as absent.
#[must_use]
pub fn raw_from_env() -> RawConfig {
    RawConfig {
        base_url: env_var("TENANTLINK_BASE_URL"),
        org_name: env_var("TENANTLINK_ORG_NAME"),
        tenant_name: env_var("TENANTLINK_TENANT_NAME"),
        client_id: env_var("TENANTLINK_CLIENT_ID"),
        redirect_uri: env_var("TENANTLINK_REDIRECT_URI"),
        scope: env_var("TENANTLINK_SCOPE"),
        secret: env_var("TENANTLINK_SECRET"),
    }
}

/// Load configuration from a file.
///
/// If `path` is `None`, probes the standard locations.
///
/// # Errors
/// Returns `ConfigError` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - The contents do not form a valid configuration
pub fn load_from_file(path: Option<PathBuf>) -> Result<SdkConfig, ConfigError> {
    let config_path = match path {
        Some(p) => p,
        None => probe_config_paths().ok_or_else(|| ConfigError::Io {
            source_name: "config search".to_string(),
            message: "no config file found in any of the standard locations".to_string(),
        })?,
    };

    SdkConfig::try_from(read_raw_file(&config_path)?)
}

/// Read and parse a config file without validating it.
///
/// # Errors
/// Returns `ConfigError::Io` if the file cannot be read and
/// `ConfigError::Parse` if its contents are malformed
pub fn read_raw_file(path: &Path) -> Result<RawConfig, ConfigError> {
    tracing::info!(path = %path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        source_name: path.display().to_string(),
        message: e.to_string(),
    })?;

    parse_config(&contents, path)
}

/// Parse by file extension (`.json` or `.toml`, JSON when there is none).
fn parse_config(contents: &str, path: &Path) -> Result<RawConfig, ConfigError> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
    let parse_error = |message: String| ConfigError::Parse {
        source_name: path.display().to_string(),
        message,
    };

    match extension {
        "toml" => toml::from_str(contents).map_err(|e| parse_error(format!("invalid TOML: {e}"))),
        "json" => {
            serde_json::from_str(contents).map_err(|e| parse_error(format!("invalid JSON: {e}")))
        }
        other => Err(parse_error(format!("unsupported config format `{other}`"))),
    }
}

/// First existing config file among the standard locations.
#[must_use]
pub fn probe_config_paths() -> Option<PathBuf> {
    candidate_paths().into_iter().find(|path| path.is_file())
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(explicit) = env_var(CONFIG_PATH_VAR) {
        candidates.push(PathBuf::from(explicit));
    }

    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join("tenantlink.toml"));
        candidates.push(cwd.join("tenantlink.json"));
    }

    if let Some(config_home) = dirs::config_dir() {
        candidates.push(config_home.join("tenantlink").join("config.toml"));
    }

    candidates
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

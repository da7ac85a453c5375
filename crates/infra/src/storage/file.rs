//! Storage in a JSON file
//!
//! The whole map is rewritten on every change: the new document goes to a
//! sibling temp file which is then renamed over the old one, so readers
//! never see a partial write.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tenantlink_core::ports::{Storage, StorageError};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Key-value storage persisted as one JSON object.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    /// `tenantlink/session.json` under the platform state directory, or the
    /// local data directory where the platform has no state directory.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        let state_dir = dirs::state_dir().or_else(dirs::data_local_dir)?;
        Some(state_dir.join("tenantlink").join("session.json"))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_map(&self, key: &str) -> Result<BTreeMap<String, String>, StorageError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => {
                return Err(StorageError::AccessFailed {
                    key: key.to_string(),
                    message: format!("cannot read {}: {err}", self.path.display()),
                })
            }
        };

        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        match serde_json::from_str(&contents) {
            Ok(map) => Ok(map),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "storage file is corrupt; starting empty");
                Ok(BTreeMap::new())
            }
        }
    }

    async fn write_map(&self, key: &str, map: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let access_failed = |message: String| StorageError::AccessFailed { key: key.to_string(), message };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| access_failed(format!("cannot create {}: {err}", parent.display())))?;
        }

        let contents = serde_json::to_string_pretty(map)
            .map_err(|err| access_failed(format!("cannot serialize storage: {err}")))?;
        let tmp = self.path.with_extension("json.tmp");
        write_private(&tmp, contents.as_bytes())
            .await
            .map_err(|err| access_failed(format!("cannot write {}: {err}", tmp.display())))?;
        restrict_permissions(&tmp).await;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|err| access_failed(format!("cannot replace {}: {err}", self.path.display())))?;
        debug!(path = %self.path.display(), entries = map.len(), "storage file written");
        Ok(())
    }
}

/// Write `contents` to `path`, creating it owner-only on unix.
async fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(contents).await?;
    file.sync_all().await
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Err(err) = tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await {
        warn!(path = %path.display(), error = %err, "cannot restrict storage file permissions");
    }
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) {}

#[async_trait]
impl Storage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_map(key).await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map(key).await?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(key, &map).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map(key).await?;
        if map.remove(key).is_none() {
            return Ok(());
        }
        self.write_map(key, &map).await
    }
}

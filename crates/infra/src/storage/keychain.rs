//! Storage backed by the system keyring

use async_trait::async_trait;
use keyring::Entry;
use tenantlink_core::ports::{Storage, StorageError};
use tracing::debug;

use crate::errors::storage_error;

/// Default keyring service name.
pub const DEFAULT_SERVICE: &str = "tenantlink";

/// Stores each key as a separate credential under one service name.
///
/// Keyring calls are blocking and run on the blocking thread pool.
#[derive(Debug, Clone)]
pub struct KeyringStorage {
    service: String,
}

impl Default for KeyringStorage {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE)
    }
}

impl KeyringStorage {
    pub fn new(service: impl Into<String>) -> Self {
        Self { service: service.into() }
    }

    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    async fn with_entry<T, F>(&self, key: &str, op: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Entry, &str) -> Result<T, StorageError> + Send + 'static,
    {
        let service = self.service.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            let entry = Entry::new(&service, &key).map_err(|err| storage_error(&key, err))?;
            op(&entry, &key)
        })
        .await
        .map_err(|err| StorageError::Unavailable(format!("keyring task failed: {err}")))?
    }
}

#[async_trait]
impl Storage for KeyringStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.with_entry(key, |entry, key| match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => {
                debug!(key, "no keyring entry");
                Ok(None)
            }
            Err(err) => Err(storage_error(key, err)),
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let value = value.to_string();
        self.with_entry(key, move |entry, key| {
            entry.set_password(&value).map_err(|err| storage_error(key, err))?;
            debug!(key, "stored keyring entry");
            Ok(())
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.with_entry(key, |entry, key| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(storage_error(key, err)),
        })
        .await
    }
}

//! Persistent [`Storage`](tenantlink_core::ports::Storage) backends
//!
//! - [`KeyringStorage`]: OS credential store, one entry per key
//! - [`FileStorage`]: a single JSON document on disk

pub mod file;
pub mod keychain;

pub use file::FileStorage;
pub use keychain::KeyringStorage;

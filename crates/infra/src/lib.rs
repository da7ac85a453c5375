//! # TenantLink Infrastructure
//!
//! Concrete implementations of the `tenantlink-core` ports.
//!
//! This crate contains:
//! - [`ReqwestTransport`]: the HTTP stack
//! - [`KeyringStorage`] and [`FileStorage`]: persistent token storage
//! - [`CallbackServer`] and [`BrowserNavigator`]: interactive login on a
//!   desktop
//! - [`config`]: configuration from environment and files
//! - [`logging`]: tracing subscriber setup
//!
//! ## Architecture
//! - Implements traits defined in `tenantlink-core`
//! - Contains all "impure" code (network, keychain, filesystem, browser)

pub mod auth;
pub mod config;
mod errors;
pub mod http;
pub mod logging;
pub mod storage;

// Re-export commonly used items
pub use auth::{BrowserNavigator, CallbackServer, CallbackServerError};
pub use http::{ReqwestTransport, ReqwestTransportBuilder};
pub use storage::{FileStorage, KeyringStorage};

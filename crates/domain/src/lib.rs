//! # TenantLink Domain
//!
//! Value types shared by every TenantLink layer.
//!
//! This crate contains:
//! - SDK configuration with mutually exclusive auth modes
//! - Token and OAuth flow state records
//! - The typed error taxonomy and `Result` alias
//! - Persistence keys and identity endpoint constants
//!
//! ## Architecture
//! - No dependencies on other TenantLink crates
//! - Only external dependencies allowed
//! - Pure data, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod flow;
pub mod token;

// Re-export commonly used items
pub use config::{AuthMode, ConfigError, OAuthSettings, RawConfig, SdkConfig, SecretCredentials};
pub use errors::{ErrorInfo, ErrorType, NetworkErrorKind, ParsedErrorInfo, Result, SdkError};
pub use flow::FlowContext;
pub use token::{TokenInfo, TokenKind, TokenResponse};

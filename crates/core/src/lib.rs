//! # TenantLink Core
//!
//! Authentication and request logic, free of infrastructure.
//!
//! This crate contains:
//! - Port interfaces (storage, transport, navigator, clock)
//! - Token lifecycle with single-flight refresh
//! - The OAuth authorization-code + PKCE flow
//! - The tenant-scoped request pipeline and error normalization
//!
//! ## Architecture Principles
//! - Only depends on `tenantlink-common` and `tenantlink-domain`
//! - No HTTP stack, keyring or filesystem code
//! - All external effects go through traits in [`ports`]

pub mod api;
pub mod auth;
pub mod ports;
pub mod sdk;
pub mod telemetry;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use api::{ApiClient, ApiResponse, ErrorParser, RequestBody, RequestOptions};
pub use auth::{AuthService, CallbackOutcome, FlowState, OAuthFlow, TokenManager, TokenState};
pub use ports::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, MemoryStorage, Navigator, Storage,
    TransportError,
};
pub use sdk::{Sdk, SdkBuilder};
pub use telemetry::{Telemetry, TracingTelemetry};

//! Side-effect free building blocks shared across TenantLink crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: PKCE primitives and the wall-clock abstraction
//! - `test-utils`: deterministic clock for tests

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod auth;
#[cfg(feature = "foundation")]
pub mod time;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(feature = "test-utils")]
pub mod testing;

#[cfg(feature = "foundation")]
pub use auth::pkce::{AuthorizationRequest, PkceChallenge};
#[cfg(feature = "foundation")]
pub use time::{Clock, SystemClock};

//! Testing utilities
//!
//! - **[`MockClock`]**: settable wall clock for expiry-sensitive tests

mod clock;

pub use clock::MockClock;

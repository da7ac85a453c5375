//! Wall-clock abstraction.
//!
//! Token expiry is compared against [`Clock::now`] rather than
//! `Utc::now()` directly so that tests can move time forward without
//! sleeping.

mod clock;

pub use clock::{Clock, SystemClock};

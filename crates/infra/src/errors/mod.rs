//! Mapping of third-party errors onto the core port errors

mod conversions;

pub(crate) use conversions::{storage_error, transport_error};

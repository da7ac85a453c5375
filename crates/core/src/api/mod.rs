//! Tenant-scoped API access and error normalization.

pub mod client;
pub mod error_factory;
pub mod error_parser;
pub mod request;

pub use client::ApiClient;
pub use error_factory::{create_error, error_type_for_status};
pub use error_parser::{ErrorBody, ErrorFormat, ErrorParser};
pub use request::{ApiResponse, RequestBody, RequestOptions};

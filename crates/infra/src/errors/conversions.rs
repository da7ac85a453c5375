//! Conversions from reqwest and keyring errors into port errors.

use keyring::Error as KeyringError;
use reqwest::Error as HttpError;
use tenantlink_core::ports::{StorageError, TransportError};

/* -------------------------------------------------------------------------- */
/* reqwest::Error → TransportError */
/* -------------------------------------------------------------------------- */

/// Name the failure class so the core can tell timeouts from other failures.
pub(crate) fn transport_error(err: &HttpError) -> TransportError {
    let name = if err.is_timeout() {
        "TimeoutError"
    } else if err.is_connect() {
        "ConnectError"
    } else if err.is_body() || err.is_decode() {
        "BodyError"
    } else if err.is_builder() {
        "BuilderError"
    } else {
        "RequestError"
    };
    TransportError::new(name, describe_chain(err))
}

/// Display of `err` followed by its sources, `reqwest` keeps the useful part
/// (DNS failure, refused connection) in the source chain.
fn describe_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/* -------------------------------------------------------------------------- */
/* keyring::Error → StorageError */
/* -------------------------------------------------------------------------- */

/// Map a keyring failure for `key`. `NoEntry` is not an error for callers
/// and is handled before reaching this function.
pub(crate) fn storage_error(key: &str, err: KeyringError) -> StorageError {
    match err {
        KeyringError::PlatformFailure(inner) => {
            StorageError::Unavailable(format!("keychain platform error: {inner}"))
        }
        KeyringError::NoStorageAccess(inner) => {
            StorageError::Unavailable(format!("unable to access secure storage: {inner}"))
        }
        KeyringError::BadEncoding(_) => StorageError::AccessFailed {
            key: key.to_string(),
            message: "credential in keychain is not valid UTF-8".into(),
        },
        KeyringError::TooLong(name, limit) => StorageError::AccessFailed {
            key: key.to_string(),
            message: format!("keychain attribute '{name}' exceeds platform limit ({limit})"),
        },
        KeyringError::Ambiguous(entries) => StorageError::AccessFailed {
            key: key.to_string(),
            message: format!("multiple keychain entries matched ({} results)", entries.len()),
        },
        other => StorageError::AccessFailed { key: key.to_string(), message: other.to_string() },
    }
}

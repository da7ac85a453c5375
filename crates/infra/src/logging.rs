//! Tracing subscriber setup for binaries
//!
//! `RUST_LOG` wins when set; otherwise the filter comes from the requested
//! verbosity. Output goes to stderr so command output on stdout stays clean.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Default filter directive for a verbosity count (`-v`, `-vv`, ...).
#[must_use]
pub const fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info,hyper=warn,reqwest=warn",
        2 => "debug,hyper=warn,reqwest=warn",
        _ => "trace",
    }
}

/// Build the filter, preferring `RUST_LOG`.
#[must_use]
pub fn env_filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)))
}

/// Install the global subscriber.
///
/// # Errors
/// Returns `TryInitError` if a global subscriber is already installed
pub fn init(verbosity: u8, format: LogFormat) -> Result<(), TryInitError> {
    let registry = tracing_subscriber::registry().with(env_filter(verbosity));

    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr).with_current_span(false))
            .try_init(),
        LogFormat::Pretty => {
            registry.with(fmt::layer().with_writer(std::io::stderr).with_target(false)).try_init()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_the_default_level() {
        assert_eq!(default_directive(0), "warn");
        assert!(default_directive(1).starts_with("info"));
        assert!(default_directive(2).starts_with("debug"));
        assert_eq!(default_directive(9), "trace");
    }

    #[test]
    fn second_init_fails_without_panicking() {
        let _ = init(0, LogFormat::Pretty);
        assert!(init(0, LogFormat::Json).is_err());
    }
}

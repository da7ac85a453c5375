//! Operation telemetry
//!
//! Public SDK operations run inside [`track`], which times the operation and
//! hands one [`TelemetryEvent`] to the configured [`Telemetry`] sink after it
//! finishes. The sink only observes: it gets the outcome after the fact and
//! cannot alter the value or the error returned to the caller.

use std::future::Future;
use std::time::{Duration, Instant};

use tenantlink_domain::{ErrorType, SdkError};
use tracing::{debug, warn};

/// Result of a tracked operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure { error_type: ErrorType, status_code: Option<u16> },
}

/// One finished operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryEvent {
    /// Operation name, e.g. `"auth.authenticate"`
    pub name: &'static str,
    pub duration: Duration,
    pub outcome: Outcome,
}

/// Telemetry sink owned by one SDK instance.
///
/// Implementations must not panic and must not block for long; they run on
/// the caller's task.
pub trait Telemetry: Send + Sync {
    fn record(&self, event: &TelemetryEvent);

    /// Push out anything buffered. Called from `Sdk::dispose`.
    fn flush(&self) {}
}

/// Emits events as `tracing` records under the `tenantlink::telemetry`
/// target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn record(&self, event: &TelemetryEvent) {
        let duration_ms = u64::try_from(event.duration.as_millis()).unwrap_or(u64::MAX);
        match event.outcome {
            Outcome::Success => {
                debug!(target: "tenantlink::telemetry", event = event.name, duration_ms, "ok");
            }
            Outcome::Failure { error_type, status_code } => {
                warn!(
                    target: "tenantlink::telemetry",
                    event = event.name,
                    duration_ms,
                    error_type = %error_type,
                    status_code,
                    "failed"
                );
            }
        }
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn record(&self, _event: &TelemetryEvent) {}
}

/// Run `operation` and report it to `telemetry` as `name`.
///
/// The operation's result is returned untouched.
pub async fn track<T, F>(
    telemetry: &dyn Telemetry,
    name: &'static str,
    operation: F,
) -> Result<T, SdkError>
where
    F: Future<Output = Result<T, SdkError>>,
{
    let started = Instant::now();
    let result = operation.await;

    let outcome = match &result {
        Ok(_) => Outcome::Success,
        Err(err) => {
            Outcome::Failure { error_type: err.error_type(), status_code: err.status_code() }
        }
    };
    telemetry.record(&TelemetryEvent { name, duration: started.elapsed(), outcome });

    result
}

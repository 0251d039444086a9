//! ## cosim-telemetry::logging
//! **Structured logging with tracing and OpenTelemetry attributes**
//!
//! `RUST_LOG` wins over the configured filter. Thread names are always
//! printed, since worker-pool runs interleave `cosim-worker-*` output.

use opentelemetry::KeyValue;
use tracing::info_span;
use tracing_subscriber::{fmt, EnvFilter};

pub type InitError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the global subscriber. Fails if one is already installed.
    pub fn init(filter: &str) -> Result<(), InitError> {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(filter))?;
        fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .try_init()
    }

    /// Logs a run lifecycle event with OpenTelemetry style attributes.
    #[inline]
    pub fn log_event(event_type: &str, metadata: Vec<KeyValue>) {
        let span = info_span!(
            "federation_event",
            event_type = event_type,
            otel.kind = "INTERNAL"
        );
        span.in_scope(|| {
            tracing::info!(metadata = ?metadata, "Federation event occurred");
        });
    }
}

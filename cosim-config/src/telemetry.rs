//! Observability configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation;

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// `tracing-subscriber` filter directives. `RUST_LOG` takes precedence.
    #[serde(default = "default_log_filter")]
    #[validate(custom(function = validation::validate_log_filter))]
    pub log_filter: String,

    /// Emit per-activity lines on the `cosim::activity` target.
    #[serde(default)]
    pub activity_log: bool,

    /// Record prometheus metrics during the run.
    #[serde(default = "default_true")]
    pub metrics: bool,
}

fn default_log_filter() -> String {
    "info".into()
}

fn default_true() -> bool {
    true
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            activity_log: false,
            metrics: default_true(),
        }
    }
}

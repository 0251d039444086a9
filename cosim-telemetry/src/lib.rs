//! # Cosim Telemetry
//!
//! Logging setup and [`Monitor`](cosim_core::monitor::Monitor) sinks for the
//! co-simulation kernel: prometheus metrics and a line-oriented activity log.

pub mod activity;
pub mod fanout;
pub mod logging;
pub mod metrics;

pub use activity::{ActivityMonitor, ActivityStatistics};
pub use fanout::MonitorFanout;
pub use logging::EventLogger;
pub use metrics::MetricsRecorder;

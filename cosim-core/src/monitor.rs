//! Observability sink consumed by the kernel.
//!
//! Every hook defaults to a no-op, so sinks implement only what they need.
//! Notifications are best-effort: [`notify`] contains a panicking sink so it
//! can never abort a run.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use tracing::warn;

use crate::federate::FederateId;
use crate::interaction::Interaction;
use crate::request::TimedRequest;

pub trait Monitor: Send + Sync {
    fn on_begin_simulation(&self, _num_threads: usize) {}

    fn on_end_simulation(&self, _duration: Duration, _status_code: i32) {}

    fn on_begin_activity(&self, _request: &TimedRequest) {}

    fn on_end_activity(&self, _request: &TimedRequest, _duration: Duration) {}

    fn on_interaction(&self, _interaction: &Interaction) {}

    fn on_receive_interaction(&self, _receiver: &FederateId, _interaction: &Interaction) {}

    fn on_process_interaction(&self, _federate: &FederateId, _interaction: &Interaction) {}

    fn on_scheduling(&self, _block_id: u64, _request: &TimedRequest) {}
}

/// Sink that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMonitor;

impl Monitor for NoopMonitor {}

/// Runs a sink callback, logging instead of propagating a panic.
pub fn notify<F>(hook: &'static str, f: F)
where
    F: FnOnce(),
{
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        warn!(hook, "Monitor panicked; notification dropped");
    }
}

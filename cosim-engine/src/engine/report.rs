//! Run summary and the dispatch trace digest.

use std::fmt;
use std::time::Duration;

use cosim_core::request::TimedRequest;
use cosim_core::time::{format_seconds, SimTime};

/// Completed dispatches, hashed in completion order.
#[derive(Default)]
pub(crate) struct DispatchTrace {
    hasher: blake3::Hasher,
    pub dispatched: u64,
    pub wavefronts: u64,
}

impl DispatchTrace {
    pub(crate) fn record(&mut self, request: &TimedRequest) {
        self.hasher.update(request.federate_id().as_str().as_bytes());
        self.hasher.update(&[0]);
        self.hasher.update(&request.requested_time().to_le_bytes());
        self.dispatched += 1;
    }

    pub(crate) fn digest(&self) -> String {
        hex::encode(self.hasher.finalize().as_bytes())
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub federation_id: String,
    pub strategy: &'static str,
    pub end_time: SimTime,
    /// Clock value when the run started draining.
    pub final_time: SimTime,
    pub wavefronts: u64,
    pub dispatched: u64,
    pub interactions_published: u64,
    pub interactions_delivered: u64,
    pub wall_time: Duration,
    /// BLAKE3 over `(federate id, time)` of every completed dispatch. Equal
    /// digests mean equal dispatch sequences.
    pub trace_digest: String,
    pub status_code: i32,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "federation:    {}", self.federation_id)?;
        writeln!(f, "strategy:      {}", self.strategy)?;
        writeln!(
            f,
            "simulated:     {} of {}",
            format_seconds(self.final_time),
            format_seconds(self.end_time)
        )?;
        writeln!(f, "wavefronts:    {}", self.wavefronts)?;
        writeln!(f, "dispatched:    {}", self.dispatched)?;
        writeln!(
            f,
            "interactions:  {} published, {} delivered",
            self.interactions_published, self.interactions_delivered
        )?;
        writeln!(f, "wall time:     {:?}", self.wall_time)?;
        writeln!(f, "trace digest:  {}", self.trace_digest)?;
        write!(f, "status code:   {}", self.status_code)
    }
}

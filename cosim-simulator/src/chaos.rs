//! Chaos module.
//!
//! Fault injection for scripted federates: a federate can fail, hang or
//! panic when it is advanced to a chosen time.

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use cosim_core::federate::FederateId;
use cosim_core::time::SimTime;
use cosim_core::FederateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// `advance_time` returns a [`FederateError`].
    Fail,
    /// `advance_time` blocks for `hang_ms` before continuing normally.
    Hang,
    /// `advance_time` panics.
    Panic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultSpec {
    pub at_ns: SimTime,
    pub kind: FaultKind,
    #[serde(default)]
    pub hang_ms: u64,
}

/// Injects `fault` into a federate being advanced to `time`.
pub fn inject_fault(
    federate: &FederateId,
    time: SimTime,
    fault: &FaultSpec,
) -> Result<(), FederateError> {
    warn!("Injecting {:?} into federate '{federate}' at {time}", fault.kind);
    match fault.kind {
        FaultKind::Fail => Err(FederateError::new(
            federate.clone(),
            format!("injected failure at {time}"),
        )),
        FaultKind::Hang => {
            thread::sleep(Duration::from_millis(fault.hang_ms));
            Ok(())
        }
        FaultKind::Panic => panic!("injected panic in federate '{federate}' at {time}"),
    }
}

//! Global, ordered record of every kernel-to-federate call.

use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use cosim_core::federate::FederateId;
use cosim_core::time::SimTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Initialize { start: SimTime, end: SimTime },
    AdvanceTime(SimTime),
    ReceiveInteraction { type_id: String, time: SimTime },
    ProcessInteraction { type_id: String, time: SimTime },
    FinishSimulation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub federate: FederateId,
    pub call: Call,
    /// Name of the calling thread, if it has one.
    pub thread: Option<String>,
}

/// Shared between all scripted federates of a scenario.
#[derive(Debug, Default)]
pub struct CallLog {
    records: Mutex<Vec<CallRecord>>,
}

impl CallLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, federate: &FederateId, call: Call) {
        let thread = thread::current().name().map(str::to_string);
        self.records.lock().push(CallRecord {
            federate: federate.clone(),
            call,
            thread,
        });
    }

    pub fn records(&self) -> Vec<CallRecord> {
        self.records.lock().clone()
    }

    /// `(federate, call)` pairs in call order.
    pub fn calls(&self) -> Vec<(String, Call)> {
        self.records
            .lock()
            .iter()
            .map(|r| (r.federate.to_string(), r.call.clone()))
            .collect()
    }

    pub fn calls_of(&self, federate: &str) -> Vec<Call> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.federate.as_str() == federate)
            .map(|r| r.call.clone())
            .collect()
    }

    /// Every `advance_time` call as `(federate, time)`, in call order.
    pub fn advances(&self) -> Vec<(String, SimTime)> {
        self.records
            .lock()
            .iter()
            .filter_map(|r| match r.call {
                Call::AdvanceTime(time) => Some((r.federate.to_string(), time)),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! In-memory [`Monitor`] for assertions on kernel notifications.

use std::time::Duration;

use parking_lot::Mutex;

use cosim_core::federate::FederateId;
use cosim_core::interaction::Interaction;
use cosim_core::monitor::Monitor;
use cosim_core::request::TimedRequest;
use cosim_core::time::SimTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    BeginSimulation { threads: usize },
    EndSimulation { status_code: i32 },
    BeginActivity { federate: String, time: SimTime },
    EndActivity { federate: String, time: SimTime },
    Interaction { type_id: String, time: SimTime },
    Receive { federate: String, type_id: String },
    Process { federate: String, type_id: String },
    Scheduling { block_id: u64, federate: String },
}

#[derive(Debug, Default)]
pub struct RecordingMonitor {
    events: Mutex<Vec<MonitorEvent>>,
}

impl RecordingMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MonitorEvent> {
        self.events.lock().clone()
    }

    /// Status code of the last `on_end_simulation`, if any.
    pub fn status_code(&self) -> Option<i32> {
        self.events.lock().iter().rev().find_map(|event| match event {
            MonitorEvent::EndSimulation { status_code } => Some(*status_code),
            _ => None,
        })
    }

    /// `(block id, federate)` of every scheduled parallel batch member.
    pub fn scheduling(&self) -> Vec<(u64, String)> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                MonitorEvent::Scheduling { block_id, federate } => Some((*block_id, federate.clone())),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: MonitorEvent) {
        self.events.lock().push(event);
    }
}

impl Monitor for RecordingMonitor {
    fn on_begin_simulation(&self, num_threads: usize) {
        self.push(MonitorEvent::BeginSimulation {
            threads: num_threads,
        });
    }

    fn on_end_simulation(&self, _duration: Duration, status_code: i32) {
        self.push(MonitorEvent::EndSimulation { status_code });
    }

    fn on_begin_activity(&self, request: &TimedRequest) {
        self.push(MonitorEvent::BeginActivity {
            federate: request.federate_id().to_string(),
            time: request.requested_time(),
        });
    }

    fn on_end_activity(&self, request: &TimedRequest, _duration: Duration) {
        self.push(MonitorEvent::EndActivity {
            federate: request.federate_id().to_string(),
            time: request.requested_time(),
        });
    }

    fn on_interaction(&self, interaction: &Interaction) {
        self.push(MonitorEvent::Interaction {
            type_id: interaction.type_id().to_string(),
            time: interaction.time(),
        });
    }

    fn on_receive_interaction(&self, receiver: &FederateId, interaction: &Interaction) {
        self.push(MonitorEvent::Receive {
            federate: receiver.to_string(),
            type_id: interaction.type_id().to_string(),
        });
    }

    fn on_process_interaction(&self, federate: &FederateId, interaction: &Interaction) {
        self.push(MonitorEvent::Process {
            federate: federate.to_string(),
            type_id: interaction.type_id().to_string(),
        });
    }

    fn on_scheduling(&self, block_id: u64, request: &TimedRequest) {
        self.push(MonitorEvent::Scheduling {
            block_id,
            federate: request.federate_id().to_string(),
        });
    }
}

//! Forwards every notification to several sinks, in order.

use std::sync::Arc;
use std::time::Duration;

use cosim_core::federate::FederateId;
use cosim_core::interaction::Interaction;
use cosim_core::monitor::Monitor;
use cosim_core::request::TimedRequest;

#[derive(Default, Clone)]
pub struct MonitorFanout {
    sinks: Vec<Arc<dyn Monitor>>,
}

impl MonitorFanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn Monitor>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl Monitor for MonitorFanout {
    fn on_begin_simulation(&self, num_threads: usize) {
        self.sinks.iter().for_each(|s| s.on_begin_simulation(num_threads));
    }

    fn on_end_simulation(&self, duration: Duration, status_code: i32) {
        self.sinks
            .iter()
            .for_each(|s| s.on_end_simulation(duration, status_code));
    }

    fn on_begin_activity(&self, request: &TimedRequest) {
        self.sinks.iter().for_each(|s| s.on_begin_activity(request));
    }

    fn on_end_activity(&self, request: &TimedRequest, duration: Duration) {
        self.sinks
            .iter()
            .for_each(|s| s.on_end_activity(request, duration));
    }

    fn on_interaction(&self, interaction: &Interaction) {
        self.sinks.iter().for_each(|s| s.on_interaction(interaction));
    }

    fn on_receive_interaction(&self, receiver: &FederateId, interaction: &Interaction) {
        self.sinks
            .iter()
            .for_each(|s| s.on_receive_interaction(receiver, interaction));
    }

    fn on_process_interaction(&self, federate: &FederateId, interaction: &Interaction) {
        self.sinks
            .iter()
            .for_each(|s| s.on_process_interaction(federate, interaction));
    }

    fn on_scheduling(&self, block_id: u64, request: &TimedRequest) {
        self.sinks
            .iter()
            .for_each(|s| s.on_scheduling(block_id, request));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MetricsRecorder;

    #[test]
    fn every_sink_sees_every_notification() {
        let first = Arc::new(MetricsRecorder::new().unwrap());
        let second = Arc::new(MetricsRecorder::new().unwrap());
        let fanout = MonitorFanout::new().with(first.clone()).with(second.clone());
        assert_eq!(fanout.len(), 2);

        fanout.on_interaction(&Interaction::signal("Ping", 1));
        assert_eq!(first.interactions_published.get(), 1);
        assert_eq!(second.interactions_published.get(), 1);
    }
}

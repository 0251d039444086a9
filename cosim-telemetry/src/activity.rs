//! ## cosim-telemetry::activity
//! **Line-oriented activity log**
//!
//! [`ActivityMonitor`] writes one `;`-separated line per kernel notification
//! to the `cosim::activity` target:
//!
//! ```text
//! SIM;<time>;<federation>;<strategy threads>      begin / end of the run
//! FED;<federate>;<constrained>;<regulating>        one per joined federate
//! EVT;<time>;<federate>;id=<seq>                   advance granted
//! EVT;<time>;<federate>;D:<micros>;id=<seq>        advance finished
//! MSG;<time>;<type>;FROM|TO|AT <federate>;id=<id>  publication, delivery, processing
//! PRL;<block>;<seq>;<federate>;<time>;<lookahead>  parallel batch member
//! ```
//!
//! A statistics summary follows the final `SIM` line.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::info;

use cosim_core::federate::FederateId;
use cosim_core::federation::FederationDirectory;
use cosim_core::interaction::Interaction;
use cosim_core::monitor::Monitor;
use cosim_core::request::TimedRequest;
use cosim_core::time::SimTime;

const TARGET: &str = "cosim::activity";

/// Aggregates collected over a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityStatistics {
    /// Published interactions per type id.
    pub interactions: BTreeMap<String, u64>,
    /// `(advances, mean duration)` per federate.
    pub activities: BTreeMap<String, (u64, Duration)>,
    pub min_event_distance: Option<SimTime>,
    pub max_event_distance: Option<SimTime>,
    pub avg_event_distance: Option<f64>,
}

#[derive(Default)]
struct Collected {
    interactions: BTreeMap<String, u64>,
    durations: BTreeMap<String, (u64, Duration)>,
    finished_at: Vec<SimTime>,
}

pub struct ActivityMonitor {
    directory: Arc<dyn FederationDirectory>,
    end_time: SimTime,
    collected: Mutex<Collected>,
}

impl ActivityMonitor {
    pub fn new(directory: Arc<dyn FederationDirectory>, end_time: SimTime) -> Self {
        Self {
            directory,
            end_time,
            collected: Mutex::new(Collected::default()),
        }
    }

    pub fn statistics(&self) -> ActivityStatistics {
        let collected = self.collected.lock();

        let distances: Vec<SimTime> = collected
            .finished_at
            .windows(2)
            .map(|pair| pair[1].saturating_sub(pair[0]))
            .collect();
        let avg_event_distance = (!distances.is_empty())
            .then(|| distances.iter().sum::<SimTime>() as f64 / distances.len() as f64);

        ActivityStatistics {
            interactions: collected.interactions.clone(),
            activities: collected
                .durations
                .iter()
                .map(|(federate, (count, total))| {
                    let mean = total.checked_div(*count as u32).unwrap_or_default();
                    (federate.clone(), (*count, mean))
                })
                .collect(),
            min_event_distance: distances.iter().min().copied(),
            max_event_distance: distances.iter().max().copied(),
            avg_event_distance,
        }
    }

    fn log_statistics(&self) {
        let stats = self.statistics();
        info!(target: TARGET, "Simulation ended. Statistics:");
        info!(target: TARGET, "Federate;avgEventDuration;FederateEvents");
        for (federate, (count, mean)) in &stats.activities {
            info!(target: TARGET, "{federate};{};{count}", mean.as_micros());
        }
        if let (Some(min), Some(max), Some(avg)) = (
            stats.min_event_distance,
            stats.max_event_distance,
            stats.avg_event_distance,
        ) {
            info!(target: TARGET, "Minimum event distance: {min}");
            info!(target: TARGET, "Maximum event distance: {max}");
            info!(target: TARGET, "Average event distance: {avg:.1}");
        }
        info!(target: TARGET, "MessageType;MessageCount");
        for (type_id, count) in &stats.interactions {
            info!(target: TARGET, "{type_id};{count}");
        }
    }
}

impl Monitor for ActivityMonitor {
    fn on_begin_simulation(&self, num_threads: usize) {
        info!(target: TARGET, "SIM;0;{};{num_threads}", self.directory.federation_id());
        for federate in self.directory.ambassadors() {
            info!(
                target: TARGET,
                "FED;{};{};{}",
                federate.id(),
                federate.is_time_constrained(),
                federate.is_time_regulating()
            );
        }
    }

    fn on_end_simulation(&self, duration: Duration, status_code: i32) {
        info!(
            target: TARGET,
            "SIM;{};{};D:{};status={status_code}",
            self.end_time,
            self.directory.federation_id(),
            duration.as_millis()
        );
        self.log_statistics();
    }

    fn on_begin_activity(&self, request: &TimedRequest) {
        info!(
            target: TARGET,
            "EVT;{};{};id={}",
            request.requested_time(),
            request.federate_id(),
            request.sequence_id()
        );
    }

    fn on_end_activity(&self, request: &TimedRequest, duration: Duration) {
        {
            let mut collected = self.collected.lock();
            collected.finished_at.push(request.requested_time());
            let entry = collected
                .durations
                .entry(request.federate_id().to_string())
                .or_default();
            entry.0 += 1;
            entry.1 += duration;
        }
        info!(
            target: TARGET,
            "EVT;{};{};D:{};id={}",
            request.requested_time(),
            request.federate_id(),
            duration.as_micros(),
            request.sequence_id()
        );
    }

    fn on_interaction(&self, interaction: &Interaction) {
        *self
            .collected
            .lock()
            .interactions
            .entry(interaction.type_id().to_string())
            .or_default() += 1;
        let sender = interaction.sender_id().map_or("-", FederateId::as_str);
        info!(
            target: TARGET,
            "MSG;{};{};FROM {sender};id={}",
            interaction.time(),
            interaction.type_id(),
            interaction.id()
        );
    }

    fn on_receive_interaction(&self, receiver: &FederateId, interaction: &Interaction) {
        info!(
            target: TARGET,
            "MSG;{};{};TO {receiver};id={}",
            interaction.time(),
            interaction.type_id(),
            interaction.id()
        );
    }

    fn on_process_interaction(&self, federate: &FederateId, interaction: &Interaction) {
        info!(
            target: TARGET,
            "MSG;{};{};AT {federate};id={}",
            interaction.time(),
            interaction.type_id(),
            interaction.id()
        );
    }

    fn on_scheduling(&self, block_id: u64, request: &TimedRequest) {
        info!(
            target: TARGET,
            "PRL;{block_id};{};{};{};{}",
            request.sequence_id(),
            request.federate_id(),
            request.requested_time(),
            request.lookahead()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosim_core::federation::LocalFederation;
    use cosim_core::priority::Priority;
    use tracing_test::traced_test;

    fn monitor() -> ActivityMonitor {
        ActivityMonitor::new(Arc::new(LocalFederation::new("highway")), 100)
    }

    fn finish(monitor: &ActivityMonitor, federate: &str, time: SimTime, micros: u64) {
        let request = TimedRequest::new(FederateId::from(federate), time, 0, Priority::DEFAULT);
        monitor.on_begin_activity(&request);
        monitor.on_end_activity(&request, Duration::from_micros(micros));
    }

    #[test]
    fn collects_durations_and_event_distances() {
        let monitor = monitor();
        finish(&monitor, "sumo", 0, 10);
        finish(&monitor, "ns3", 0, 30);
        finish(&monitor, "sumo", 40, 30);
        finish(&monitor, "sumo", 100, 20);

        let stats = monitor.statistics();
        assert_eq!(stats.activities["sumo"], (3, Duration::from_micros(20)));
        assert_eq!(stats.activities["ns3"], (1, Duration::from_micros(30)));
        assert_eq!(stats.min_event_distance, Some(0));
        assert_eq!(stats.max_event_distance, Some(60));
        assert_eq!(stats.avg_event_distance, Some(100.0 / 3.0));
    }

    #[test]
    fn counts_interactions_by_type() {
        let monitor = monitor();
        monitor.on_interaction(&Interaction::signal("V2xMessage", 5));
        monitor.on_interaction(&Interaction::signal("V2xMessage", 6));
        monitor.on_interaction(&Interaction::signal("VehicleUpdates", 6));

        let stats = monitor.statistics();
        assert_eq!(stats.interactions["V2xMessage"], 2);
        assert_eq!(stats.interactions["VehicleUpdates"], 1);
        assert_eq!(stats.avg_event_distance, None);
    }

    #[traced_test]
    #[test]
    fn writes_activity_lines() {
        let monitor = monitor();
        monitor.on_begin_simulation(4);
        finish(&monitor, "sumo", 25, 7);
        let ping = Interaction::signal("Ping", 30)
            .with_sender("sumo")
            .unwrap();
        monitor.on_receive_interaction(&FederateId::from("ns3"), &ping);
        monitor.on_interaction(&ping);
        monitor.on_end_simulation(Duration::from_millis(12), 101);

        assert!(logs_contain("SIM;0;highway;4"));
        assert!(logs_contain("EVT;25;sumo;D:7;"));
        assert!(logs_contain("MSG;30;Ping;FROM sumo;"));
        assert!(logs_contain("MSG;30;Ping;TO ns3;"));
        assert!(logs_contain("SIM;100;highway;D:12;status=101"));
        assert!(logs_contain("Ping;1"));
    }
}

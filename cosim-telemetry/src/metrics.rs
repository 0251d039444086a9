//! ## cosim-telemetry::metrics
//! **Prometheus metrics for a simulation run**
//!
//! [`MetricsRecorder`] is a [`Monitor`]: install it as (part of) the engine's
//! sink and scrape [`MetricsRecorder::gather_metrics`] when the run is over.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry};

use cosim_core::federate::FederateId;
use cosim_core::interaction::Interaction;
use cosim_core::monitor::Monitor;
use cosim_core::request::TimedRequest;
use cosim_core::time::SimTime;

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub wavefronts: IntCounter,
    pub dispatched_requests: IntCounter,
    pub interactions_published: IntCounter,
    pub interactions_delivered: IntCounter,
    pub simulation_time: IntGauge,
    pub activity_duration: Histogram,
    last_time: Arc<Mutex<Option<SimTime>>>,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let wavefronts = IntCounter::new(
            "cosim_wavefronts_total",
            "Distinct simulation times at which federates were advanced",
        )?;
        let dispatched_requests = IntCounter::new(
            "cosim_dispatched_requests_total",
            "Time advances granted to federates",
        )?;
        let interactions_published = IntCounter::new(
            "cosim_interactions_published_total",
            "Interactions published into the federation",
        )?;
        let interactions_delivered = IntCounter::new(
            "cosim_interactions_delivered_total",
            "Interactions handed to subscribed federates",
        )?;
        let simulation_time = IntGauge::new(
            "cosim_simulation_time_ns",
            "Simulation time of the latest granted advance",
        )?;
        let activity_duration = Histogram::with_opts(
            HistogramOpts::new(
                "cosim_activity_duration_ns",
                "Wall-clock time federates spent in advance_time",
            )
            .buckets(vec![
                1_000.0,
                10_000.0,
                100_000.0,
                1_000_000.0,
                10_000_000.0,
                100_000_000.0,
                1_000_000_000.0,
            ]),
        )?;

        registry.register(Box::new(wavefronts.clone()))?;
        registry.register(Box::new(dispatched_requests.clone()))?;
        registry.register(Box::new(interactions_published.clone()))?;
        registry.register(Box::new(interactions_delivered.clone()))?;
        registry.register(Box::new(simulation_time.clone()))?;
        registry.register(Box::new(activity_duration.clone()))?;

        Ok(Self {
            registry,
            wavefronts,
            dispatched_requests,
            interactions_published,
            interactions_delivered,
            simulation_time,
            activity_duration,
            last_time: Default::default(),
        })
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
    }
}

impl Monitor for MetricsRecorder {
    fn on_begin_activity(&self, request: &TimedRequest) {
        let time = request.requested_time();
        let mut last = self.last_time.lock();
        if *last != Some(time) {
            *last = Some(time);
            self.wavefronts.inc();
            self.simulation_time
                .set(i64::try_from(time).unwrap_or(i64::MAX));
        }
    }

    fn on_end_activity(&self, _request: &TimedRequest, duration: Duration) {
        self.dispatched_requests.inc();
        self.activity_duration.observe(duration.as_nanos() as f64);
    }

    fn on_interaction(&self, _interaction: &Interaction) {
        self.interactions_published.inc();
    }

    fn on_receive_interaction(&self, _receiver: &FederateId, _interaction: &Interaction) {
        self.interactions_delivered.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosim_core::priority::Priority;

    fn request(federate: &str, time: SimTime) -> TimedRequest {
        TimedRequest::new(FederateId::from(federate), time, 0, Priority::DEFAULT)
    }

    #[test]
    fn counts_wavefronts_by_time_change() {
        let metrics = MetricsRecorder::new().unwrap();
        for (federate, time) in [("a", 0), ("b", 0), ("a", 10), ("b", 20)] {
            let request = request(federate, time);
            metrics.on_begin_activity(&request);
            metrics.on_end_activity(&request, Duration::from_micros(5));
        }
        assert_eq!(metrics.wavefronts.get(), 3);
        assert_eq!(metrics.dispatched_requests.get(), 4);
        assert_eq!(metrics.simulation_time.get(), 20);
        assert_eq!(metrics.activity_duration.get_sample_count(), 4);
    }

    #[test]
    fn exports_text_format() {
        let metrics = MetricsRecorder::new().unwrap();
        let ping = Interaction::signal("Ping", 5);
        metrics.on_interaction(&ping);
        metrics.on_receive_interaction(&FederateId::from("a"), &ping);
        metrics.on_receive_interaction(&FederateId::from("b"), &ping);

        let text = metrics.gather_metrics().unwrap();
        assert!(text.contains("cosim_interactions_published_total 1"));
        assert!(text.contains("cosim_interactions_delivered_total 2"));
        assert!(text.contains("# TYPE cosim_activity_duration_ns histogram"));
    }
}

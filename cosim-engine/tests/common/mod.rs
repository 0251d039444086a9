#![allow(dead_code)]

use std::sync::Arc;

use cosim_core::federation::LocalFederation;
use cosim_engine::{Engine, EngineParams};
use cosim_simulator::{CallLog, FederateScript, RecordingMonitor, Scenario};

pub struct Harness {
    pub engine: Engine,
    pub log: Arc<CallLog>,
    pub monitor: Arc<RecordingMonitor>,
    pub federation: Arc<LocalFederation>,
}

pub fn harness(scripts: Vec<FederateScript>, params: EngineParams) -> Harness {
    let log = CallLog::new();
    let scenario = Scenario {
        federation_id: "test".into(),
        end_time_ns: Some(params.end_time),
        federates: scripts,
    };
    let federation = Arc::new(scenario.build(&log).expect("scenario builds"));
    let monitor = Arc::new(RecordingMonitor::new());
    let engine = Engine::new(federation.clone(), monitor.clone(), params).expect("engine");
    Harness {
        engine,
        log,
        monitor,
        federation,
    }
}

/// `advance_time` calls as sorted `(federate, time)` pairs.
pub fn advance_set(log: &CallLog) -> Vec<(String, u64)> {
    let mut advances = log.advances();
    advances.sort();
    advances
}

pub fn pool(end_time: u64, threads: usize) -> EngineParams {
    let threads = std::num::NonZeroUsize::new(threads).expect("at least one worker");
    EngineParams::worker_pool(end_time, threads)
}

mod common;

use std::sync::Arc;

use parking_lot::Mutex;

use cosim_core::federate::{FederateHandle, FederateId, RtiAmbassador};
use cosim_core::federation::LocalFederation;
use cosim_core::interaction::Interaction;
use cosim_core::priority::Priority;
use cosim_core::time::{SimTime, MILLI_SECOND, SECOND};
use cosim_core::{FederateError, RtiError, STATUS_CODE_ABORTED, STATUS_CODE_SUCCESS};
use cosim_engine::{Engine, EngineParams, EngineState};
use cosim_simulator::{Call, FaultKind, FederateScript, MonitorEvent, RecordingMonitor};

use common::harness;

#[test]
fn two_federates_follow_time_then_priority() {
    let t1 = 4 * SECOND + 132 * MILLI_SECOND;
    let t2 = 10 * SECOND;
    let h = harness(
        vec![
            FederateScript::new("a").with_priority(1).with_steps([0, t2]),
            FederateScript::new("b").with_priority(2).with_steps([t1, t2]),
        ],
        EngineParams::sequential(t2),
    );

    let report = h.engine.run_simulation().unwrap();

    let calls: Vec<_> = h
        .log
        .calls()
        .into_iter()
        .filter(|(_, call)| !matches!(call, Call::Initialize { .. }))
        .collect();
    assert_eq!(
        calls,
        vec![
            ("a".to_string(), Call::AdvanceTime(0)),
            ("b".to_string(), Call::AdvanceTime(t1)),
            ("a".to_string(), Call::AdvanceTime(t2)),
            ("b".to_string(), Call::AdvanceTime(t2)),
            ("a".to_string(), Call::FinishSimulation),
            ("b".to_string(), Call::FinishSimulation),
        ]
    );
    assert_eq!(report.final_time, t2);
    assert_eq!(report.wavefronts, 3);
    assert_eq!(report.dispatched, 4);
    assert_eq!(report.status_code, STATUS_CODE_SUCCESS);
    assert_eq!(h.engine.state(), EngineState::Terminated);
    assert_eq!(h.monitor.status_code(), Some(STATUS_CODE_SUCCESS));
}

#[test]
fn initialize_runs_in_join_order_with_end_time() {
    let h = harness(
        vec![FederateScript::new("x"), FederateScript::new("y")],
        EngineParams::sequential(500),
    );
    h.engine.run_simulation().unwrap();
    assert_eq!(
        h.log.calls(),
        vec![
            ("x".to_string(), Call::Initialize { start: 0, end: 500 }),
            ("y".to_string(), Call::Initialize { start: 0, end: 500 }),
            ("x".to_string(), Call::FinishSimulation),
            ("y".to_string(), Call::FinishSimulation),
        ]
    );
}

#[test]
fn clock_stops_where_pending_empties() {
    let h = harness(
        vec![FederateScript::new("a").with_steps([10, 20])],
        EngineParams::sequential(1_000),
    );
    let report = h.engine.run_simulation().unwrap();
    assert_eq!(report.final_time, 20);
    assert_eq!(h.engine.now(), 20);
}

#[test]
fn clock_moves_to_end_time_when_requests_exceed_it() {
    let h = harness(
        vec![FederateScript::new("a").with_steps([10, 5_000])],
        EngineParams::sequential(1_000),
    );
    let report = h.engine.run_simulation().unwrap();
    assert_eq!(report.final_time, 1_000);
    assert_eq!(h.log.advances(), vec![("a".to_string(), 10)]);
    assert_eq!(h.engine.next_event_time(), None);
}

#[test]
fn clock_never_decreases() {
    let h = harness(
        vec![
            FederateScript::new("a").with_steps([0, 30, 60, 90]),
            FederateScript::new("b").with_steps([15, 30, 45, 100]),
            FederateScript::new("c").with_steps([5, 95]),
        ],
        EngineParams::sequential(100),
    );
    let report = h.engine.run_simulation().unwrap();
    let times: Vec<_> = h
        .monitor
        .events()
        .into_iter()
        .filter_map(|event| match event {
            MonitorEvent::BeginActivity { time, .. } => Some(time),
            _ => None,
        })
        .collect();
    assert!(times.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(report.final_time, 100);
}

#[test]
fn duplicate_request_aborts_the_run() {
    let h = harness(
        vec![FederateScript::new("a"), FederateScript::new("b").with_steps([50])],
        EngineParams::sequential(1_000),
    );
    let a = FederateId::from("a");
    h.engine.request_advance_time(&a, 100, 0, Priority::DEFAULT).unwrap();
    let err = h
        .engine
        .request_advance_time(&a, 200, 0, Priority::DEFAULT)
        .unwrap_err();
    assert!(matches!(err, RtiError::DuplicateRequest { .. }));

    let err = h.engine.run_simulation().unwrap_err();
    assert!(matches!(
        err,
        RtiError::DuplicateRequest {
            requested: 200,
            outstanding: 100,
            ..
        }
    ));
    assert_eq!(h.engine.state(), EngineState::Aborted);
    assert!(h.log.advances().is_empty());
    assert_eq!(h.monitor.status_code(), Some(STATUS_CODE_ABORTED));
    for federate in ["a", "b"] {
        assert_eq!(
            h.log.calls_of(federate).last(),
            Some(&Call::FinishSimulation),
            "{federate} is finished after the abort"
        );
    }
}

#[test]
fn identical_request_is_accepted_once() {
    let h = harness(vec![FederateScript::new("a")], EngineParams::sequential(1_000));
    let a = FederateId::from("a");
    h.engine.request_advance_time(&a, 100, 0, Priority::DEFAULT).unwrap();
    h.engine.request_advance_time(&a, 100, 0, Priority::DEFAULT).unwrap();
    assert_eq!(h.engine.next_event_time(), Some(100));
    let report = h.engine.run_simulation().unwrap();
    assert_eq!(report.dispatched, 1);
}

/// Requests a second, different advance while its first is outstanding.
struct Greedy {
    id: FederateId,
}

impl FederateHandle for Greedy {
    fn id(&self) -> &FederateId {
        &self.id
    }
    fn priority(&self) -> Priority {
        Priority::DEFAULT
    }
    fn is_time_constrained(&self) -> bool {
        true
    }
    fn is_time_regulating(&self) -> bool {
        true
    }
    fn initialize(&self, _: SimTime, _: SimTime, rti: &dyn RtiAmbassador) -> Result<(), FederateError> {
        rti.request_advance_time(0, 0, Priority::DEFAULT)
            .map_err(|err| FederateError::new(self.id.clone(), "request").with_source(err))
    }
    fn advance_time(&self, time: SimTime, rti: &dyn RtiAmbassador) -> Result<(), FederateError> {
        let _ = rti.request_advance_time(time + 10, 0, Priority::DEFAULT);
        let _ = rti.request_advance_time(time + 20, 0, Priority::DEFAULT);
        Ok(())
    }
    fn receive_interaction(&self, _: &Interaction, _: &dyn RtiAmbassador) -> Result<(), FederateError> {
        Ok(())
    }
    fn finish_simulation(&self) -> Result<(), FederateError> {
        Ok(())
    }
}

#[test]
fn duplicate_request_during_run_aborts() {
    let federation = LocalFederation::new("greedy");
    federation
        .join(Arc::new(Greedy {
            id: FederateId::from("greedy"),
        }))
        .unwrap();
    let monitor = Arc::new(RecordingMonitor::new());
    let engine = Engine::new(Arc::new(federation), monitor.clone(), EngineParams::sequential(1_000)).unwrap();

    let err = engine.run_simulation().unwrap_err();
    assert!(matches!(
        err,
        RtiError::DuplicateRequest {
            requested: 20,
            outstanding: 10,
            ..
        }
    ));
    assert_eq!(engine.now(), 0);
    assert_eq!(monitor.status_code(), Some(STATUS_CODE_ABORTED));
}

/// Asks for a time in the past once, then continues normally.
struct Backwards {
    id: FederateId,
    rejected: Mutex<Option<RtiError>>,
}

impl FederateHandle for Backwards {
    fn id(&self) -> &FederateId {
        &self.id
    }
    fn priority(&self) -> Priority {
        Priority::DEFAULT
    }
    fn is_time_constrained(&self) -> bool {
        true
    }
    fn is_time_regulating(&self) -> bool {
        true
    }
    fn initialize(&self, _: SimTime, _: SimTime, rti: &dyn RtiAmbassador) -> Result<(), FederateError> {
        rti.request_advance_time(50, 0, Priority::DEFAULT)
            .map_err(|err| FederateError::new(self.id.clone(), "request").with_source(err))
    }
    fn advance_time(&self, time: SimTime, rti: &dyn RtiAmbassador) -> Result<(), FederateError> {
        if time == 50 {
            *self.rejected.lock() = rti.request_advance_time(10, 0, Priority::DEFAULT).err();
            rti.request_advance_time(60, 0, Priority::DEFAULT)
                .map_err(|err| FederateError::new(self.id.clone(), "request").with_source(err))?;
        }
        Ok(())
    }
    fn receive_interaction(&self, _: &Interaction, _: &dyn RtiAmbassador) -> Result<(), FederateError> {
        Ok(())
    }
    fn finish_simulation(&self) -> Result<(), FederateError> {
        Ok(())
    }
}

#[test]
fn past_request_is_rejected_and_run_continues() {
    let backwards = Arc::new(Backwards {
        id: FederateId::from("backwards"),
        rejected: Mutex::new(None),
    });
    let federation = LocalFederation::new("backwards");
    federation.join(backwards.clone()).unwrap();
    let engine = Engine::new(
        Arc::new(federation),
        Arc::new(RecordingMonitor::new()),
        EngineParams::sequential(1_000),
    )
    .unwrap();

    let report = engine.run_simulation().unwrap();
    assert!(matches!(
        *backwards.rejected.lock(),
        Some(RtiError::OutOfOrderRequest {
            requested: 10,
            current: 50,
            ..
        })
    ));
    assert_eq!(report.final_time, 60);
    assert_eq!(report.dispatched, 2);
}

#[test]
fn federate_error_aborts_and_finishes_every_federate() {
    let h = harness(
        vec![
            FederateScript::new("ok").with_steps([0, 5, 10]),
            FederateScript::new("broken")
                .with_steps([0, 5, 10])
                .with_fault(5, FaultKind::Fail),
        ],
        EngineParams::sequential(100),
    );
    let err = h.engine.run_simulation().unwrap_err();
    match err {
        RtiError::Federate(err) => {
            assert_eq!(err.federate.as_str(), "broken");
            assert!(err.message.contains("injected failure at 5"));
        }
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(h.engine.state(), EngineState::Aborted);
    assert_eq!(h.monitor.status_code(), Some(STATUS_CODE_ABORTED));
    for federate in ["ok", "broken"] {
        let calls = h.log.calls_of(federate);
        assert_eq!(calls.last(), Some(&Call::FinishSimulation));
        assert_eq!(calls.iter().filter(|call| **call == Call::FinishSimulation).count(), 1);
    }
    assert!(!h.log.advances().contains(&("ok".to_string(), 10)));
}

#[test]
fn panicking_federate_aborts() {
    let h = harness(
        vec![FederateScript::new("p").with_steps([3]).with_fault(3, FaultKind::Panic)],
        EngineParams::sequential(100),
    );
    let err = h.engine.run_simulation().unwrap_err();
    assert!(matches!(err, RtiError::Federate(ref e) if e.message == "panicked in advance_time"));
    assert_eq!(err.status_code(), STATUS_CODE_ABORTED);
}

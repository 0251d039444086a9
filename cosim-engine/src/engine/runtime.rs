//! Time-synchronization engine - coordinates the federates of one federation
//! in conservative wavefronts.
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};

use cosim_core::federate::FederateId;
use cosim_core::federation::FederationDirectory;
use cosim_core::interaction::Interaction;
use cosim_core::monitor::{notify, Monitor};
use cosim_core::priority::Priority;
use cosim_core::request::TimedRequest;
use cosim_core::time::{format_seconds, SimTime};
use cosim_core::{RtiError, STATUS_CODE_SUCCESS};

use crate::config::{EngineParams, SchedulingStrategy};
use crate::engine::kernel::{guarded, Kernel};
use crate::engine::pool::WorkerPool;
use crate::engine::progress::{ProgressLog, RealtimeBrake};
use crate::engine::report::{DispatchTrace, RunReport};
use crate::engine::router::InteractionRouter;
use crate::engine::watchdog::Watchdog;

/// Lifecycle of an [`Engine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Initializing,
    Running,
    Draining,
    Terminated,
    Aborted,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Initializing => "initializing",
            EngineState::Running => "running",
            EngineState::Draining => "draining",
            EngineState::Terminated => "terminated",
            EngineState::Aborted => "aborted",
        }
    }
}

/// Grants time advances to the federates of one federation and routes their
/// interactions.
///
/// Requests are kept in a priority queue. Each iteration removes every request
/// sharing the minimum time (a wavefront), moves the clock there and invokes
/// the federates through the configured [`SchedulingStrategy`].
pub struct Engine {
    kernel: Arc<Kernel>,
    params: EngineParams,
    state: Mutex<EngineState>,
}

impl Engine {
    /// Creates an engine for the federates in `directory`.
    ///
    /// # Errors
    /// [`RtiError::InvalidEndTime`] if the end time is zero.
    pub fn new(
        directory: Arc<dyn FederationDirectory>,
        monitor: Arc<dyn Monitor>,
        params: EngineParams,
    ) -> Result<Self, RtiError> {
        if params.end_time == 0 {
            return Err(RtiError::InvalidEndTime(params.end_time));
        }
        info!(
            "Initializing engine for federation '{}' until {} ({} strategy)",
            directory.federation_id(),
            format_seconds(params.end_time),
            params.strategy.name()
        );
        Ok(Self {
            kernel: Arc::new(Kernel::new(directory, monitor, params.end_time)),
            params,
            state: Mutex::new(EngineState::Initializing),
        })
    }

    pub fn federation_id(&self) -> &str {
        self.kernel.directory.federation_id()
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    pub fn state(&self) -> EngineState {
        *self.state.lock()
    }

    /// Current simulation time.
    pub fn now(&self) -> SimTime {
        self.kernel.clock.now_ns()
    }

    pub fn end_time(&self) -> SimTime {
        self.params.end_time
    }

    /// Earliest pending request time, if any.
    pub fn next_event_time(&self) -> Option<SimTime> {
        self.kernel.pending.lock().next_time()
    }

    /// The federation's interaction subscriptions.
    pub fn router(&self) -> &InteractionRouter {
        &self.kernel.router
    }

    /// Places a time-advance request on behalf of `federate`.
    ///
    /// A request earlier than the clock is rejected. A second, different
    /// request while one is outstanding is rejected and aborts the run.
    pub fn request_advance_time(
        &self,
        federate: &FederateId,
        time: SimTime,
        lookahead: SimTime,
        priority: Priority,
    ) -> Result<(), RtiError> {
        let state = self.state();
        if matches!(state, EngineState::Terminated | EngineState::Aborted) {
            return Err(RtiError::InvalidState {
                expected: "initializing or running",
                found: state.as_str(),
            });
        }
        self.kernel
            .request_advance_time(federate, time, lookahead, priority)
    }

    /// Publishes an interaction that no federate sent, such as a scenario
    /// trigger injected before the run.
    pub fn publish_interaction(&self, interaction: Interaction) -> Result<(), RtiError> {
        self.kernel.publish(None, interaction)
    }

    /// Runs the federation until the end time, or until no request is left.
    #[instrument(
        skip(self),
        fields(federation = %self.federation_id(), strategy = self.params.strategy.name())
    )]
    pub fn run_simulation(&self) -> Result<RunReport, RtiError> {
        self.enter(EngineState::Initializing, EngineState::Running)?;

        let kernel = &self.kernel;
        let threads = self.params.strategy.threads();
        let mut progress = ProgressLog::new(self.params.end_time);
        let started = Instant::now();

        notify("on_begin_simulation", || {
            kernel.monitor.on_begin_simulation(threads)
        });
        info!(
            "Start simulation of {} federates until {} using {threads} threads",
            kernel.directory.ambassadors().len(),
            format_seconds(self.params.end_time)
        );

        let mut trace = DispatchTrace::default();
        match self.run_loop(&mut trace, &mut progress) {
            Ok(()) => self.drain(trace, &progress, started),
            Err(err) => Err(self.abort(err, &progress, started)),
        }
    }

    fn enter(&self, expected: EngineState, next: EngineState) -> Result<(), RtiError> {
        let mut state = self.state.lock();
        if *state != expected {
            return Err(RtiError::InvalidState {
                expected: expected.as_str(),
                found: state.as_str(),
            });
        }
        *state = next;
        Ok(())
    }

    fn set_state(&self, next: EngineState) {
        *self.state.lock() = next;
    }

    /// Owns the watchdog and the workers for the duration of the loop.
    ///
    /// Federates are always advanced off the control thread, so an expired
    /// watchdog can end the run while a federate is still inside
    /// `advance_time`. Hung workers are abandoned.
    fn run_loop(
        &self,
        trace: &mut DispatchTrace,
        progress: &mut ProgressLog,
    ) -> Result<(), RtiError> {
        let kernel = &self.kernel;
        let watchdog = Watchdog::spawn(kernel.clone(), self.params.watchdog_timeout);

        let workers = match self.params.strategy {
            SchedulingStrategy::Sequential => WorkerPool::sequential(kernel),
            SchedulingStrategy::WorkerPool { threads } => WorkerPool::start(kernel, threads),
        };
        let result = workers.and_then(|mut workers| {
            let result = self.advance_loop(&mut workers, watchdog.as_ref(), trace, progress);
            workers.shutdown(kernel.abort.has_expired());
            result
        });

        if let Some(watchdog) = watchdog {
            watchdog.stop();
        }
        result
    }

    fn advance_loop(
        &self,
        workers: &mut WorkerPool,
        watchdog: Option<&Watchdog>,
        trace: &mut DispatchTrace,
        progress: &mut ProgressLog,
    ) -> Result<(), RtiError> {
        let kernel = &self.kernel;
        let end_time = self.params.end_time;
        let brake = RealtimeBrake::new(self.params.realtime_brake);

        kernel.initialize_federates()?;

        loop {
            if kernel.abort.is_triggered() {
                return Err(kernel.abort_cause());
            }

            let wavefront = {
                let mut pending = kernel.pending.lock();
                match pending.pop_wavefront(end_time) {
                    Some(wavefront) => wavefront,
                    None if pending.is_empty() => {
                        debug!("No pending requests left at {}", kernel.clock.now_ns());
                        return Ok(());
                    }
                    None => {
                        let time = kernel.clock.advance_to(end_time);
                        debug!("All {} pending requests lie beyond the end time {time}", pending.len());
                        return Ok(());
                    }
                }
            };

            let Some(time) = wavefront.first().map(TimedRequest::requested_time) else {
                continue;
            };
            let time = kernel.clock.advance_to(time);
            if let Some(brake) = &brake {
                brake.sync(time);
            }
            if let Some(watchdog) = watchdog {
                watchdog.pet();
            }
            debug!("Wavefront at {time} with {} requests", wavefront.len());

            workers.execute(kernel, &wavefront, |request| trace.record(request))?;
            trace.wavefronts += 1;
            progress.update(time);

            if time >= end_time {
                if kernel.abort.is_triggered() {
                    return Err(kernel.abort_cause());
                }
                return Ok(());
            }
        }
    }

    fn drain(
        &self,
        trace: DispatchTrace,
        progress: &ProgressLog,
        started: Instant,
    ) -> Result<RunReport, RtiError> {
        self.set_state(EngineState::Draining);
        let kernel = &self.kernel;
        let final_time = kernel.clock.now_ns();
        info!("Finishing simulation at {}", format_seconds(final_time));

        kernel.pending.lock().clear();
        let mut first_error = None;
        for handle in kernel.directory.ambassadors() {
            if let Err(err) = guarded(handle.id(), "finish_simulation", || handle.finish_simulation()) {
                error!("Could not finish federate '{}': {err}", handle.id());
                first_error.get_or_insert(err);
            }
        }
        if let Some(err) = first_error {
            return Err(self.terminate(err.into(), progress, started));
        }

        let wall_time = started.elapsed();
        notify("on_end_simulation", || {
            kernel.monitor.on_end_simulation(wall_time, STATUS_CODE_SUCCESS)
        });
        self.set_state(EngineState::Terminated);
        progress.finish(final_time, STATUS_CODE_SUCCESS);

        Ok(RunReport {
            federation_id: self.federation_id().to_string(),
            strategy: self.params.strategy.name(),
            end_time: self.params.end_time,
            final_time,
            wavefronts: trace.wavefronts,
            dispatched: trace.dispatched,
            interactions_published: kernel.counters.published.load(Ordering::Relaxed),
            interactions_delivered: kernel.counters.delivered.load(Ordering::Relaxed),
            wall_time,
            trace_digest: trace.digest(),
            status_code: STATUS_CODE_SUCCESS,
        })
    }

    /// Ends a failed run: every federate that is not stuck inside
    /// `advance_time` still receives `finish_simulation`.
    fn abort(&self, err: RtiError, progress: &ProgressLog, started: Instant) -> RtiError {
        let kernel = &self.kernel;
        let stuck = kernel.in_flight();
        for handle in kernel.directory.ambassadors() {
            if stuck.contains(handle.id()) {
                warn!("Federate '{}' is still busy and is not finished", handle.id());
                continue;
            }
            if let Err(finish_err) =
                guarded(handle.id(), "finish_simulation", || handle.finish_simulation())
            {
                error!("Could not finish federate '{}': {finish_err}", handle.id());
            }
        }
        self.terminate(err, progress, started)
    }

    /// Records the aborted state and reports the status code.
    fn terminate(&self, err: RtiError, progress: &ProgressLog, started: Instant) -> RtiError {
        self.set_state(EngineState::Aborted);
        let kernel = &self.kernel;
        let time = kernel.clock.now_ns();
        error!("Simulation aborted at {}: {err}", format_seconds(time));

        kernel.pending.lock().clear();
        let status_code = err.status_code();
        let wall_time = started.elapsed();
        notify("on_end_simulation", || {
            kernel.monitor.on_end_simulation(wall_time, status_code)
        });
        progress.finish(time, status_code);
        err
    }
}

//! Shared state of one run.
//!
//! The [`Kernel`] is owned by the engine behind an `Arc` and borrowed by the
//! worker pool and the watchdog. Federates reach it only through a
//! [`FederateContext`], which is handed to every callback and bound to the
//! federate being called.

use std::collections::{BTreeSet, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use cosim_core::federate::{FederateHandle, FederateId, RtiAmbassador};
use cosim_core::federation::FederationDirectory;
use cosim_core::interaction::Interaction;
use cosim_core::monitor::{notify, Monitor};
use cosim_core::priority::Priority;
use cosim_core::request::{Admission, PendingRequests, TimedRequest};
use cosim_core::time::{SimTime, SimulationClock};
use cosim_core::{FederateError, RtiError};

use super::router::InteractionRouter;

/// First fatal error of a run.
///
/// Only the first cause is kept. The watchdog additionally wakes whoever
/// waits on [`AbortSignal::waker`], since a hung federate never completes.
pub(crate) struct AbortSignal {
    cause: Mutex<Option<RtiError>>,
    triggered: AtomicBool,
    expired: AtomicBool,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl AbortSignal {
    fn new() -> Self {
        let (wake_tx, wake_rx) = bounded(1);
        Self {
            cause: Mutex::new(None),
            triggered: AtomicBool::new(false),
            expired: AtomicBool::new(false),
            wake_tx,
            wake_rx,
        }
    }

    /// Records `cause` unless an earlier one exists. Returns whether it was
    /// recorded.
    pub(crate) fn trigger(&self, cause: RtiError) -> bool {
        let mut slot = self.cause.lock();
        if slot.is_some() || self.triggered.load(Ordering::Acquire) {
            return false;
        }
        *slot = Some(cause);
        self.triggered.store(true, Ordering::Release);
        true
    }

    /// Watchdog expiry: records the cause and interrupts any barrier.
    pub(crate) fn expire(&self, cause: RtiError) {
        self.expired.store(true, Ordering::Release);
        self.trigger(cause);
        let _ = self.wake_tx.try_send(());
    }

    #[inline]
    pub(crate) fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn has_expired(&self) -> bool {
        self.expired.load(Ordering::Acquire)
    }

    /// The recorded cause. The run stays aborted after taking it.
    pub(crate) fn take(&self) -> Option<RtiError> {
        self.cause.lock().take()
    }

    pub(crate) fn waker(&self) -> &Receiver<()> {
        &self.wake_rx
    }
}

/// Interaction counters of a run.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub published: AtomicU64,
    pub delivered: AtomicU64,
}

pub(crate) struct Kernel {
    pub directory: Arc<dyn FederationDirectory>,
    pub monitor: Arc<dyn Monitor>,
    pub router: InteractionRouter,
    pub clock: SimulationClock,
    pub end_time: SimTime,
    pub pending: Mutex<PendingRequests>,
    pub abort: AbortSignal,
    pub counters: Counters,
    /// Earliest publishable time per federate, from its last granted request.
    publish_bounds: Mutex<HashMap<FederateId, SimTime>>,
    in_flight: Mutex<BTreeSet<FederateId>>,
}

impl Kernel {
    pub(crate) fn new(
        directory: Arc<dyn FederationDirectory>,
        monitor: Arc<dyn Monitor>,
        end_time: SimTime,
    ) -> Self {
        Self {
            router: InteractionRouter::new(directory.clone()),
            directory,
            monitor,
            clock: SimulationClock::new(0),
            end_time,
            pending: Mutex::new(PendingRequests::new()),
            abort: AbortSignal::new(),
            counters: Counters::default(),
            publish_bounds: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(BTreeSet::new()),
        }
    }

    pub(crate) fn context(&self, federate: &FederateId) -> FederateContext<'_> {
        FederateContext {
            kernel: self,
            federate: federate.clone(),
        }
    }

    /// Admits a time-advance request. A duplicate request also aborts the run.
    pub(crate) fn request_advance_time(
        &self,
        federate: &FederateId,
        time: SimTime,
        lookahead: SimTime,
        priority: Priority,
    ) -> Result<(), RtiError> {
        if !self.directory.is_federate_joined(federate) {
            return Err(RtiError::UnknownFederate(federate.clone()));
        }

        let request = TimedRequest::new(federate.clone(), time, lookahead, priority);
        let admission = self.pending.lock().admit(request, self.clock.now_ns());
        match admission {
            Ok(Admission::Queued) => {
                trace!("Federate '{federate}' requested {time} (lookahead {lookahead}, priority {priority})");
                Ok(())
            }
            Ok(Admission::AlreadyQueued) => {
                debug!("Federate '{federate}' repeated its request for {time}");
                Ok(())
            }
            Err(err) => {
                if err.is_fatal() {
                    error!("{err}");
                    self.abort.trigger(err.clone());
                } else {
                    warn!("{err}");
                }
                Err(err)
            }
        }
    }

    /// Routes an interaction to its subscribers. `publisher` is `None` for
    /// interactions injected by the engine itself.
    pub(crate) fn publish(
        &self,
        publisher: Option<&FederateId>,
        mut interaction: Interaction,
    ) -> Result<(), RtiError> {
        let now = self.clock.now_ns();
        if interaction.time() < now {
            return Err(RtiError::InteractionInPast {
                type_id: interaction.type_id().to_string(),
                time: interaction.time(),
                current: now,
            });
        }

        if let Some(publisher) = publisher {
            if let Some(bound) = self.publish_bounds.lock().get(publisher).copied() {
                if interaction.time() < bound {
                    return Err(RtiError::LookaheadViolation {
                        federate: publisher.clone(),
                        type_id: interaction.type_id().to_string(),
                        time: interaction.time(),
                        bound,
                    });
                }
            }
            interaction.set_sender_id(publisher.clone())?;
        }

        self.counters.published.fetch_add(1, Ordering::Relaxed);
        let delivered = self
            .router
            .publish(&interaction, self.monitor.as_ref(), |handle| {
                let context = self.context(handle.id());
                guarded(handle.id(), "receive_interaction", || {
                    handle.receive_interaction(&interaction, &context)
                })
            })
            .map_err(|err| {
                let err = RtiError::from(err);
                self.abort.trigger(err.clone());
                err
            })?;
        self.counters
            .delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        Ok(())
    }

    /// Calls `initialize` on every federate in join order.
    pub(crate) fn initialize_federates(&self) -> Result<(), RtiError> {
        for handle in self.directory.ambassadors() {
            debug!(
                "Initialize federate '{}' (priority {}, constrained {}, regulating {})",
                handle.id(),
                handle.priority(),
                handle.is_time_constrained(),
                handle.is_time_regulating()
            );
            let context = self.context(handle.id());
            guarded(handle.id(), "initialize", || {
                handle.initialize(0, self.end_time, &context)
            })?;
        }
        Ok(())
    }

    /// Grants one request: invokes `advance_time` on the federate and returns
    /// how long the call took.
    pub(crate) fn dispatch(&self, request: &TimedRequest) -> Result<Duration, RtiError> {
        let federate = request.federate_id();
        let Some(handle) = self.directory.ambassador(federate) else {
            warn!("Federate '{federate}' left before its request for {} was granted", request.requested_time());
            return Ok(Duration::ZERO);
        };

        self.publish_bounds
            .lock()
            .insert(federate.clone(), request.publish_bound());
        self.in_flight.lock().insert(federate.clone());
        notify("on_begin_activity", || self.monitor.on_begin_activity(request));
        trace!("Dispatch {request}");

        let started = Instant::now();
        let context = self.context(federate);
        let result = guarded(federate, "advance_time", || {
            handle.advance_time(request.requested_time(), &context)
        });
        self.in_flight.lock().remove(federate);

        result.map(|_| started.elapsed()).map_err(RtiError::from)
    }

    pub(crate) fn end_activity(&self, request: &TimedRequest, duration: Duration) {
        notify("on_end_activity", || {
            self.monitor.on_end_activity(request, duration)
        });
    }

    /// Records a dispatch failure and returns the run's abort cause, which is
    /// the earliest fatal error (possibly raised inside the failed call).
    pub(crate) fn fail(&self, err: RtiError, request: &TimedRequest) -> RtiError {
        error!(
            "Federate '{}' failed while advancing to {} at {}: {err}",
            request.federate_id(),
            request.requested_time(),
            self.clock.now_ns()
        );
        self.abort.trigger(err.clone());
        self.abort.take().unwrap_or(err)
    }

    /// Takes the recorded abort cause.
    pub(crate) fn abort_cause(&self) -> RtiError {
        self.abort.take().unwrap_or(RtiError::InvalidState {
            expected: "running",
            found: "aborted",
        })
    }

    /// Federates currently inside `advance_time`.
    pub(crate) fn in_flight(&self) -> Vec<FederateId> {
        self.in_flight.lock().iter().cloned().collect()
    }
}

/// Runs a federate callback, turning a panic into a [`FederateError`].
pub(crate) fn guarded<F>(federate: &FederateId, callback: &str, f: F) -> Result<(), FederateError>
where
    F: FnOnce() -> Result<(), FederateError>,
{
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        Err(FederateError::new(
            federate.clone(),
            format!("panicked in {callback}"),
        ))
    })
}

/// [`RtiAmbassador`] bound to one federate for the duration of a callback.
pub(crate) struct FederateContext<'k> {
    kernel: &'k Kernel,
    federate: FederateId,
}

impl RtiAmbassador for FederateContext<'_> {
    fn federate_id(&self) -> &FederateId {
        &self.federate
    }

    fn now(&self) -> SimTime {
        self.kernel.clock.now_ns()
    }

    fn end_time(&self) -> SimTime {
        self.kernel.end_time
    }

    fn request_advance_time(
        &self,
        time: SimTime,
        lookahead: SimTime,
        priority: Priority,
    ) -> Result<(), RtiError> {
        self.kernel
            .request_advance_time(&self.federate, time, lookahead, priority)
    }

    fn publish_interaction(&self, interaction: Interaction) -> Result<(), RtiError> {
        self.kernel.publish(Some(&self.federate), interaction)
    }

    fn subscribe(&self, type_ids: &[&str]) -> Result<(), RtiError> {
        self.kernel.router.subscribe_all(&self.federate, type_ids)
    }

    fn unsubscribe(&self, type_ids: &[&str]) {
        self.kernel.router.unsubscribe(&self.federate, type_ids)
    }

    fn next_event_time(&self) -> Option<SimTime> {
        self.kernel.pending.lock().next_time()
    }

    fn report_processed(&self, interaction: &Interaction) {
        notify("on_process_interaction", || {
            self.kernel
                .monitor
                .on_process_interaction(&self.federate, interaction)
        });
    }
}

//! Wall-clock watchdog for hung wavefronts.
//!
//! The control loop pets the watchdog whenever a wavefront starts. If a
//! wavefront is still unfinished after the timeout, the watchdog records a
//! [`RtiError::WatchdogTimeout`] naming the federates still inside
//! `advance_time` and wakes the barrier.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{bounded, tick, Sender};
use crossbeam::select;
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use cosim_core::error::PendingFederates;
use cosim_core::RtiError;

use super::kernel::Kernel;

pub(crate) struct Watchdog {
    last_progress: Arc<Mutex<Instant>>,
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    /// Starts the watchdog thread. Returns `None` when `timeout` is zero.
    pub(crate) fn spawn(kernel: Arc<Kernel>, timeout: Duration) -> Option<Self> {
        if timeout.is_zero() {
            return None;
        }

        let last_progress = Arc::new(Mutex::new(Instant::now()));
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let poll = (timeout / 4).clamp(Duration::from_millis(1), Duration::from_secs(1));

        let progress = last_progress.clone();
        let spawned = thread::Builder::new()
            .name("cosim-watchdog".into())
            .spawn(move || {
                let ticker = tick(poll);
                loop {
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticker) -> _ => {
                            if progress.lock().elapsed() < timeout {
                                continue;
                            }
                            let cause = RtiError::WatchdogTimeout {
                                timeout,
                                time: kernel.clock.now_ns(),
                                pending: PendingFederates(kernel.in_flight()),
                            };
                            error!("{cause}");
                            kernel.abort.expire(cause);
                            break;
                        }
                    }
                }
            });

        match spawned {
            Ok(handle) => {
                debug!("Watchdog started with timeout {timeout:?}");
                Some(Self {
                    last_progress,
                    stop_tx,
                    handle: Some(handle),
                })
            }
            Err(err) => {
                warn!("Could not start watchdog thread: {err}");
                None
            }
        }
    }

    pub(crate) fn pet(&self) {
        *self.last_progress.lock() = Instant::now();
    }

    pub(crate) fn stop(mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

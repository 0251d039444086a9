//! ## cosim-core::time
//! **Simulation time and the federation clock**
//!
//! Simulation time is an unsigned nanosecond count starting at zero.
//! [`SimulationClock`] is the single clock of one engine instance: it only
//! moves forward, and reads are lock-free so federate contexts and the watchdog
//! can observe it from other threads.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Nanosecond-resolution simulation time.
pub type SimTime = u64;

pub const NANO_SECOND: SimTime = 1;
pub const MICRO_SECOND: SimTime = 1_000 * NANO_SECOND;
pub const MILLI_SECOND: SimTime = 1_000 * MICRO_SECOND;
pub const SECOND: SimTime = 1_000 * MILLI_SECOND;
pub const MINUTE: SimTime = 60 * SECOND;

/// Formats a simulation time as seconds with millisecond precision.
pub fn format_seconds(time: SimTime) -> String {
    format!("{}.{:03}s", time / SECOND, (time % SECOND) / MILLI_SECOND)
}

#[derive(Clone, Debug, Default)]
pub struct SimulationClock {
    now: Arc<AtomicU64>,
}

impl SimulationClock {
    pub fn new(start: SimTime) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Current simulation time in nanoseconds.
    #[inline]
    pub fn now_ns(&self) -> SimTime {
        self.now.load(Ordering::Acquire)
    }

    /// Moves the clock to `time` unless it is already later. Returns the
    /// resulting time, which never decreases.
    #[inline]
    pub fn advance_to(&self, time: SimTime) -> SimTime {
        let previous = self.now.fetch_max(time, Ordering::AcqRel);
        previous.max(time)
    }
}

//! # Engine parameters
//!
//! Runtime form of [`cosim_config::EngineConfig`]: the strategy string is
//! resolved into [`SchedulingStrategy`] and the watchdog timeout into a
//! [`Duration`].

use std::num::NonZeroUsize;
use std::time::Duration;

use cosim_config::EngineConfig;
use cosim_core::time::SimTime;

/// How the federates of one wavefront are invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingStrategy {
    /// One request at a time on the control thread.
    Sequential,
    /// Batches of lookahead-positive requests run on a bounded pool.
    WorkerPool { threads: NonZeroUsize },
}

impl SchedulingStrategy {
    /// Threads used to invoke federates.
    pub fn threads(&self) -> usize {
        match self {
            SchedulingStrategy::Sequential => 1,
            SchedulingStrategy::WorkerPool { threads } => threads.get(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SchedulingStrategy::Sequential => cosim_config::STRATEGY_SEQUENTIAL,
            SchedulingStrategy::WorkerPool { .. } => cosim_config::STRATEGY_WORKER_POOL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineParams {
    pub end_time: SimTime,
    pub strategy: SchedulingStrategy,
    /// `Duration::ZERO` disables the watchdog.
    pub watchdog_timeout: Duration,
    /// Maximum ratio of simulation time to wall-clock time; zero runs
    /// unthrottled.
    pub realtime_brake: u32,
}

impl EngineParams {
    pub fn sequential(end_time: SimTime) -> Self {
        Self {
            end_time,
            strategy: SchedulingStrategy::Sequential,
            watchdog_timeout: Duration::ZERO,
            realtime_brake: 0,
        }
    }

    pub fn worker_pool(end_time: SimTime, threads: NonZeroUsize) -> Self {
        Self {
            end_time,
            strategy: SchedulingStrategy::WorkerPool { threads },
            watchdog_timeout: Duration::ZERO,
            realtime_brake: 0,
        }
    }

    pub fn with_watchdog(mut self, timeout: Duration) -> Self {
        self.watchdog_timeout = timeout;
        self
    }

    pub fn with_realtime_brake(mut self, factor: u32) -> Self {
        self.realtime_brake = factor;
        self
    }
}

impl From<&EngineConfig> for EngineParams {
    fn from(config: &EngineConfig) -> Self {
        let strategy = match NonZeroUsize::new(config.threads) {
            Some(threads) if config.is_worker_pool() => SchedulingStrategy::WorkerPool { threads },
            _ => SchedulingStrategy::Sequential,
        };
        Self {
            end_time: config.end_time_ns,
            strategy,
            watchdog_timeout: Duration::from_secs(config.watchdog_timeout_s),
            realtime_brake: config.realtime_brake,
        }
    }
}

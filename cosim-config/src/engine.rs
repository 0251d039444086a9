//! Time-synchronization engine configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation;

pub const STRATEGY_SEQUENTIAL: &str = "sequential";
pub const STRATEGY_WORKER_POOL: &str = "worker-pool";

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Simulation end time in nanoseconds.
    #[serde(default = "default_end_time")]
    #[validate(range(min = 1))]
    pub end_time_ns: u64,

    /// `sequential` or `worker-pool`.
    #[serde(default = "default_strategy")]
    #[validate(custom(function = validation::validate_strategy))]
    pub strategy: String,

    /// Worker threads for the `worker-pool` strategy.
    #[serde(default = "default_threads")]
    #[validate(range(min = 1, max = 256))]
    pub threads: usize,

    /// Seconds a wavefront may stay unfinished before the run is aborted.
    /// Zero disables the watchdog.
    #[serde(default = "default_watchdog_timeout")]
    pub watchdog_timeout_s: u64,

    /// Upper bound on simulated seconds per wall-clock second. Zero disables
    /// the brake.
    #[serde(default)]
    pub realtime_brake: u32,
}

fn default_end_time() -> u64 {
    // 1000 seconds
    1_000_000_000_000
}

fn default_strategy() -> String {
    STRATEGY_SEQUENTIAL.into()
}

fn default_threads() -> usize {
    num_cpus::get().clamp(1, 256)
}

fn default_watchdog_timeout() -> u64 {
    30
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            end_time_ns: default_end_time(),
            strategy: default_strategy(),
            threads: default_threads(),
            watchdog_timeout_s: default_watchdog_timeout(),
            realtime_brake: 0,
        }
    }
}

impl EngineConfig {
    pub fn is_worker_pool(&self) -> bool {
        self.strategy == STRATEGY_WORKER_POOL
    }
}

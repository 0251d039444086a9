//! Progress reporting and the optional real-time brake.

use std::thread;
use std::time::{Duration, Instant};

use tracing::info;

use cosim_core::time::{SimTime, SECOND};

const LOG_INTERVAL: Duration = Duration::from_millis(500);
const RTF_WINDOW: Duration = Duration::from_secs(5);

/// Periodic "Simulating: ..." lines with the real-time factor (RTF) and the
/// estimated time to completion, averaged over a five second window.
pub(crate) struct ProgressLog {
    end_time: SimTime,
    started: Instant,
    last_log: Instant,
    window_start: Instant,
    window_sim_start: SimTime,
    real_time_factor: Option<f64>,
}

impl ProgressLog {
    pub(crate) fn new(end_time: SimTime) -> Self {
        let now = Instant::now();
        Self {
            end_time,
            started: now,
            last_log: now,
            window_start: now,
            window_sim_start: 0,
            real_time_factor: None,
        }
    }

    pub(crate) fn update(&mut self, time: SimTime) {
        let now = Instant::now();
        let window = now.duration_since(self.window_start);
        if window > RTF_WINDOW {
            let simulated = time.saturating_sub(self.window_sim_start) as f64;
            self.real_time_factor = Some(simulated / window.as_nanos() as f64);
            self.window_start = now;
            self.window_sim_start = time;
        }

        if now.duration_since(self.last_log) > LOG_INTERVAL {
            self.last_log = now;
            info!(
                target: "cosim::progress",
                "Simulating: {}ns ({:.1}s / {:.1}s) - {:.1}% (RTF:{}, ETC:{})",
                time,
                time as f64 / SECOND as f64,
                self.end_time as f64 / SECOND as f64,
                percent(time, self.end_time),
                self.real_time_factor
                    .map_or_else(|| "unknown".to_string(), |rtf| format!("{rtf:.2}")),
                self.estimated_completion(time)
            );
        }
    }

    fn estimated_completion(&self, time: SimTime) -> String {
        match self.real_time_factor {
            Some(rtf) if rtf > 0.0 => {
                let remaining = self.end_time.saturating_sub(time) as f64 / SECOND as f64;
                pretty_seconds(remaining / rtf)
            }
            _ => "unknown".to_string(),
        }
    }

    /// Closing summary of a run.
    pub(crate) fn finish(&self, time: SimTime, status_code: i32) {
        let wall = self.started.elapsed();
        info!(
            "Simulation ended after {:.1}s of {:.1}s ({:.1}%)",
            time as f64 / SECOND as f64,
            self.end_time as f64 / SECOND as f64,
            percent(time, self.end_time)
        );
        let rtf = if wall.is_zero() {
            0.0
        } else {
            time as f64 / wall.as_nanos() as f64
        };
        info!("Duration: {wall:?} (RTF: {rtf:.2})");
        if status_code == cosim_core::STATUS_CODE_SUCCESS {
            info!("Simulation finished: {status_code}");
        } else {
            info!("Simulation interrupted: {status_code}");
        }
    }
}

fn percent(time: SimTime, end_time: SimTime) -> f64 {
    if end_time == 0 {
        100.0
    } else {
        time as f64 * 100.0 / end_time as f64
    }
}

/// Formats seconds with the largest fitting unit, up to years.
pub(crate) fn pretty_seconds(seconds: f64) -> String {
    const MINUTE: f64 = 60.0;
    const HOUR: f64 = 3600.0;
    const DAY: f64 = 24.0 * HOUR;
    if !(0.0..DAY * 365.0 * 100.0).contains(&seconds) {
        "unknown".to_string()
    } else if seconds < 120.0 {
        format!("{seconds:.1}s")
    } else if seconds < 2.0 * HOUR {
        format!("{:.1}m", seconds / MINUTE)
    } else if seconds < 48.0 * HOUR {
        format!("{:.1}h", seconds / HOUR)
    } else if seconds < 60.0 * DAY {
        format!("{:.1}d", seconds / DAY)
    } else if seconds < 720.0 * DAY {
        format!("{:.1}mo", seconds / (30.0 * DAY))
    } else {
        format!("{:.1}y", seconds / (365.0 * DAY))
    }
}

/// Keeps simulation time from running more than `factor` times faster than
/// wall-clock time.
pub(crate) struct RealtimeBrake {
    factor: u32,
    started: Instant,
}

impl RealtimeBrake {
    /// Returns `None` for a factor of zero.
    pub(crate) fn new(factor: u32) -> Option<Self> {
        (factor > 0).then(|| Self {
            factor,
            started: Instant::now(),
        })
    }

    /// Sleeps until wall-clock time has caught up with `time / factor`.
    pub(crate) fn sync(&self, time: SimTime) {
        let target = Duration::from_nanos(time / u64::from(self.factor));
        let elapsed = self.started.elapsed();
        if target > elapsed {
            thread::sleep(target - elapsed);
        }
    }
}

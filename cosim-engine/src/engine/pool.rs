//! Bounded worker pool that runs federate callbacks off the control thread.
//!
//! With the `worker-pool` strategy a wavefront is split into batches: a
//! request without lookahead forms a batch of its own, while a run of
//! consecutive requests with positive lookahead forms one parallel batch.
//! The `sequential` strategy uses a single worker and one request per batch.
//! Every batch ends with a barrier that waits for all of its completions, or
//! for the watchdog.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver, Sender};
use crossbeam::select;
use tracing::{debug, trace, warn};

use cosim_core::monitor::notify;
use cosim_core::request::TimedRequest;
use cosim_core::RtiError;

use super::kernel::Kernel;

struct Job {
    index: usize,
    request: TimedRequest,
}

struct Completion {
    index: usize,
    result: Result<Duration, RtiError>,
}

/// Splits a wavefront (already in dispatch order) into batches. Priorities do
/// not split a run of positive-lookahead requests.
pub(crate) fn batches(wavefront: &[TimedRequest]) -> Vec<&[TimedRequest]> {
    let mut batches = Vec::new();
    let mut start = 0;
    while start < wavefront.len() {
        let end = if wavefront[start].lookahead() == 0 {
            start + 1
        } else {
            wavefront[start..]
                .iter()
                .position(|request| request.lookahead() == 0)
                .map_or(wavefront.len(), |offset| start + offset)
        };
        batches.push(&wavefront[start..end]);
        start = end;
    }
    batches
}

pub(crate) struct WorkerPool {
    jobs: Option<Sender<Job>>,
    completions: Receiver<Completion>,
    workers: Vec<JoinHandle<()>>,
    parallel: bool,
    next_block_id: u64,
}

impl WorkerPool {
    /// Starts `threads` workers named `cosim-worker-NNNN` that run parallel
    /// batches.
    pub(crate) fn start(kernel: &Arc<Kernel>, threads: NonZeroUsize) -> Result<Self, RtiError> {
        Self::spawn(kernel, threads, "cosim-worker", true)
    }

    /// Starts the single `cosim-sequential-0001` worker. Requests are
    /// dispatched one at a time in wavefront order.
    pub(crate) fn sequential(kernel: &Arc<Kernel>) -> Result<Self, RtiError> {
        Self::spawn(kernel, NonZeroUsize::MIN, "cosim-sequential", false)
    }

    fn spawn(
        kernel: &Arc<Kernel>,
        threads: NonZeroUsize,
        prefix: &str,
        parallel: bool,
    ) -> Result<Self, RtiError> {
        let (job_tx, job_rx) = unbounded::<Job>();
        let (done_tx, done_rx) = unbounded::<Completion>();

        let mut workers = Vec::with_capacity(threads.get());
        for n in 1..=threads.get() {
            let kernel = kernel.clone();
            let jobs = job_rx.clone();
            let done = done_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("{prefix}-{n:04}"))
                .spawn(move || {
                    while let Ok(job) = jobs.recv() {
                        let result = kernel.dispatch(&job.request);
                        if done.send(Completion { index: job.index, result }).is_err() {
                            break;
                        }
                    }
                })
                .map_err(|err| {
                    warn!("Could not spawn worker thread {n}: {err}");
                    RtiError::InvalidState {
                        expected: "worker pool started",
                        found: "thread spawn failed",
                    }
                })?;
            workers.push(handle);
        }
        debug!("Started {} {prefix} threads", workers.len());

        Ok(Self {
            jobs: Some(job_tx),
            completions: done_rx,
            workers,
            parallel,
            next_block_id: 0,
        })
    }

    /// Dispatches one wavefront batch by batch. Completions are reported to
    /// the monitor in dispatch order after each barrier.
    pub(crate) fn execute(
        &mut self,
        kernel: &Kernel,
        wavefront: &[TimedRequest],
        mut completed: impl FnMut(&TimedRequest),
    ) -> Result<(), RtiError> {
        let batches = if self.parallel {
            batches(wavefront)
        } else {
            wavefront.chunks(1).collect()
        };
        for batch in batches {
            if kernel.abort.is_triggered() {
                return Err(kernel.abort_cause());
            }

            if self.parallel && (batch.len() > 1 || batch[0].lookahead() > 0) {
                let block_id = self.next_block_id;
                self.next_block_id += 1;
                trace!("Schedule block {block_id} with {} requests", batch.len());
                for request in batch {
                    notify("on_scheduling", || {
                        kernel.monitor.on_scheduling(block_id, request)
                    });
                }
            }

            let results = self.run_batch(kernel, batch)?;

            let mut failure = None;
            for (request, result) in batch.iter().zip(results) {
                match result {
                    Ok(duration) => {
                        kernel.end_activity(request, duration);
                        completed(request);
                    }
                    Err(err) if failure.is_none() => failure = Some((request, err)),
                    Err(_) => {}
                }
            }
            if let Some((request, err)) = failure {
                return Err(kernel.fail(err, request));
            }
        }
        Ok(())
    }

    /// Submits a batch and waits for every completion. Returns early only
    /// when the watchdog expires.
    fn run_batch(
        &self,
        kernel: &Kernel,
        batch: &[TimedRequest],
    ) -> Result<Vec<Result<Duration, RtiError>>, RtiError> {
        let jobs = self.jobs.as_ref().ok_or(RtiError::InvalidState {
            expected: "worker pool running",
            found: "worker pool shut down",
        })?;
        for (index, request) in batch.iter().enumerate() {
            jobs.send(Job {
                index,
                request: request.clone(),
            })
            .map_err(|_| RtiError::InvalidState {
                expected: "worker pool running",
                found: "workers gone",
            })?;
        }

        let mut results: Vec<Option<Result<Duration, RtiError>>> = vec![None; batch.len()];
        let mut outstanding = batch.len();
        while outstanding > 0 {
            select! {
                recv(self.completions) -> completion => {
                    let completion = completion.map_err(|_| RtiError::InvalidState {
                        expected: "worker pool running",
                        found: "workers gone",
                    })?;
                    results[completion.index] = Some(completion.result);
                    outstanding -= 1;
                }
                recv(kernel.abort.waker()) -> _ => {
                    if kernel.abort.has_expired() {
                        return Err(kernel.abort_cause());
                    }
                }
            }
        }
        Ok(results.into_iter().flatten().collect())
    }

    /// Stops the workers. After a watchdog expiry, hung workers are left
    /// behind instead of joined.
    pub(crate) fn shutdown(mut self, abandon: bool) {
        self.jobs.take();
        if abandon {
            warn!(
                "Abandoning {} worker threads after watchdog expiry",
                self.workers.len()
            );
            self.workers.clear();
            return;
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

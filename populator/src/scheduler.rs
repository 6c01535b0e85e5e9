//! Work schedulers that run one merge level at a time.
//!
//! The merger never owns threads. It hands a named group of jobs to a
//! [`WorkScheduler`] and blocks until every job has finished.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};
use std::thread;

use crate::error::PopulationError;

/// One unit of merge work.
pub type Job<T> = Box<dyn FnOnce() -> Result<T, PopulationError> + Send + 'static>;

/// Submit-and-await execution of a group of jobs.
pub trait WorkScheduler: Send + Sync {
    /// Runs every job and returns their results in submission order.
    ///
    /// # Post-conditions
    /// - all jobs have finished (or were never started) when this returns
    /// - on failure the error of the first failed job, by submission order, is
    ///   returned and all successful results are dropped
    fn run_all<T: Send + 'static>(
        &self,
        name: &str,
        jobs: Vec<Job<T>>,
    ) -> Result<Vec<T>, PopulationError>;
}

fn panicked(name: &str) -> PopulationError {
    PopulationError::MergeAborted {
        reason: format!("job in {name} panicked"),
        source: Box::new(PopulationError::IllegalState("worker panicked")),
    }
}

fn collect<T>(results: Vec<Option<Result<T, PopulationError>>>) -> Result<Vec<T>, PopulationError> {
    results
        .into_iter()
        .map(|r| r.unwrap_or(Err(PopulationError::IllegalState("job was never run"))))
        .collect()
}

/// Runs jobs on a fixed number of scoped threads pulling from a shared
/// queue.
#[derive(Debug, Clone, Copy)]
pub struct ThreadPoolScheduler {
    workers: usize,
}

impl ThreadPoolScheduler {
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }
}

impl WorkScheduler for ThreadPoolScheduler {
    fn run_all<T: Send + 'static>(
        &self,
        name: &str,
        jobs: Vec<Job<T>>,
    ) -> Result<Vec<T>, PopulationError> {
        let count = jobs.len();
        let queue = Mutex::new(jobs.into_iter().enumerate().collect::<VecDeque<_>>());
        let results: Mutex<Vec<Option<Result<T, PopulationError>>>> =
            Mutex::new((0..count).map(|_| None).collect());

        let spawned = thread::scope(|scope| -> Result<(), PopulationError> {
            for worker in 0..self.workers.min(count) {
                thread::Builder::new()
                    .name(format!("{name}-{worker}"))
                    .spawn_scoped(scope, || {
                        loop {
                            let next = queue
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .pop_front();
                            let Some((index, job)) = next else {
                                break;
                            };
                            let result = panic::catch_unwind(AssertUnwindSafe(job))
                                .unwrap_or_else(|_| Err(panicked(name)));
                            results.lock().unwrap_or_else(PoisonError::into_inner)[index] =
                                Some(result);
                        }
                    })?;
            }
            Ok(())
        });
        spawned?;

        collect(results.into_inner().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Runs jobs as blocking tasks on an owned tokio runtime.
///
/// `run_all` blocks the calling thread and must not be called from inside an
/// async context.
pub struct TokioScheduler {
    runtime: tokio::runtime::Runtime,
}

impl TokioScheduler {
    pub fn new(workers: usize) -> Result<Self, PopulationError> {
        let workers = workers.max(1);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(workers)
            .max_blocking_threads(workers)
            .thread_name("index-merge")
            .build()?;
        Ok(Self { runtime })
    }
}

impl WorkScheduler for TokioScheduler {
    fn run_all<T: Send + 'static>(
        &self,
        name: &str,
        jobs: Vec<Job<T>>,
    ) -> Result<Vec<T>, PopulationError> {
        let results = self.runtime.block_on(async {
            let handles = jobs.into_iter().map(tokio::task::spawn_blocking);
            futures::future::join_all(handles).await
        });
        collect(
            results
                .into_iter()
                .map(|joined| Some(joined.unwrap_or_else(|_| Err(panicked(name)))))
                .collect(),
        )
    }
}

//! The multi-threaded work-stealing pool.

mod injector;
mod worker;

pub use worker::PooledContext;

use super::Scheduler;
use super::builder::PoolBuilder;
use super::config::PoolConfig;
use super::task::{Task, as_root};
use crate::deque::{Stealer, WorkStealingDeque};
use crate::error::BuildError;
use crate::runtime::context::WorkHandle;
use injector::Injector;

use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// State shared by the pool handle and all of its workers.
pub(crate) struct Shared {
    /// Root tasks and parked workers.
    injector: Injector,

    /// One stealer per worker deque, indexed by worker id.
    stealers: Vec<Stealer<WorkHandle>>,

    config: PoolConfig,
}

/// A scheduler backed by a fixed set of continuously polling workers.
///
/// Each worker owns a [`WorkStealingDeque`]. Forks push onto the forking
/// worker's deque; idle workers steal from the other end of their
/// peers' deques. Root tasks enter through a shared injector queue and
/// the scheduling thread blocks until the root's value is published.
///
/// Dropping the pool signals shutdown and waits for every worker to
/// exit. Workers only exit once they find no work anywhere, so tasks in
/// flight always run to completion.
///
/// # Examples
///
/// ```
/// use forkpool::task::{Task, fork};
/// use forkpool::{BusyPool, Scheduler};
///
/// fn sum(lo: u64, hi: u64) -> Task<u64> {
///     Task::new(async move {
///         if hi - lo <= 1000 {
///             return (lo..hi).sum();
///         }
///
///         let mid = lo + (hi - lo) / 2;
///         let left = fork(sum(lo, mid)).await;
///         let right = fork(sum(mid, hi)).await;
///
///         left.await + right.await
///     })
/// }
///
/// let pool = BusyPool::with_workers(4).unwrap();
/// assert_eq!(pool.schedule(sum(0, 100_000)), 4_999_950_000);
/// ```
pub struct BusyPool {
    shared: Arc<Shared>,

    /// Join handles for worker threads.
    handles: Vec<JoinHandle<()>>,
}

impl BusyPool {
    /// Starts a pool with one worker per available logical CPU.
    pub fn new() -> Result<Self, BuildError> {
        PoolBuilder::new().build()
    }

    /// Starts a pool with `workers` worker threads.
    ///
    /// # Panics
    ///
    /// Panics if `workers == 0`.
    pub fn with_workers(workers: usize) -> Result<Self, BuildError> {
        PoolBuilder::new().worker_threads(workers).build()
    }

    /// Returns a builder for a custom pool.
    pub fn builder() -> PoolBuilder {
        PoolBuilder::new()
    }

    /// Spawns the workers described by a validated configuration.
    ///
    /// If a worker fails to spawn, the workers already started are shut
    /// down and joined before the error is returned.
    pub(crate) fn start(config: PoolConfig) -> Result<Self, BuildError> {
        let workers = config.worker_threads;

        let deques: Vec<WorkStealingDeque<WorkHandle>> = (0..workers)
            .map(|_| WorkStealingDeque::with_capacity(config.deque_capacity))
            .collect();

        let shared = Arc::new(Shared {
            injector: Injector::new(),
            stealers: deques.iter().map(WorkStealingDeque::stealer).collect(),
            config,
        });

        let mut pool = Self {
            shared,
            handles: Vec::with_capacity(workers),
        };

        for (id, deque) in deques.into_iter().enumerate() {
            let context = PooledContext::new(id, deque, pool.shared.clone());

            // On error, dropping `pool` stops and joins the workers
            // already running.
            let handle = pool.spawn(id, context)?;
            pool.handles.push(handle);
        }

        tracing::debug!(
            workers,
            idle_policy = ?pool.shared.config.idle_policy,
            "worker pool started"
        );

        Ok(pool)
    }

    fn spawn(&self, id: usize, context: PooledContext) -> io::Result<JoinHandle<()>> {
        let config = &self.shared.config;
        let mut builder = thread::Builder::new().name(format!("{}-{id}", config.thread_name_prefix));

        if let Some(size) = config.thread_stack_size {
            builder = builder.stack_size(size);
        }

        builder.spawn(move || context.run())
    }

    /// Returns the number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.shared.stealers.len()
    }

    /// Returns the configuration the pool was started with.
    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }
}

impl Scheduler for BusyPool {
    /// Runs `task` on the pool and blocks the calling thread until its
    /// value is published.
    ///
    /// Must not be called from inside a task.
    fn schedule<T: Send + 'static>(&self, task: Task<T>) -> T {
        let (future, work) = as_root(task).into_parts();

        self.shared.injector.push(work);

        future.wait()
    }
}

impl fmt::Debug for BusyPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusyPool")
            .field("workers", &self.worker_count())
            .field("config", &self.shared.config)
            .finish()
    }
}

impl Drop for BusyPool {
    /// Signals shutdown and waits for every worker to exit.
    fn drop(&mut self) {
        self.shared.injector.shutdown();

        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }

        tracing::debug!("worker pool stopped");
    }
}

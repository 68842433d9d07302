use crate::runtime::context::WorkHandle;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Longest a parked worker sleeps before looking for work again.
const PARK_TIMEOUT: Duration = Duration::from_millis(1);

/// Entry queue for root tasks and the parking lot of idle workers.
///
/// Root tasks come from threads outside the pool, which cannot push
/// into a worker deque. Workers drain this queue after their own deque
/// and before stealing from peers.
///
/// Parked workers are woken when a root task arrives, when a worker
/// pushes work while someone sleeps, and on shutdown. Parking is a
/// timed wait, so a missed notification only delays a worker briefly.
pub(crate) struct Injector {
    /// Root tasks waiting for a worker.
    queue: Mutex<VecDeque<WorkHandle>>,

    /// Number of workers currently parked.
    sleepers: AtomicUsize,

    /// Lock paired with `condvar`.
    lock: Mutex<()>,

    /// Condition variable used to wake parked workers.
    condvar: Condvar,

    /// Indicates whether the pool is shutting down.
    shutdown: AtomicBool,
}

impl Injector {
    /// Creates a new empty injector.
    pub(crate) fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            sleepers: AtomicUsize::new(0),
            lock: Mutex::new(()),
            condvar: Condvar::new(),
            shutdown: AtomicBool::new(false),
        }
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<WorkHandle>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a root task and wakes a parked worker.
    pub(crate) fn push(&self, work: WorkHandle) {
        self.queue().push_back(work);
        self.notify_one();
    }

    /// Takes the oldest root task, if any.
    pub(crate) fn pop(&self) -> Option<WorkHandle> {
        self.queue().pop_front()
    }

    /// Wakes one parked worker, if any.
    pub(crate) fn notify_one(&self) {
        if self.sleepers.load(Ordering::Acquire) > 0 {
            let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.condvar.notify_one();
        }
    }

    /// Signals shutdown and wakes all parked workers.
    ///
    /// Workers keep running until they find no work anywhere, so
    /// nothing in flight is abandoned.
    pub(crate) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.condvar.notify_all();
    }

    /// Returns `true` once shutdown was requested.
    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Parks the current worker until it is notified or the timeout
    /// expires.
    ///
    /// Returns immediately if shutdown was requested or a root task is
    /// waiting.
    pub(crate) fn park(&self) {
        let guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.sleepers.fetch_add(1, Ordering::AcqRel);

        if !self.is_shutdown() && self.queue().is_empty() {
            let _ = self
                .condvar
                .wait_timeout(guard, PARK_TIMEOUT)
                .unwrap_or_else(PoisonError::into_inner);
        }

        self.sleepers.fetch_sub(1, Ordering::AcqRel);
    }
}

use super::Shared;
use crate::deque::{Steal, WorkStealingDeque};
use crate::runtime::config::IdlePolicy;
use crate::runtime::context::{ExecutionContext, WorkHandle};

use crossbeam_utils::Backoff;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use std::cell::RefCell;
use std::sync::Arc;
use std::thread;

/// Seed mixed with the worker index for the victim shuffle.
const RNG_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

/// The execution context of one pool worker.
///
/// Forks push continuations onto the worker's own deque. When the deque
/// runs dry, the worker takes root tasks from the injector and then
/// steals from its peers, visiting them in a fresh random order on
/// every sweep.
///
/// The execution order of [`pop`](ExecutionContext::pop) is:
/// 1. Pop from the local deque
/// 2. Take a root task from the injector
/// 3. Steal from other workers
/// 4. Back off, then spin or park according to the idle policy
pub struct PooledContext {
    /// Index of this worker.
    id: usize,

    /// This worker's deque. Peers hold its stealer.
    deque: WorkStealingDeque<WorkHandle>,

    /// State shared with the pool and every other worker.
    shared: Arc<Shared>,

    rng: RefCell<SmallRng>,

    /// Indices of the peers, reshuffled before every sweep.
    victims: RefCell<Vec<usize>>,
}

impl PooledContext {
    pub(crate) fn new(id: usize, deque: WorkStealingDeque<WorkHandle>, shared: Arc<Shared>) -> Self {
        let victims = (0..shared.stealers.len()).filter(|&peer| peer != id).collect();

        Self {
            id,
            deque,
            shared,
            rng: RefCell::new(SmallRng::seed_from_u64(RNG_SEED ^ id as u64)),
            victims: RefCell::new(victims),
        }
    }

    /// Returns the index of this worker.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Runs the worker loop until shutdown.
    pub(crate) fn run(self) {
        tracing::debug!(worker = self.id, "worker started");

        while let Some(work) = self.pop() {
            work.resume(&self);
        }

        tracing::debug!(worker = self.id, "worker exited");
    }

    /// Tries every peer once, in random order.
    ///
    /// Reports [`Steal::Contended`] if nothing was stolen but some race
    /// was lost, in which case another sweep may succeed.
    fn steal_sweep(&self) -> Steal<WorkHandle> {
        let mut victims = self.victims.borrow_mut();
        victims.shuffle(&mut *self.rng.borrow_mut());

        let mut contended = false;

        for &victim in victims.iter() {
            match self.shared.stealers[victim].steal() {
                Steal::Success(work) => {
                    tracing::trace!(worker = self.id, victim, "stole work");
                    return Steal::Success(work);
                }
                Steal::Contended => contended = true,
                Steal::Empty => {}
            }
        }

        if contended {
            Steal::Contended
        } else {
            Steal::Empty
        }
    }

    fn idle(&self, backoff: &Backoff) {
        if !backoff.is_completed() {
            backoff.snooze();
            return;
        }

        match self.shared.config.idle_policy {
            IdlePolicy::Spin => thread::yield_now(),
            IdlePolicy::Park => self.shared.injector.park(),
        }
    }
}

impl ExecutionContext for PooledContext {
    fn push(&self, work: WorkHandle) {
        self.deque.push(work);
        self.shared.injector.notify_one();
    }

    /// Finds the next work for this worker.
    ///
    /// Only returns `None` once shutdown was requested and a full sweep
    /// found every queue empty.
    fn pop(&self) -> Option<WorkHandle> {
        let backoff = Backoff::new();

        loop {
            if let Some(work) = self.deque.pop() {
                return Some(work);
            }

            if let Some(work) = self.shared.injector.pop() {
                return Some(work);
            }

            match self.steal_sweep() {
                Steal::Success(work) => return Some(work),
                Steal::Contended => {
                    backoff.spin();
                    continue;
                }
                Steal::Empty => {}
            }

            if self.shared.injector.is_shutdown() {
                return None;
            }

            self.idle(&backoff);
        }
    }
}

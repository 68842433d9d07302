//! Single-threaded, deterministic scheduling.

use super::Scheduler;
use super::context::{ExecutionContext, WorkHandle};
use super::task::{Task, as_root};

use std::cell::RefCell;

/// An execution context that runs everything on the current thread.
///
/// Pushed continuations are kept on a stack and popped most recent
/// first, so a fork behaves like a nested call: the child runs to
/// completion, then the parent continues where it forked.
#[derive(Debug, Default)]
pub struct ImmediateContext {
    stack: RefCell<Vec<WorkHandle>>,
}

impl ImmediateContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resumes `work`, then every continuation it leaves behind.
    pub fn run(&self, work: WorkHandle) {
        work.resume(self);

        while let Some(work) = self.pop() {
            work.resume(self);
        }
    }
}

impl ExecutionContext for ImmediateContext {
    fn push(&self, work: WorkHandle) {
        self.stack.borrow_mut().push(work);
    }

    fn pop(&self) -> Option<WorkHandle> {
        self.stack.borrow_mut().pop()
    }
}

/// A scheduler that runs a task tree sequentially on the calling
/// thread.
///
/// Tasks resume in strict pre-order of the fork tree and every join is
/// already satisfied when it is reached. The result is the same as a
/// plain depth-first recursive evaluation, which makes this scheduler
/// the reference for checking task bodies independently of any
/// parallel policy.
///
/// # Examples
///
/// ```
/// use forkpool::{ImmediateScheduler, Scheduler, Task};
///
/// let value = ImmediateScheduler::new().schedule(Task::new(async { 7 }));
/// assert_eq!(value, 7);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateScheduler;

impl ImmediateScheduler {
    /// Creates the scheduler.
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for ImmediateScheduler {
    fn schedule<T: Send + 'static>(&self, task: Task<T>) -> T {
        let (future, work) = as_root(task).into_parts();

        ImmediateContext::new().run(work);

        future.take()
    }
}

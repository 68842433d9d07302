//! Tasks, futures and the fork/join operators.
//!
//! A [`Task`] is one forked call: an `async` body in its own frame plus
//! the promise its result is published into. Inside a running task,
//! [`fork`] starts a child and hands back a [`Future`] for its result,
//! and awaiting that future is the join.
//!
//! ```
//! use forkpool::task::{Task, call, fork};
//! use forkpool::{ImmediateScheduler, Scheduler};
//!
//! fn fib(n: u64) -> Task<u64> {
//!     Task::new(async move {
//!         if n < 2 {
//!             return n;
//!         }
//!
//!         let a = fork(fib(n - 1)).await;
//!         let b = call(fib(n - 2)).await;
//!
//!         a.await + b
//!     })
//! }
//!
//! assert_eq!(ImmediateScheduler::new().schedule(fib(10)), 55);
//! ```

mod fork;
mod future;

pub use fork::{Fork, call, fork};
pub use future::Future;

use super::context::WorkHandle;
use super::frame::{self, FrameHandle};
use super::promise::make_promise;
use crate::allocator::{FrameAllocator, Global};

use std::fmt;

/// Whether a task is a forked child or a scheduler entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// A child forked from inside another task.
    Fork,

    /// A top-level task handed to a scheduler. Only a root future may
    /// block the thread that waits on it.
    Root,
}

/// One forked call: a suspended body and the slot for its result.
///
/// Creating a task allocates its frame and promise but runs nothing.
/// The body starts when the task is forked from another task or
/// scheduled as a root.
pub struct Task<T> {
    /// The body, not yet resumed.
    frame: FrameHandle,

    /// Reader end of the promise.
    future: Future<T>,

    kind: Kind,
}

impl<T: Send + 'static> Task<T> {
    /// Creates a task whose frame and promise live on the process heap.
    pub fn new<F>(body: F) -> Self
    where
        F: std::future::Future<Output = T> + Send + 'static,
    {
        Self::new_in(body, Global)
    }

    /// Creates a task whose frame and promise are allocated through
    /// `allocator`.
    pub fn new_in<F, A>(body: F, allocator: A) -> Self
    where
        F: std::future::Future<Output = T> + Send + 'static,
        A: FrameAllocator,
    {
        let (writer, reader) = make_promise::<T, A>(&allocator);
        let frame = frame::allocate(body, writer, &allocator);

        Self {
            frame,
            future: Future::new(reader),
            kind: Kind::Fork,
        }
    }
}

impl<T> Task<T> {
    /// Relabels this task as a root task.
    pub fn as_root(mut self) -> Self {
        self.kind = Kind::Root;
        self
    }

    /// Returns the task kind.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Returns `true` for a root task.
    pub fn is_root(&self) -> bool {
        self.kind == Kind::Root
    }

    /// Splits the task into the future for its result and the work that
    /// runs its body.
    ///
    /// Used by schedulers and custom execution contexts. The returned
    /// future may block a thread only if the task was a root.
    pub fn into_parts(self) -> (Future<T>, WorkHandle) {
        let Self {
            frame,
            mut future,
            kind,
        } = self;

        future.set_root(kind == Kind::Root);

        (future, WorkHandle::new(frame))
    }

    pub(crate) fn into_child(self) -> (FrameHandle, Future<T>) {
        (self.frame, self.future)
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("kind", &self.kind)
            .field("frame", &self.frame)
            .finish()
    }
}

/// Relabels `task` as a root task so it can be handed to a scheduler.
///
/// This is a value-level change only; nothing runs.
pub fn as_root<T>(task: Task<T>) -> Task<T> {
    task.as_root()
}

use crate::diagnostics::fail_fast;
use crate::runtime::context::{self, Suspend};
use crate::runtime::promise::{PromiseRef, Waiter};

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::thread;

/// The result of a forked task.
///
/// Awaiting a `Future` inside a task is the join: if the child already
/// published its value the task continues immediately, otherwise it is
/// parked until the child completes. The value can be read once; the
/// promise is released as soon as it is.
///
/// Only a future taken from a root task may block a thread, through
/// [`wait`](Self::wait).
pub struct Future<T> {
    /// `None` once the value was taken.
    promise: Option<PromiseRef<T>>,

    root: bool,
}

impl<T> Unpin for Future<T> {}

impl<T> Future<T> {
    pub(crate) fn new(promise: PromiseRef<T>) -> Self {
        Self {
            promise: Some(promise),
            root: false,
        }
    }

    pub(crate) fn set_root(&mut self, root: bool) {
        self.root = root;
    }

    fn promise(&self) -> &PromiseRef<T> {
        match &self.promise {
            Some(promise) => promise,
            None => fail_fast!("future used after its value was taken"),
        }
    }

    /// Returns `true` once the value has been published.
    pub fn is_ready(&self) -> bool {
        self.promise().is_ready()
    }

    /// Takes the published value.
    ///
    /// Calling this on a future that is not ready is a contract
    /// violation.
    pub fn take(mut self) -> T {
        self.take_value()
    }

    fn take_value(&mut self) -> T {
        let value = self.promise().take();

        match value {
            Some(value) => {
                self.promise = None;
                value
            }
            None => fail_fast!("took the value of a future that is not ready"),
        }
    }

    /// Blocks the current thread until the value is published, then
    /// returns it.
    ///
    /// Only allowed on the future of a root task, and never from a
    /// thread that is resuming tasks: a worker that blocks stops
    /// stealing and can starve the pool.
    pub fn wait(mut self) -> T {
        if !self.root {
            fail_fast!("only the future of a root task may block a thread");
        }

        if context::in_scheduler() {
            fail_fast!("a worker thread blocked on a future");
        }

        let promise = self.promise();

        if !promise.is_ready()
            && promise
                .header()
                .park(Waiter::Thread(thread::current()))
                .is_ok()
        {
            while !promise.is_ready() {
                thread::park();
            }
        }

        self.take_value()
    }
}

impl<T> std::future::Future for Future<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<T> {
        let this = self.get_mut();
        let promise = this.promise();

        if promise.is_ready() {
            return Poll::Ready(this.take_value());
        }

        context::suspend(Suspend::Join(promise.header_ptr()));
        Poll::Pending
    }
}

impl<T> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ready = self.promise.as_ref().map(|promise| promise.is_ready());

        f.debug_struct("Future")
            .field("ready", &ready)
            .field("root", &self.root)
            .finish()
    }
}

use super::{Future, Task};
use crate::diagnostics::fail_fast;
use crate::runtime::context::{self, Suspend};
use crate::runtime::frame::FrameHandle;

use std::fmt;
use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll};

/// The fork point returned by [`fork`].
///
/// Awaiting it suspends the current task, starts the child on the same
/// worker and resumes the parent later (possibly on another worker,
/// if its continuation was stolen) with the child's [`Future`].
#[must_use = "a fork does nothing unless awaited"]
pub struct Fork<T> {
    /// The child body, handed to the scheduler on first poll.
    child: FrameHandle,

    future: Option<Future<T>>,
}

impl<T> Unpin for Fork<T> {}

impl<T> std::future::Future for Fork<T> {
    type Output = Future<T>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Future<T>> {
        let this = self.get_mut();

        if this.child.is_valid() {
            context::suspend(Suspend::Fork(mem::take(&mut this.child)));
            return Poll::Pending;
        }

        match this.future.take() {
            Some(future) => Poll::Ready(future),
            None => fail_fast!("fork polled after completion"),
        }
    }
}

impl<T> fmt::Debug for Fork<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fork")
            .field("started", &!self.child.is_valid())
            .finish()
    }
}

/// Forks `task` from the running task.
///
/// Must be awaited inside a task body. The child runs first on the
/// current worker; the parent's continuation becomes available to idle
/// workers in the meantime. The awaited value is the child's
/// [`Future`]; awaiting that is the join.
///
/// Forking a root task is a contract violation: roots go to a
/// scheduler.
pub fn fork<T>(task: Task<T>) -> Fork<T> {
    if task.is_root() {
        fail_fast!("forked a root task; root tasks must be scheduled");
    }

    let (child, future) = task.into_child();

    Fork {
        child,
        future: Some(future),
    }
}

/// Forks `task` and joins it immediately.
///
/// Useful for the last child of a fork group: no other task will get a
/// chance to steal the parent in between.
pub async fn call<T>(task: Task<T>) -> T {
    fork(task).await.await
}

//! Execution contexts and the frame resumption loop.
//!
//! A task body can only suspend at two points: a [`fork`](super::task::fork)
//! and an `.await` on a [`Future`](super::task::Future) whose value is not
//! published yet. Both post a request into a thread-local slot before
//! returning `Poll::Pending`; [`WorkHandle::resume`] consumes that request
//! right after the poll and acts on it:
//!
//! - **fork**: the parent's continuation is pushed to the current
//!   [`ExecutionContext`] and the child runs next on the same thread.
//!   Idle workers steal continuations, never children.
//! - **join**: the parent parks inside the child's promise. When the
//!   child publishes its value, whichever thread completed it resumes
//!   the parent immediately.

use super::frame::{FrameHandle, Resumed};
use super::promise::{PromiseHeader, Waiter};
use crate::diagnostics::fail_fast;

use std::cell::Cell;
use std::fmt;
use std::ptr::NonNull;

thread_local! {
    /// Suspension request posted by the frame being polled.
    static SUSPEND: Cell<Option<Suspend>> = const { Cell::new(None) };

    /// Number of resumption loops running on this thread.
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Why a frame returned `Poll::Pending`.
pub(crate) enum Suspend {
    /// The frame forked a child; the child should run next.
    Fork(FrameHandle),

    /// The frame awaits the promise behind this header.
    Join(NonNull<PromiseHeader>),
}

/// Posts a suspension request for the frame being polled.
///
/// # Panics
///
/// Aborts if a request is already pending: a frame can suspend for one
/// reason at a time.
pub(crate) fn suspend(request: Suspend) {
    if let Some(_previous) = SUSPEND.replace(Some(request)) {
        fail_fast!("a task suspended twice in a single poll");
    }
}

fn take_request() -> Option<Suspend> {
    SUSPEND.take()
}

/// Returns `true` if the current thread is resuming a frame.
pub(crate) fn in_scheduler() -> bool {
    DEPTH.get() > 0
}

/// Marks the current thread as running a resumption loop.
struct Entered;

impl Entered {
    fn enter() -> Self {
        DEPTH.set(DEPTH.get() + 1);
        Entered
    }
}

impl Drop for Entered {
    fn drop(&mut self) {
        DEPTH.set(DEPTH.get() - 1);
    }
}

/// Where forked work goes and where idle threads look for it.
///
/// `push` is called with the continuation of a task that just forked.
/// `pop` returns the next piece of work to resume, or `None` when the
/// caller should stop.
///
/// Implementations are used from a single thread at a time: the one
/// driving [`WorkHandle::resume`].
pub trait ExecutionContext {
    /// Records work that is ready to resume.
    fn push(&self, work: WorkHandle);

    /// Returns the next work to resume.
    fn pop(&self) -> Option<WorkHandle>;
}

/// A resumable unit of work held by an [`ExecutionContext`].
///
/// A work handle owns one suspended frame. The context type it belongs
/// to is chosen at resumption time, so one handle type serves every
/// context.
pub struct WorkHandle {
    frame: FrameHandle,
}

impl WorkHandle {
    pub(crate) fn new(frame: FrameHandle) -> Self {
        Self { frame }
    }

    /// Returns the frame this work resumes.
    pub fn into_frame(self) -> FrameHandle {
        self.frame
    }

    /// Resumes the frame and every frame it unblocks.
    ///
    /// Forks push continuations into `context`. Completions that release
    /// a parked parent continue with that parent on this thread. Returns
    /// when the chain reaches a frame that suspends on a join which is
    /// not satisfied yet, or a completion nobody was waiting for.
    pub fn resume(self, context: &dyn ExecutionContext) {
        let _entered = Entered::enter();
        let mut next = Some(self.frame);

        while let Some(frame) = next.take() {
            match frame.resume() {
                Resumed::Done(completion) => {
                    if take_request().is_some() {
                        fail_fast!("a task completed with a pending suspension");
                    }

                    drop(frame);

                    match completion.publish() {
                        Some(Waiter::Frame(parent)) => {
                            tracing::trace!("join satisfied, resuming parent");
                            next = Some(parent);
                        }
                        Some(Waiter::Thread(thread)) => thread.unpark(),
                        None => {}
                    }
                }
                Resumed::Pending => match take_request() {
                    Some(Suspend::Fork(child)) => {
                        tracing::trace!("fork");
                        context.push(WorkHandle::new(frame));
                        next = Some(child);
                    }
                    Some(Suspend::Join(promise)) => {
                        // SAFETY: the awaited future lives inside `frame`,
                        // and keeps the promise alive until it parks.
                        let promise = unsafe { promise.as_ref() };

                        match promise.park(Waiter::Frame(frame)) {
                            Ok(()) => tracing::trace!("join pending, parent parked"),
                            Err(Waiter::Frame(frame)) => next = Some(frame),
                            Err(Waiter::Thread(_)) => fail_fast!("frame waiter turned into a thread"),
                        }
                    }
                    None => fail_fast!(
                        "a task suspended outside of fork or join; \
                         only forkpool futures may be awaited in a task"
                    ),
                },
            }
        }
    }
}

impl From<FrameHandle> for WorkHandle {
    fn from(frame: FrameHandle) -> Self {
        Self::new(frame)
    }
}

impl fmt::Debug for WorkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkHandle")
            .field("frame", &self.frame)
            .finish()
    }
}

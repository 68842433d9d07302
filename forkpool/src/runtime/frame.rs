//! Suspended frames and their owning handle.
//!
//! A frame is a single allocation holding a task's `async` body, the
//! writer end of its promise and the allocator that produced it, behind
//! a small type-erased header ([`SuspendedFrame`]). The header carries a
//! static vtable so the scheduler can resume and destroy any frame
//! without knowing its body type.

use super::promise::{Completion, PromiseRef};
use super::state::{DONE, RUNNING, SUSPENDED};
use crate::allocator::{FrameAllocator, Storage};
use crate::diagnostics::{AbortOnUnwind, contract_assert, fail_fast};

use std::alloc::Layout;
use std::cell::UnsafeCell;
use std::fmt;
use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::pin::Pin;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicU8, Ordering};
use std::task::{Context, Poll, Waker};

/// Type-erased operations on a frame.
struct FrameVtable {
    /// Polls the body once.
    resume: unsafe fn(NonNull<SuspendedFrame>) -> Resumed,

    /// Drops the frame contents and releases its memory.
    destroy: unsafe fn(NonNull<SuspendedFrame>),
}

/// Outcome of resuming a frame.
pub(crate) enum Resumed {
    /// The body suspended at a fork or join point.
    Pending,

    /// The body finished. Its value is stored in the promise, which must
    /// be published once the frame is destroyed.
    Done(Completion),
}

/// The header of a paused computation.
///
/// Reached through a [`FrameHandle`]; never owned directly.
#[repr(C)]
pub struct SuspendedFrame {
    vtable: &'static FrameVtable,
    state: AtomicU8,
}

impl SuspendedFrame {
    /// Returns `true` once the body has run to completion.
    pub fn is_done(&self) -> bool {
        self.state.load(Ordering::Acquire) == DONE
    }

    /// Returns `true` while a worker is polling the body.
    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) == RUNNING
    }
}

impl fmt::Debug for SuspendedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state.load(Ordering::Acquire) {
            SUSPENDED => "suspended",
            RUNNING => "running",
            _ => "done",
        };

        f.debug_struct("SuspendedFrame")
            .field("state", &state)
            .finish()
    }
}

/// Full layout of a frame allocation.
#[repr(C)]
struct FrameCell<F: Future, A> {
    /// Must stay first: handles point at it.
    header: SuspendedFrame,

    /// `None` once the body has completed.
    body: UnsafeCell<Option<F>>,

    /// Writer end of the result slot, taken on completion.
    promise: UnsafeCell<Option<PromiseRef<F::Output>>>,

    /// The strategy that allocated this cell.
    allocator: ManuallyDrop<A>,
}

/// Allocates a frame for `body` through `allocator`.
///
/// The frame starts suspended; its first resumption polls `body` for
/// the first time.
pub(crate) fn allocate<F, A>(body: F, promise: PromiseRef<F::Output>, allocator: &A) -> FrameHandle
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
    A: FrameAllocator,
{
    let layout = Layout::new::<FrameCell<F, A>>();
    let cell = allocator
        .allocate(Storage::Frame, layout)
        .cast::<FrameCell<F, A>>();

    // SAFETY: the block is fresh and sized for a `FrameCell<F, A>`.
    unsafe {
        cell.as_ptr().write(FrameCell {
            header: SuspendedFrame {
                vtable: const {
                    &FrameVtable {
                        resume: resume_raw::<F, A>,
                        destroy: destroy_raw::<F, A>,
                    }
                },
                state: AtomicU8::new(SUSPENDED),
            },
            body: UnsafeCell::new(Some(body)),
            promise: UnsafeCell::new(Some(promise)),
            allocator: ManuallyDrop::new(allocator.clone()),
        });
    }

    FrameHandle {
        frame: Some(cell.cast()),
    }
}

/// Polls the body of a `FrameCell<F, A>` once.
///
/// # Safety
///
/// `frame` must point at a live `FrameCell<F, A>` that the caller has
/// exclusive access to.
unsafe fn resume_raw<F, A>(frame: NonNull<SuspendedFrame>) -> Resumed
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
    A: FrameAllocator,
{
    // SAFETY: guaranteed by the caller.
    let cell = unsafe { frame.cast::<FrameCell<F, A>>().as_ref() };
    // SAFETY: the RUNNING state gives this thread exclusive access.
    let body = unsafe { &mut *cell.body.get() };

    let Some(future) = body.as_mut() else {
        fail_fast!("resumed a frame whose body already completed");
    };

    // SAFETY: the body lives inside a heap block that never moves and is
    // only dropped in place.
    let future = unsafe { Pin::new_unchecked(future) };
    let mut cx = Context::from_waker(Waker::noop());

    match future.poll(&mut cx) {
        Poll::Pending => {
            cell.header.state.store(SUSPENDED, Ordering::Release);
            Resumed::Pending
        }
        Poll::Ready(value) => {
            *body = None;

            // SAFETY: exclusive access, as above.
            let Some(promise) = (unsafe { (*cell.promise.get()).take() }) else {
                fail_fast!("frame completed without a promise");
            };

            cell.header.state.store(DONE, Ordering::Release);
            Resumed::Done(promise.fulfil(value))
        }
    }
}

/// Drops a `FrameCell<F, A>` in place and releases its block.
///
/// # Safety
///
/// `frame` must point at a live `FrameCell<F, A>` that is never used
/// again.
unsafe fn destroy_raw<F, A>(frame: NonNull<SuspendedFrame>)
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
    A: FrameAllocator,
{
    let cell = frame.cast::<FrameCell<F, A>>().as_ptr();

    // SAFETY: guaranteed by the caller. The allocator is moved out before
    // the cell is dropped so it can release the block afterwards.
    unsafe {
        let allocator = ManuallyDrop::take(&mut (*cell).allocator);
        ptr::drop_in_place(cell);
        allocator.deallocate(Storage::Frame, frame.cast(), Layout::new::<FrameCell<F, A>>());
    }
}

/// Exclusive owner of one suspended frame.
///
/// A handle is either empty (the default) or owns exactly one frame.
/// Moving the handle moves ownership; dropping a non-empty handle
/// destroys its frame exactly once. [`release`](Self::release) hands
/// the raw frame to another owner without destroying it.
///
/// Dereferencing an empty handle is a contract violation.
pub struct FrameHandle {
    frame: Option<NonNull<SuspendedFrame>>,
}

// SAFETY: frames are only built from `Send` bodies, outputs and
// allocators, and a handle is the unique owner of its frame.
unsafe impl Send for FrameHandle {}

impl FrameHandle {
    /// Creates an empty handle.
    pub const fn empty() -> Self {
        Self { frame: None }
    }

    /// Takes ownership of a frame previously given up by
    /// [`release`](Self::release).
    ///
    /// # Safety
    ///
    /// `frame` must come from `release` and must not be owned by any
    /// other handle.
    pub unsafe fn from_raw(frame: NonNull<SuspendedFrame>) -> Self {
        Self { frame: Some(frame) }
    }

    /// Returns `true` if the handle owns a frame.
    pub fn is_valid(&self) -> bool {
        self.frame.is_some()
    }

    /// Gives up ownership of the frame without destroying it.
    ///
    /// The handle is left empty. The caller becomes responsible for
    /// eventually passing the pointer back to [`from_raw`](Self::from_raw)
    /// so the frame is destroyed.
    pub fn release(&mut self) -> Option<NonNull<SuspendedFrame>> {
        self.frame.take()
    }

    /// Polls the frame's body once on the current thread.
    pub(crate) fn resume(&self) -> Resumed {
        let Some(frame) = self.frame else {
            fail_fast!("resumed an empty frame handle");
        };

        // SAFETY: the handle owns a live frame.
        let header = unsafe { frame.as_ref() };
        let previous = header.state.swap(RUNNING, Ordering::AcqRel);

        contract_assert!(
            previous == SUSPENDED,
            "resumed a frame that was not suspended (state {previous})"
        );

        let _guard = AbortOnUnwind;

        // SAFETY: RUNNING grants exclusive access to the frame body.
        unsafe { (header.vtable.resume)(frame) }
    }
}

impl Default for FrameHandle {
    fn default() -> Self {
        Self::empty()
    }
}

impl Deref for FrameHandle {
    type Target = SuspendedFrame;

    fn deref(&self) -> &SuspendedFrame {
        match self.frame {
            // SAFETY: the handle owns a live frame.
            Some(frame) => unsafe { frame.as_ref() },
            None => fail_fast!("dereferenced an empty frame handle"),
        }
    }
}

impl fmt::Debug for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.frame {
            Some(_) => f.debug_tuple("FrameHandle").field(&**self).finish(),
            None => f.write_str("FrameHandle(empty)"),
        }
    }
}

impl Drop for FrameHandle {
    fn drop(&mut self) {
        let Some(frame) = self.frame.take() else {
            return;
        };

        // SAFETY: the handle owned a live frame.
        let header = unsafe { frame.as_ref() };

        contract_assert!(
            header.state.load(Ordering::Acquire) != RUNNING,
            "destroyed a frame while it was running"
        );

        // SAFETY: this handle was the unique owner.
        unsafe { (header.vtable.destroy)(frame) }
    }
}

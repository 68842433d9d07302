//! Result slots shared between a task and its future.
//!
//! A promise is allocated once per task and referenced exactly twice:
//! by the task's frame (the writer) and by its [`Future`](super::task::Future)
//! (the reader). Whichever reference drops last releases the block.
//!
//! Publication and parking form a small hand-off protocol on the
//! promise state:
//!
//! ```text
//!  EMPTY ──park──▶ PARKED
//!    │                │
//!  publish         publish (hands the waiter to the publisher)
//!    ▼                ▼
//!  READY ◀────────────┘
//! ```
//!
//! The publisher swaps the state to `READY` with release ordering after
//! writing the value; readers check readiness with acquire loads. This is
//! the edge that makes every joined value visible to the joining task.

use super::frame::FrameHandle;
use super::state::{EMPTY, PARKED, READY};
use crate::allocator::{FrameAllocator, Storage};
use crate::diagnostics::{contract_assert, fail_fast};

use std::alloc::Layout;
use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::mem::{self, ManuallyDrop};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicUsize, Ordering, fence};
use std::thread::Thread;

/// Who is waiting for a promise to be published.
pub(crate) enum Waiter {
    /// A parent frame suspended at a join point. The publisher resumes
    /// it on its own worker.
    Frame(FrameHandle),

    /// An external thread blocked on a root future.
    Thread(Thread),
}

/// Type-independent part of a promise.
#[repr(C)]
pub(crate) struct PromiseHeader {
    /// One of `EMPTY`, `PARKED`, `READY`.
    state: AtomicUsize,

    /// Number of live references (starts at 2).
    refs: AtomicUsize,

    /// Parked waiter. Written by the reader before `PARKED` is set, taken
    /// by the publisher after observing `PARKED`.
    waiter: UnsafeCell<Option<Waiter>>,

    /// Drops the full cell and releases its block.
    release: unsafe fn(NonNull<PromiseHeader>),
}

impl PromiseHeader {
    /// Returns `true` once the value has been published.
    pub(crate) fn is_ready(&self) -> bool {
        self.state.load(Ordering::Acquire) == READY
    }

    /// Parks `waiter` until the value is published.
    ///
    /// Returns the waiter back if the value is already available, in
    /// which case the caller must continue on its own.
    pub(crate) fn park(&self, waiter: Waiter) -> Result<(), Waiter> {
        // SAFETY: while the state is EMPTY only the single reader touches
        // the slot.
        unsafe { *self.waiter.get() = Some(waiter) };

        match self
            .state
            .compare_exchange(EMPTY, PARKED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(()),
            Err(READY) => {
                // SAFETY: the publisher saw EMPTY and never reads the slot.
                let waiter = unsafe { (*self.waiter.get()).take() };

                match waiter {
                    Some(waiter) => Err(waiter),
                    None => fail_fast!("parked waiter vanished"),
                }
            }
            Err(_) => fail_fast!("promise joined twice"),
        }
    }
}

/// Drops one reference to a promise, releasing it if it was the last.
///
/// # Safety
///
/// `header` must be a live promise and the caller must own one of its
/// references.
unsafe fn release_ref(header: NonNull<PromiseHeader>) {
    // SAFETY: the caller owns a reference, so the header is alive.
    let refs = unsafe { &header.as_ref().refs };

    if refs.fetch_sub(1, Ordering::Release) != 1 {
        return;
    }

    fence(Ordering::Acquire);

    // SAFETY: this was the last reference.
    unsafe { (header.as_ref().release)(header) }
}

/// A promise with its value slot.
#[repr(C)]
struct PromiseValue<T> {
    header: PromiseHeader,
    value: UnsafeCell<Option<T>>,
}

/// Full layout of a promise allocation.
#[repr(C)]
struct PromiseCell<T, A> {
    inner: PromiseValue<T>,
    allocator: ManuallyDrop<A>,
}

/// Drops a `PromiseCell<T, A>` and releases its block.
///
/// # Safety
///
/// `header` must be a `PromiseCell<T, A>` with no reference left.
unsafe fn release_raw<T, A: FrameAllocator>(header: NonNull<PromiseHeader>) {
    let cell = header.cast::<PromiseCell<T, A>>().as_ptr();

    // SAFETY: guaranteed by the caller.
    unsafe {
        contract_assert!(
            (*(*cell).inner.header.waiter.get()).is_none(),
            "released a promise with a parked waiter"
        );

        let allocator = ManuallyDrop::take(&mut (*cell).allocator);
        ptr::drop_in_place(cell);
        allocator.deallocate(Storage::Promise, header.cast(), Layout::new::<PromiseCell<T, A>>());
    }
}

/// One of the two references to a promise.
pub(crate) struct PromiseRef<T> {
    ptr: NonNull<PromiseValue<T>>,
    _marker: PhantomData<T>,
}

// SAFETY: the value crosses threads once, from writer to reader, and the
// header is only accessed atomically or under the hand-off protocol.
unsafe impl<T: Send> Send for PromiseRef<T> {}

impl<T> Unpin for PromiseRef<T> {}

/// Allocates a promise and returns its writer and reader references.
pub(crate) fn make_promise<T, A>(allocator: &A) -> (PromiseRef<T>, PromiseRef<T>)
where
    T: Send + 'static,
    A: FrameAllocator,
{
    let layout = Layout::new::<PromiseCell<T, A>>();
    let cell = allocator
        .allocate(Storage::Promise, layout)
        .cast::<PromiseCell<T, A>>();

    // SAFETY: the block is fresh and sized for a `PromiseCell<T, A>`.
    unsafe {
        cell.as_ptr().write(PromiseCell {
            inner: PromiseValue {
                header: PromiseHeader {
                    state: AtomicUsize::new(EMPTY),
                    refs: AtomicUsize::new(2),
                    waiter: UnsafeCell::new(None),
                    release: release_raw::<T, A>,
                },
                value: UnsafeCell::new(None),
            },
            allocator: ManuallyDrop::new(allocator.clone()),
        });
    }

    let ptr = cell.cast::<PromiseValue<T>>();

    (
        PromiseRef {
            ptr,
            _marker: PhantomData,
        },
        PromiseRef {
            ptr,
            _marker: PhantomData,
        },
    )
}

impl<T> PromiseRef<T> {
    pub(crate) fn header(&self) -> &PromiseHeader {
        // SAFETY: a reference keeps the promise alive.
        unsafe { &self.ptr.as_ref().header }
    }

    pub(crate) fn header_ptr(&self) -> NonNull<PromiseHeader> {
        self.ptr.cast()
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.header().is_ready()
    }

    /// Stores the value without publishing it.
    ///
    /// Consumes the writer reference; the returned [`Completion`]
    /// publishes the value and drops the reference.
    pub(crate) fn fulfil(self, value: T) -> Completion {
        // SAFETY: the reader does not touch the slot before READY.
        unsafe { *self.ptr.as_ref().value.get() = Some(value) };

        let header = self.header_ptr();
        mem::forget(self);

        Completion { header }
    }

    /// Takes the published value.
    ///
    /// Returns `None` if the value is not published yet or was already
    /// taken.
    pub(crate) fn take(&self) -> Option<T> {
        if !self.is_ready() {
            return None;
        }

        // SAFETY: after READY the writer is gone and the reader is the only
        // one touching the slot.
        unsafe { (*self.ptr.as_ref().value.get()).take() }
    }
}

impl<T> Drop for PromiseRef<T> {
    fn drop(&mut self) {
        // SAFETY: this reference is owned and not used again.
        unsafe { release_ref(self.header_ptr()) }
    }
}

/// A written but unpublished promise value.
///
/// Holds the writer's reference until [`publish`](Self::publish).
#[must_use = "a completion must be published or the waiter is lost"]
pub(crate) struct Completion {
    header: NonNull<PromiseHeader>,
}

impl Completion {
    /// Publishes the value and drops the writer reference.
    ///
    /// Returns the waiter that parked on the promise, if any. The caller
    /// takes over its resumption.
    pub(crate) fn publish(self) -> Option<Waiter> {
        let ptr = self.header;
        mem::forget(self);

        // SAFETY: the completion owned the writer reference.
        let header = unsafe { ptr.as_ref() };

        let waiter = match header.state.swap(READY, Ordering::AcqRel) {
            EMPTY => None,
            // SAFETY: PARKED hands the waiter slot to the publisher.
            PARKED => unsafe { (*header.waiter.get()).take() },
            _ => fail_fast!("promise published twice"),
        };

        // SAFETY: the writer reference is not used again.
        unsafe { release_ref(ptr) };

        waiter
    }
}

impl Drop for Completion {
    /// Dropping an unpublished value would strand its waiter.
    fn drop(&mut self) {
        fail_fast!("a task value was dropped without being published");
    }
}

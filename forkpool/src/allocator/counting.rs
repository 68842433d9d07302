use super::{FrameAllocator, Global, Storage};

use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Allocation counters shared by every clone of a [`Counting`]
/// allocator.
#[derive(Debug, Default)]
pub struct Counters {
    frames_allocated: AtomicUsize,
    frames_released: AtomicUsize,
    promises_allocated: AtomicUsize,
    promises_released: AtomicUsize,
}

impl Counters {
    /// Number of frames allocated so far.
    pub fn frames_allocated(&self) -> usize {
        self.frames_allocated.load(Ordering::Acquire)
    }

    /// Number of frames destroyed and released so far.
    pub fn frames_released(&self) -> usize {
        self.frames_released.load(Ordering::Acquire)
    }

    /// Number of promises allocated so far.
    pub fn promises_allocated(&self) -> usize {
        self.promises_allocated.load(Ordering::Acquire)
    }

    /// Number of promises released so far.
    pub fn promises_released(&self) -> usize {
        self.promises_released.load(Ordering::Acquire)
    }

    /// Number of frames and promises currently alive.
    ///
    /// Other threads may allocate and release while this runs, so the
    /// result is a snapshot.
    pub fn live(&self) -> usize {
        // Releases are read first: every release seen here has its
        // allocation visible to the loads below.
        let released = self.frames_released() + self.promises_released();
        let allocated = self.frames_allocated() + self.promises_allocated();

        allocated.saturating_sub(released)
    }

    fn allocated(&self, storage: Storage) -> &AtomicUsize {
        match storage {
            Storage::Frame => &self.frames_allocated,
            Storage::Promise => &self.promises_allocated,
        }
    }

    fn released(&self, storage: Storage) -> &AtomicUsize {
        match storage {
            Storage::Frame => &self.frames_released,
            Storage::Promise => &self.promises_released,
        }
    }
}

/// An allocator that counts allocations and releases.
///
/// Wraps another strategy (the heap by default). Useful to check that
/// every forked task released its frame and its promise.
///
/// # Examples
///
/// ```
/// use forkpool::allocator::Counting;
/// use forkpool::{ImmediateScheduler, Scheduler, Task};
///
/// let alloc = Counting::new();
/// let task = Task::new_in(async { 21 * 2 }, alloc.clone());
///
/// assert_eq!(ImmediateScheduler::new().schedule(task), 42);
/// assert_eq!(alloc.counters().frames_released(), 1);
/// assert_eq!(alloc.counters().live(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Counting<A = Global> {
    inner: A,
    counters: Arc<Counters>,
}

impl Counting<Global> {
    /// Creates a counting allocator over the process heap.
    pub fn new() -> Self {
        Self::wrap(Global)
    }
}

impl<A: FrameAllocator> Counting<A> {
    /// Creates a counting allocator over `inner`.
    pub fn wrap(inner: A) -> Self {
        Self {
            inner,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Returns the counters shared by this allocator and its clones.
    pub fn counters(&self) -> &Counters {
        &self.counters
    }
}

unsafe impl<A: FrameAllocator> FrameAllocator for Counting<A> {
    fn allocate(&self, storage: Storage, layout: Layout) -> NonNull<u8> {
        let ptr = self.inner.allocate(storage, layout);
        self.counters.allocated(storage).fetch_add(1, Ordering::AcqRel);
        ptr
    }

    unsafe fn deallocate(&self, storage: Storage, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: forwarded from the caller.
        unsafe { self.inner.deallocate(storage, ptr, layout) };
        self.counters.released(storage).fetch_add(1, Ordering::AcqRel);
    }
}

//! Lock-free work-stealing deque.
//!
//! This module implements the dynamic circular work-stealing deque of
//! Chase and Lev, with the memory orderings of "Correct and Efficient
//! Work-Stealing for Weak Memory Models" (Lê et al.).
//!
//! The deque is split in two handles:
//! - [`WorkStealingDeque`]: the owner handle. Only the owner can
//!   [`push`](WorkStealingDeque::push) and [`pop`](WorkStealingDeque::pop),
//!   and it sees a LIFO stack. It is `Send` but not `Sync`, so the
//!   owner-only rule is enforced by the type system.
//! - [`Stealer`]: a cloneable thief handle. Any number of threads may
//!   [`steal`](Stealer::steal) concurrently and see a FIFO queue.
//!
//! No pushed value is ever lost or returned twice, whatever the
//! interleaving of one owner and any number of thieves.
//!
//! # Examples
//!
//! ```
//! use forkpool::deque::{Steal, WorkStealingDeque};
//!
//! let deque = WorkStealingDeque::new();
//! let stealer = deque.stealer();
//!
//! deque.push(1);
//! deque.push(2);
//! deque.push(3);
//!
//! assert_eq!(stealer.steal(), Steal::Success(1));
//! assert_eq!(deque.pop(), Some(3));
//! assert_eq!(deque.pop(), Some(2));
//! assert_eq!(deque.pop(), None);
//! assert_eq!(stealer.steal(), Steal::Empty);
//! ```

mod buffer;

use buffer::Buffer;

use crossbeam_utils::CachePadded;
use std::cell::{Cell, UnsafeCell};
use std::fmt;
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::sync::Arc;
use std::sync::atomic::{AtomicIsize, AtomicPtr, Ordering, fence};

/// Capacity used by [`WorkStealingDeque::new`].
pub const DEFAULT_CAPACITY: usize = 1024;

/// Number of retired buffers reserved up front.
const GARBAGE_RESERVE: usize = 64;

/// Outcome of a [`Stealer::steal`] attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Steal<T> {
    /// A value was taken from the deque.
    Success(T),

    /// The deque was observed empty.
    Empty,

    /// The attempt lost a race with the owner or another thief.
    ///
    /// This is not a failure: the deque may still hold values and the
    /// caller should retry.
    Contended,
}

impl<T> Steal<T> {
    /// Returns `true` if a value was stolen.
    pub fn is_success(&self) -> bool {
        matches!(self, Steal::Success(_))
    }

    /// Returns `true` if the deque was observed empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, Steal::Empty)
    }

    /// Returns `true` if the attempt lost a race.
    pub fn is_contended(&self) -> bool {
        matches!(self, Steal::Contended)
    }

    /// Returns the stolen value, if any.
    pub fn success(self) -> Option<T> {
        match self {
            Steal::Success(value) => Some(value),
            Steal::Empty | Steal::Contended => None,
        }
    }
}

/// State shared between the owner and its stealers.
struct Inner<T> {
    /// Index of the oldest value. Advanced by thieves and by the owner
    /// when it races for the last value.
    top: CachePadded<AtomicIsize>,

    /// One past the newest value. Written by the owner only.
    bottom: CachePadded<AtomicIsize>,

    /// The current buffer.
    buffer: CachePadded<AtomicPtr<Buffer<T>>>,

    /// Buffers replaced by a resize.
    ///
    /// A thief may still be reading from one of them, so they are kept
    /// until no handle to the deque remains. Only the owner mutates
    /// this list.
    garbage: UnsafeCell<Vec<Box<Buffer<T>>>>,
}

// SAFETY: values move between threads through the deque, and `garbage`
// is only touched by the single owner handle or by the last drop.
unsafe impl<T: Send> Send for Inner<T> {}
unsafe impl<T: Send> Sync for Inner<T> {}

impl<T> Inner<T> {
    fn len(&self) -> isize {
        let bottom = self.bottom.load(Ordering::Relaxed);
        let top = self.top.load(Ordering::Relaxed);

        bottom.wrapping_sub(top).max(0)
    }

    fn capacity(&self) -> usize {
        // SAFETY: the current buffer is only freed when `Inner` drops.
        unsafe { (*self.buffer.load(Ordering::Relaxed)).capacity() }
    }

    fn steal(&self) -> Steal<T> {
        let top = self.top.load(Ordering::Acquire);
        fence(Ordering::SeqCst);
        let bottom = self.bottom.load(Ordering::Acquire);

        if top >= bottom {
            return Steal::Empty;
        }

        // The slot must be read before claiming it: once `top` moves the
        // owner may overwrite it. A torn read is discarded below.
        let buffer = self.buffer.load(Ordering::Acquire);
        // SAFETY: `top < bottom` so the slot was published by the owner,
        // and retired buffers outlive every stealer.
        let value = unsafe { (*buffer).read(top) };

        if self
            .top
            .compare_exchange(top, top + 1, Ordering::SeqCst, Ordering::Relaxed)
            .is_err()
        {
            return Steal::Contended;
        }

        // SAFETY: winning the CAS makes this thread the sole claimant of
        // the value at `top`, which was fully written before `bottom`
        // was published past it.
        Steal::Success(unsafe { value.assume_init() })
    }
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        let top = *self.top.get_mut();
        let bottom = *self.bottom.get_mut();
        let buffer = *self.buffer.get_mut();

        // SAFETY: no handle remains, so `[top, bottom)` are the only live
        // values and the current buffer is exclusively ours.
        unsafe {
            for index in top..bottom {
                (*buffer).read(index).assume_init_drop();
            }

            drop(Box::from_raw(buffer));
        }
    }
}

/// The owner handle of a work-stealing deque.
///
/// See the [module documentation](self) for the concurrency model.
pub struct WorkStealingDeque<T> {
    inner: Arc<Inner<T>>,

    /// Keeps the owner handle `!Sync`.
    _owner: PhantomData<Cell<()>>,
}

impl<T> WorkStealingDeque<T> {
    /// Creates an empty deque with [`DEFAULT_CAPACITY`] slots.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates an empty deque with room for `capacity` values before
    /// the first resize.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is not a power of two.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(
            capacity.is_power_of_two(),
            "deque capacity must be a power of two"
        );

        let buffer = Box::into_raw(Box::new(Buffer::new(capacity)));

        Self {
            inner: Arc::new(Inner {
                top: CachePadded::new(AtomicIsize::new(0)),
                bottom: CachePadded::new(AtomicIsize::new(0)),
                buffer: CachePadded::new(AtomicPtr::new(buffer)),
                garbage: UnsafeCell::new(Vec::with_capacity(GARBAGE_RESERVE)),
            }),
            _owner: PhantomData,
        }
    }

    /// Creates a thief handle for this deque.
    pub fn stealer(&self) -> Stealer<T> {
        Stealer {
            inner: self.inner.clone(),
        }
    }

    /// Returns the number of values in the deque.
    ///
    /// Concurrent steals can make this stale immediately.
    pub fn len(&self) -> usize {
        self.inner.len() as usize
    }

    /// Returns the number of values in the deque as a signed integer.
    pub fn ssize(&self) -> isize {
        self.inner.len()
    }

    /// Returns `true` if the deque holds no values.
    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }

    /// Returns the capacity of the current buffer.
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    /// Pushes a value onto the owner's end.
    ///
    /// If the buffer is full it is replaced by one twice as large. The
    /// old buffer is retired, not freed, since a thief may still be
    /// reading from it.
    pub fn push(&self, value: T) {
        let inner = &*self.inner;

        let bottom = inner.bottom.load(Ordering::Relaxed);
        let top = inner.top.load(Ordering::Acquire);
        let mut buffer = inner.buffer.load(Ordering::Relaxed);

        // SAFETY: the owner is the only thread that replaces the buffer.
        let capacity = unsafe { (*buffer).capacity() };

        if bottom.wrapping_sub(top) >= capacity as isize {
            // SAFETY: owner-only, and `[top, bottom)` is the live range.
            buffer = unsafe { self.resize(buffer, bottom, top) };
        }

        // SAFETY: slot `bottom` is invisible to thieves until `bottom` is
        // published below.
        unsafe { (*buffer).write(bottom, MaybeUninit::new(value)) };

        fence(Ordering::Release);
        inner.bottom.store(bottom + 1, Ordering::Relaxed);
    }

    /// Pops the most recently pushed value.
    ///
    /// Returns `None` if the deque is empty, including when the last
    /// value was just taken by a thief.
    pub fn pop(&self) -> Option<T> {
        let inner = &*self.inner;

        let bottom = inner.bottom.load(Ordering::Relaxed) - 1;
        let buffer = inner.buffer.load(Ordering::Relaxed);

        // From here on thieves can no longer claim slot `bottom` unless
        // they already read the old value of `bottom`.
        inner.bottom.store(bottom, Ordering::Relaxed);
        fence(Ordering::SeqCst);

        let top = inner.top.load(Ordering::Relaxed);

        if top > bottom {
            inner.bottom.store(bottom + 1, Ordering::Relaxed);
            return None;
        }

        if top == bottom {
            // Last value: race the thieves for it.
            let won = inner
                .top
                .compare_exchange(top, top + 1, Ordering::SeqCst, Ordering::Relaxed)
                .is_ok();

            inner.bottom.store(bottom + 1, Ordering::Relaxed);

            if !won {
                return None;
            }
        }

        // SAFETY: the slot at `bottom` is claimed by the owner, either
        // because `top < bottom` or because the CAS above succeeded.
        Some(unsafe { (*buffer).read(bottom).assume_init() })
    }

    /// Attempts to steal the oldest value.
    ///
    /// Equivalent to [`Stealer::steal`]; useful when the owner wants to
    /// drain the deque in FIFO order.
    pub fn steal(&self) -> Steal<T> {
        self.inner.steal()
    }

    /// Replaces `old` with a buffer twice as large and retires `old`.
    ///
    /// # Safety
    ///
    /// Must be called by the owner with the current buffer and live
    /// range.
    unsafe fn resize(&self, old: *mut Buffer<T>, bottom: isize, top: isize) -> *mut Buffer<T> {
        let inner = &*self.inner;

        // SAFETY: forwarded from the caller.
        let bigger = Box::into_raw(Box::new(unsafe { (*old).grow(bottom, top) }));

        // SAFETY: only the owner touches `garbage`, and `old` came from
        // `Box::into_raw`.
        unsafe { (*inner.garbage.get()).push(Box::from_raw(old)) };

        inner.buffer.store(bigger, Ordering::Release);

        // SAFETY: `bigger` was just allocated.
        let capacity = unsafe { (*bigger).capacity() };
        tracing::debug!(capacity, "work-stealing deque grew");

        bigger
    }
}

impl<T> Default for WorkStealingDeque<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for WorkStealingDeque<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkStealingDeque")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// A thief handle to a [`WorkStealingDeque`].
///
/// Stealers can be cloned and shared between threads freely.
pub struct Stealer<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Stealer<T> {
    /// Attempts to steal the oldest value.
    ///
    /// Returns [`Steal::Contended`] when a conflicting claim won the
    /// race; the deque may still hold values.
    pub fn steal(&self) -> Steal<T> {
        self.inner.steal()
    }

    /// Returns the number of values in the deque (best effort).
    pub fn len(&self) -> usize {
        self.inner.len() as usize
    }

    /// Returns `true` if the deque was observed empty.
    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }

    /// Returns `true` if both handles refer to the same deque.
    pub fn same_deque(&self, other: &Stealer<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns `true` if this stealer belongs to `owner`.
    pub fn belongs_to(&self, owner: &WorkStealingDeque<T>) -> bool {
        Arc::ptr_eq(&self.inner, &owner.inner)
    }
}

impl<T> Clone for Stealer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for Stealer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stealer").field("len", &self.len()).finish()
    }
}


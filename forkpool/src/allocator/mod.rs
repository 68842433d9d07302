//! Allocation strategies for task frames and promises.
//!
//! Every forked task needs two allocations: its frame (the suspended
//! `async` body and its header) and its promise (the shared result
//! slot). Both go through a [`FrameAllocator`], which is the only
//! customization point for task storage.
//!
//! Strategies provided by this crate:
//! - [`Global`]: the process heap.
//! - [`Counting`]: wraps another strategy and counts every allocation
//!   and release, split by [`Storage`] kind.
//! - [`Recycling`]: keeps per-thread free lists of recently released
//!   blocks so hot fork/join loops rarely reach the shared heap.

mod counting;
mod recycle;

pub use counting::{Counters, Counting};
pub use recycle::Recycling;

use std::alloc::{self, Layout};
use std::ptr::NonNull;

/// What an allocation is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Storage {
    /// A task frame: the `async` body and its header.
    Frame,

    /// A promise: the result slot shared by a task and its future.
    Promise,
}

/// A strategy for allocating task frames and promises.
///
/// Allocators are cloned into every frame and promise they allocate, so
/// the same strategy value that allocated a block is the one that
/// releases it. Clones must therefore share their backing state.
///
/// # Safety
///
/// Implementations must behave like a [`GlobalAlloc`](std::alloc::GlobalAlloc):
/// - `allocate` returns a block valid for `layout` that no one else
///   uses until it is passed to `deallocate`.
/// - `deallocate` accepts any block returned by `allocate` on this
///   value or any of its clones, on any thread.
pub unsafe trait FrameAllocator: Clone + Send + Sync + 'static {
    /// Allocates a block for `layout`.
    ///
    /// Allocation failure is fatal: implementations abort through
    /// [`std::alloc::handle_alloc_error`] rather than return.
    fn allocate(&self, storage: Storage, layout: Layout) -> NonNull<u8>;

    /// Releases a block returned by [`allocate`](Self::allocate).
    ///
    /// # Safety
    ///
    /// `ptr` must come from `allocate` with the same `storage` and
    /// `layout`, and must not be used afterwards.
    unsafe fn deallocate(&self, storage: Storage, ptr: NonNull<u8>, layout: Layout);
}

/// The process heap.
#[derive(Debug, Clone, Copy, Default)]
pub struct Global;

unsafe impl FrameAllocator for Global {
    fn allocate(&self, _storage: Storage, layout: Layout) -> NonNull<u8> {
        if layout.size() == 0 {
            // SAFETY: `align` is a non-zero power of two.
            return unsafe { NonNull::new_unchecked(layout.align() as *mut u8) };
        }

        // SAFETY: `layout` has a non-zero size.
        let ptr = unsafe { alloc::alloc(layout) };

        match NonNull::new(ptr) {
            Some(ptr) => ptr,
            None => alloc::handle_alloc_error(layout),
        }
    }

    unsafe fn deallocate(&self, _storage: Storage, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() != 0 {
            // SAFETY: forwarded from the caller.
            unsafe { alloc::dealloc(ptr.as_ptr(), layout) }
        }
    }
}

use super::{FrameAllocator, Global, Storage};

use std::alloc::{self, Layout};
use std::cell::RefCell;
use std::ptr::NonNull;

/// Number of size classes. Class `c` holds blocks of `16 << c` bytes.
const CLASSES: usize = 8;

/// Smallest block size.
const MIN_BLOCK: usize = 16;

/// Alignment of every recycled block.
const BLOCK_ALIGN: usize = 16;

/// Maximum number of blocks cached per class and thread.
const MAX_CACHED: usize = 64;

thread_local! {
    /// Free blocks released on this thread, one stack per size class.
    static FREE_LISTS: RefCell<FreeLists> = const { RefCell::new(FreeLists::new()) };
}

/// Per-thread stacks of free blocks.
///
/// Blocks are raw heap allocations of exactly one size class. A block
/// may be allocated on one thread and released on another; it then
/// joins the releasing thread's list.
struct FreeLists {
    /// Free blocks for each size class.
    free: [Vec<NonNull<u8>>; CLASSES],
}

impl FreeLists {
    const fn new() -> Self {
        Self {
            free: [const { Vec::new() }; CLASSES],
        }
    }

    fn pop(&mut self, class: usize) -> Option<NonNull<u8>> {
        self.free[class].pop()
    }

    /// Caches `block`, or hands it back if the class is full.
    fn push(&mut self, class: usize, block: NonNull<u8>) -> Result<(), NonNull<u8>> {
        let list = &mut self.free[class];

        if list.len() >= MAX_CACHED {
            return Err(block);
        }

        list.push(block);
        Ok(())
    }
}

impl Drop for FreeLists {
    /// Returns every cached block to the heap when the thread exits.
    fn drop(&mut self) {
        for (class, list) in self.free.iter_mut().enumerate() {
            let layout = class_layout(class);

            for block in list.drain(..) {
                // SAFETY: every cached block was allocated with the
                // layout of its class.
                unsafe { alloc::dealloc(block.as_ptr(), layout) };
            }
        }
    }
}

/// Returns the size class serving `layout`, if any.
fn size_class(layout: Layout) -> Option<usize> {
    if layout.align() > BLOCK_ALIGN || layout.size() == 0 {
        return None;
    }

    let rounded = layout.size().max(MIN_BLOCK).next_power_of_two();
    let class = (rounded / MIN_BLOCK).trailing_zeros() as usize;

    (class < CLASSES).then_some(class)
}

fn class_layout(class: usize) -> Layout {
    // SAFETY: the size is a non-zero multiple of the power-of-two alignment.
    unsafe { Layout::from_size_align_unchecked(MIN_BLOCK << class, BLOCK_ALIGN) }
}

/// An allocator that recycles frame and promise blocks per thread.
///
/// Small blocks are rounded up to a power-of-two size class and, once
/// released, kept on a thread-local free list for the next allocation
/// of the same class. Large or over-aligned layouts go straight to the
/// heap.
///
/// Under a fork-heavy workload most frames are released shortly after
/// they are allocated, often on the same worker, so this keeps the
/// steady state away from the shared heap allocator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Recycling;

unsafe impl FrameAllocator for Recycling {
    fn allocate(&self, storage: Storage, layout: Layout) -> NonNull<u8> {
        let Some(class) = size_class(layout) else {
            return Global.allocate(storage, layout);
        };

        let cached = FREE_LISTS
            .try_with(|lists| lists.borrow_mut().pop(class))
            .ok()
            .flatten();

        match cached {
            Some(block) => block,
            None => Global.allocate(storage, class_layout(class)),
        }
    }

    unsafe fn deallocate(&self, storage: Storage, ptr: NonNull<u8>, layout: Layout) {
        let Some(class) = size_class(layout) else {
            // SAFETY: forwarded from the caller.
            return unsafe { Global.deallocate(storage, ptr, layout) };
        };

        let rejected = FREE_LISTS
            .try_with(|lists| lists.borrow_mut().push(class, ptr))
            .unwrap_or(Err(ptr));

        if let Err(block) = rejected {
            // SAFETY: the block was allocated with its class layout.
            unsafe { Global.deallocate(storage, block, class_layout(class)) };
        }
    }
}

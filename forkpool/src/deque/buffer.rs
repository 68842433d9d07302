use crate::diagnostics::assume;

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr;

/// A fixed-size circular buffer addressed by unbounded indices.
///
/// Indices are reduced modulo the capacity with a mask, so the
/// capacity must be a power of two. Slots are never dropped by the
/// buffer itself: the deque decides which slots hold live values.
pub(crate) struct Buffer<T> {
    /// Backing storage, one possibly uninitialized value per slot.
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,

    /// `capacity - 1`.
    mask: usize,
}

impl<T> Buffer<T> {
    /// Allocates a buffer with `capacity` uninitialized slots.
    pub(crate) fn new(capacity: usize) -> Self {
        assume!(
            capacity.is_power_of_two(),
            "buffer capacity {capacity} is not a power of two"
        );

        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect();

        Self {
            slots,
            mask: capacity - 1,
        }
    }

    /// Returns the number of slots.
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, index: isize) -> *mut MaybeUninit<T> {
        assume!(index >= 0, "negative deque index {index}");
        self.slots[index as usize & self.mask].get()
    }

    /// Writes `value` into the slot for `index`.
    ///
    /// # Safety
    ///
    /// The caller must be the deque owner and the slot must not be
    /// readable by a thief until the write is published.
    pub(crate) unsafe fn write(&self, index: isize, value: MaybeUninit<T>) {
        unsafe { ptr::write_volatile(self.slot(index), value) }
    }

    /// Reads a bitwise copy of the slot for `index`.
    ///
    /// The copy may be torn when it races with an owner write. Callers
    /// only assume it initialized after winning the claim on `index`.
    ///
    /// # Safety
    ///
    /// `index` must have been written at least once through this buffer
    /// or be within a live range copied into it.
    pub(crate) unsafe fn read(&self, index: isize) -> MaybeUninit<T> {
        unsafe { ptr::read_volatile(self.slot(index)) }
    }

    /// Copies the live range `[top, bottom)` into a buffer twice as big.
    ///
    /// The values are moved bitwise. The old buffer keeps its copies as
    /// uninitialized memory, so nothing is dropped twice.
    ///
    /// # Safety
    ///
    /// Every index in `[top, bottom)` must hold a live value.
    pub(crate) unsafe fn grow(&self, bottom: isize, top: isize) -> Buffer<T> {
        let bigger = Buffer::new(self.capacity() * 2);

        for index in top..bottom {
            unsafe { bigger.write(index, self.read(index)) };
        }

        bigger
    }
}

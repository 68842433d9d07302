//! Lifecycle states shared by frames and promises.

/// Frame is paused at a suspension point (or has never run).
///
/// Only a suspended frame may be resumed.
pub(crate) const SUSPENDED: u8 = 0;

/// Frame is being polled by a worker.
///
/// At most one worker may observe this state at a time.
pub(crate) const RUNNING: u8 = 1;

/// Frame body returned `Poll::Ready`.
///
/// The frame will not be resumed again; it is destroyed by its owner.
pub(crate) const DONE: u8 = 2;

/// Promise holds no value and no waiter.
pub(crate) const EMPTY: usize = 0;

/// A waiter has parked on the promise.
///
/// The waiter slot is owned by the promise until the value is
/// published, then by the publisher.
pub(crate) const PARKED: usize = 1;

/// The value has been published.
pub(crate) const READY: usize = 2;

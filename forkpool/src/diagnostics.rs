//! Contract checks used throughout the runtime.
//!
//! The runtime has very few recoverable errors. Misusing a frame, a
//! future or a deque is a contract violation, and continuing after one
//! would leave a suspended computation without an owner. Violations are
//! therefore reported and the process is aborted.
//!
//! Three hooks are provided:
//! - [`contract_assert!`]: checked in debug builds only. In release
//!   builds the condition is never evaluated.
//! - [`assume!`]: checked in debug builds, an optimizer hint in release
//!   builds. The condition must be free of side effects.
//! - [`fail_fast!`]: always checked. Used where ignoring the violation
//!   would lose or double-resume a frame.

use std::fmt;
use std::panic::Location;

/// Reports a contract violation and aborts the process.
#[cold]
#[inline(never)]
#[track_caller]
pub(crate) fn contract_violation(message: fmt::Arguments<'_>) -> ! {
    let location = Location::caller();

    tracing::error!(%location, "contract violation: {message}");
    eprintln!("forkpool: contract violation at {location}: {message}");

    std::process::abort()
}

/// Asserts a contract in debug builds.
macro_rules! contract_assert {
    ($cond:expr, $($arg:tt)+) => {
        if cfg!(debug_assertions) && !$cond {
            $crate::diagnostics::contract_violation(format_args!($($arg)+));
        }
    };
}

/// Asserts a contract in debug builds and hands it to the optimizer in
/// release builds.
macro_rules! assume {
    ($cond:expr, $($arg:tt)+) => {
        if cfg!(debug_assertions) {
            if !$cond {
                $crate::diagnostics::contract_violation(format_args!($($arg)+));
            }
        } else {
            // SAFETY: only used for invariants maintained by this crate.
            unsafe { ::std::hint::assert_unchecked($cond) }
        }
    };
}

/// Reports a contract violation unconditionally.
macro_rules! fail_fast {
    ($($arg:tt)+) => {
        $crate::diagnostics::contract_violation(format_args!($($arg)+))
    };
}

pub(crate) use assume;
pub(crate) use contract_assert;
pub(crate) use fail_fast;

/// Aborts the process if dropped during unwinding.
///
/// Held across every resumption of a task body: a panic escaping a
/// task must not unwind through the scheduler, which would drop frames
/// that other tasks are parked on.
pub(crate) struct AbortOnUnwind;

impl Drop for AbortOnUnwind {
    fn drop(&mut self) {
        if std::thread::panicking() {
            contract_violation(format_args!("a task body panicked"));
        }
    }
}

//! # forkpool
//!
//! **forkpool** is a fine-grained fork/join runtime for recursive
//! divide-and-conquer workloads.
//!
//! A computation is written as a tree of [`Task`]s. Inside a task,
//! [`fork`](task::fork) starts a child and `.await`ing the child's
//! [`Future`](task::Future) joins it. A [`Scheduler`] runs the tree:
//!
//! - [`BusyPool`] spreads it over a fixed set of worker threads. Each
//!   worker owns a lock-free [`WorkStealingDeque`](deque::WorkStealingDeque);
//!   forks push onto the forking worker's deque and idle workers steal
//!   from the other end of their peers' deques.
//! - [`ImmediateScheduler`] runs it sequentially on the calling thread
//!   in strict depth-first order, which makes it the reference for
//!   checking task bodies.
//!
//! ## Quick Start
//!
//! ```
//! use forkpool::task::{Task, call, fork};
//! use forkpool::{BusyPool, Scheduler};
//!
//! fn fib(n: u64) -> Task<u64> {
//!     Task::new(async move {
//!         if n < 2 {
//!             return n;
//!         }
//!
//!         let a = fork(fib(n - 1)).await;
//!         let b = call(fib(n - 2)).await;
//!
//!         a.await + b
//!     })
//! }
//!
//! let pool = BusyPool::with_workers(2).unwrap();
//! assert_eq!(pool.schedule(fib(20)), 6765);
//! ```
//!
//! ## Rules for task bodies
//!
//! A task body may only suspend at a fork or at a join on a forkpool
//! future; awaiting any other future that returns `Pending` is a
//! contract violation. Contract violations (double joins, dereferencing
//! an empty frame handle, blocking a worker on a future, a panic
//! escaping a task body) are reported through `tracing` and stderr, and
//! abort the process.
//!
//! ## Modules
//!
//! - [`deque`]: the Chase–Lev work-stealing deque
//! - [`task`]: tasks, futures, `fork` and `call`
//! - [`allocator`]: frame and promise allocation strategies
//! - [`algorithm`]: parallel `fold`, `for_each` and `map`
//! - [`config`]: pool configuration and environment overrides

mod diagnostics;
mod runtime;

pub mod algorithm;
pub mod allocator;
pub mod deque;
pub mod error;

pub use error::{BuildError, ParseIdlePolicyError};
pub use runtime::builder::PoolBuilder;
pub use runtime::context::{ExecutionContext, WorkHandle};
pub use runtime::immediate::{ImmediateContext, ImmediateScheduler};
pub use runtime::pool::{BusyPool, PooledContext};
pub use runtime::task::{self, Task};
pub use runtime::{FrameHandle, Scheduler, SuspendedFrame};

pub use runtime::config::{IdlePolicy, PoolConfig};

/// Pool configuration and environment overrides.
pub mod config {
    pub use crate::runtime::config::*;
}

pub use forkpool_macros::*;

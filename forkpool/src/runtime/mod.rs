//! Core runtime components.
//!
//! This module contains everything between a task body and a worker
//! thread:
//! - suspended frames and their exclusive owner handle,
//! - promises and the join hand-off protocol,
//! - tasks, futures and the fork/join operators,
//! - execution contexts and the two schedulers.
//!
//! Most users only touch [`Task`](task::Task), [`fork`](task::fork),
//! `.await` and a [`Scheduler`].

mod frame;
mod promise;
mod state;

pub(crate) mod builder;
pub(crate) mod config;
pub(crate) mod context;
pub(crate) mod immediate;
pub(crate) mod pool;

pub mod task;

pub use frame::{FrameHandle, SuspendedFrame};

use task::Task;

/// Runs root tasks to completion.
///
/// Both schedulers relabel the task as a root before running it, so any
/// task can be passed in.
pub trait Scheduler {
    /// Runs `task` and every task it forks, then returns its value to
    /// the calling thread.
    fn schedule<T: Send + 'static>(&self, task: Task<T>) -> T;
}

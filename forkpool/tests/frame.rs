mod common;

use forkpool::allocator::Counting;
use forkpool::task::{Kind, Task, fork};
use forkpool::{ExecutionContext, FrameHandle, ImmediateContext, WorkHandle};

use std::cell::RefCell;
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Records pushed continuations without running them.
#[derive(Default)]
struct RecordingContext {
    pushed: RefCell<Vec<WorkHandle>>,
}

impl ExecutionContext for RecordingContext {
    fn push(&self, work: WorkHandle) {
        self.pushed.borrow_mut().push(work);
    }

    fn pop(&self) -> Option<WorkHandle> {
        self.pushed.borrow_mut().pop()
    }
}

struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_default_handle_is_empty() {
    let mut handle = FrameHandle::default();

    assert!(!handle.is_valid());
    assert!(handle.release().is_none());
}

#[test]
fn test_fresh_frame_is_suspended() {
    let (_future, work) = Task::new(async { 1 }).into_parts();
    let frame = work.into_frame();

    assert!(frame.is_valid());
    assert!(!frame.is_done());
    assert!(!frame.is_running());
}

#[test]
fn test_take_moves_ownership() {
    let alloc = Counting::new();
    let (_future, work) = Task::new_in(async {}, alloc.clone()).into_parts();

    let mut first = work.into_frame();
    let second = mem::take(&mut first);

    assert!(!first.is_valid());
    assert!(second.is_valid());

    drop(first);
    assert_eq!(alloc.counters().frames_released(), 0);

    drop(second);
    assert_eq!(alloc.counters().frames_released(), 1);
}

#[test]
fn test_release_and_from_raw() {
    let alloc = Counting::new();
    let (_future, work) = Task::new_in(async { 5 }, alloc.clone()).into_parts();

    let mut handle = work.into_frame();
    let raw = handle.release().expect("handle owned a frame");

    assert!(!handle.is_valid());
    drop(handle);
    assert_eq!(alloc.counters().frames_released(), 0);

    let handle = unsafe { FrameHandle::from_raw(raw) };
    assert!(handle.is_valid());

    drop(handle);
    assert_eq!(alloc.counters().frames_released(), 1);
}

#[test]
fn test_dropping_unrun_task_destroys_body_once() {
    let alloc = Counting::new();
    let drops = Arc::new(AtomicUsize::new(0));
    let guard = DropCounter(drops.clone());

    let task = Task::new_in(
        async move {
            let _guard = guard;
        },
        alloc.clone(),
    );

    assert_eq!(task.kind(), Kind::Fork);
    drop(task);

    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert_eq!(alloc.counters().frames_released(), 1);
    assert_eq!(alloc.counters().promises_released(), 1);
    assert_eq!(alloc.counters().live(), 0);
}

#[test]
fn test_fork_pushes_parent_continuation() {
    common::init_tracing();

    let context = RecordingContext::default();
    let child_ran = Arc::new(AtomicUsize::new(0));
    let seen = child_ran.clone();

    let root = Task::new(async move {
        let child = fork(Task::new(async move {
            seen.fetch_add(1, Ordering::SeqCst);
            10
        }))
        .await;

        child.await * 2
    })
    .as_root();

    let (future, work) = root.into_parts();
    work.resume(&context);

    // The child ran to completion on this thread; the parent waits in
    // the context.
    assert_eq!(child_ran.load(Ordering::SeqCst), 1);
    assert!(!future.is_ready());

    let parent = context.pop().expect("parent continuation was pushed");
    assert!(context.pop().is_none());

    {
        let frame = parent.into_frame();
        assert!(frame.is_valid());
        assert!(!frame.is_running());
        assert!(!frame.is_done());

        WorkHandle::from(frame).resume(&context);
    }

    assert!(future.is_ready());
    assert_eq!(future.take(), 20);
}

#[test]
fn test_completion_publishes_and_releases() {
    let alloc = Counting::new();
    let (future, work) = Task::new_in(async { String::from("done") }, alloc.clone()).as_root().into_parts();

    ImmediateContext::new().run(work);

    // The frame is gone and the value is published before anyone reads it.
    assert_eq!(alloc.counters().frames_released(), 1);
    assert!(future.is_ready());
    assert_eq!(alloc.counters().promises_released(), 0);

    assert_eq!(future.take(), "done");
    assert_eq!(alloc.counters().live(), 0);
}

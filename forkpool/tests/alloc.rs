mod common;

use forkpool::allocator::{Counting, FrameAllocator, Recycling, Storage};
use forkpool::task::{Task, call, fork};
use forkpool::{BusyPool, ImmediateScheduler, Scheduler};

use std::alloc::Layout;
use std::hint;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// A root that forks `children` leaves and joins all of them.
fn fan_out<A: FrameAllocator>(children: u64, alloc: A) -> Task<u64> {
    let inner = alloc.clone();

    Task::new_in(
        async move {
            let mut futures = Vec::new();

            for i in 0..children {
                futures.push(fork(Task::new_in(async move { i }, inner.clone())).await);
            }

            let mut total = 0;
            for future in futures {
                total += future.await;
            }
            total
        },
        alloc,
    )
}

fn fib_in<A: FrameAllocator>(n: u64, alloc: A) -> Task<u64> {
    let inner = alloc.clone();

    Task::new_in(
        async move {
            if n < 2 {
                return n;
            }

            let a = fork(fib_in(n - 1, inner.clone())).await;
            let b = call(fib_in(n - 2, inner)).await;

            a.await + b
        },
        alloc,
    )
}

#[test]
fn test_no_leaks_immediate() {
    const K: usize = 32;

    let alloc = Counting::new();
    let result = ImmediateScheduler::new().schedule(fan_out(K as u64, alloc.clone()));

    assert_eq!(result, (0..K as u64).sum());

    let counters = alloc.counters();
    assert_eq!(counters.frames_allocated(), K + 1);
    assert_eq!(counters.frames_released(), K + 1);
    assert_eq!(counters.promises_allocated(), K + 1);
    assert_eq!(counters.promises_released(), K + 1);
    assert_eq!(counters.live(), 0);
}

#[test]
fn test_no_leaks_busy_pool() {
    const K: usize = 64;

    common::init_tracing();

    let alloc = Counting::new();

    {
        let pool = BusyPool::with_workers(4).unwrap();
        let result = pool.schedule(fan_out(K as u64, alloc.clone()));
        assert_eq!(result, (0..K as u64).sum());
    }

    // The pool is gone, so every worker has finished its last release.
    let counters = alloc.counters();
    assert_eq!(counters.frames_released(), K + 1);
    assert_eq!(counters.promises_released(), K + 1);
    assert_eq!(counters.live(), 0);
}

#[test]
fn test_frames_released_before_root_returns() {
    let alloc = Counting::new();
    let pool = BusyPool::with_workers(2).unwrap();

    let value = pool.schedule(Task::new_in(async { 3 }, alloc.clone()));

    assert_eq!(value, 3);
    assert_eq!(alloc.counters().frames_released(), 1);
}

#[test]
fn test_recursive_tree_releases_everything() {
    let alloc = Counting::new();
    let result = ImmediateScheduler::new().schedule(fib_in(15, alloc.clone()));

    assert_eq!(result, common::fib_serial(15));

    let counters = alloc.counters();
    assert_eq!(counters.frames_allocated(), counters.frames_released());
    assert_eq!(counters.promises_allocated(), counters.frames_allocated());
    assert_eq!(counters.live(), 0);
}

#[test]
fn test_recycling_allocator_immediate() {
    let scheduler = ImmediateScheduler::new();

    for _ in 0..3 {
        assert_eq!(scheduler.schedule(fib_in(18, Recycling)), common::fib_serial(18));
    }
}

#[test]
fn test_recycling_allocator_on_pool() {
    let pool = BusyPool::with_workers(4).unwrap();

    assert_eq!(pool.schedule(fib_in(22, Recycling)), common::fib_serial(22));
}

#[test]
fn test_counting_over_recycling() {
    let alloc = Counting::wrap(Recycling);

    {
        let pool = BusyPool::with_workers(2).unwrap();
        assert_eq!(pool.schedule(fan_out(100, alloc.clone())), (0..100).sum());
    }

    assert_eq!(alloc.counters().frames_allocated(), 101);
    assert_eq!(alloc.counters().live(), 0);
}

#[test]
fn test_large_frames_bypass_recycling() {
    let buffer = [7u8; 8192];

    let result = ImmediateScheduler::new().schedule(Task::new_in(
        async move { buffer.iter().map(|b| *b as u64).sum::<u64>() },
        Recycling,
    ));

    assert_eq!(result, 7 * 8192);
}

#[test]
fn test_live_count_under_concurrent_churn() {
    let alloc = Counting::new();
    let stop = Arc::new(AtomicBool::new(false));

    let churn = {
        let alloc = alloc.clone();
        let stop = stop.clone();

        thread::spawn(move || {
            let layout = Layout::new::<[u64; 4]>();

            while !stop.load(Ordering::Relaxed) {
                for storage in [Storage::Frame, Storage::Promise] {
                    let ptr = alloc.allocate(storage, layout);
                    // SAFETY: `ptr` was just allocated with this layout.
                    unsafe { alloc.deallocate(storage, ptr, layout) };
                }
            }
        })
    };

    // Reading the counters while another thread moves them must never
    // observe more releases than allocations.
    for _ in 0..200_000 {
        hint::black_box(alloc.counters().live());
    }

    stop.store(true, Ordering::Relaxed);
    churn.join().unwrap();

    assert_eq!(alloc.counters().live(), 0);
}

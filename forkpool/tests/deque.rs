mod common;

use forkpool::deque::{DEFAULT_CAPACITY, Steal, WorkStealingDeque};
use proptest::prelude::*;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_owner_pops_lifo() {
    let deque = WorkStealingDeque::new();

    for i in 0..5 {
        deque.push(i);
    }

    let popped: Vec<_> = std::iter::from_fn(|| deque.pop()).collect();
    assert_eq!(popped, vec![4, 3, 2, 1, 0]);
    assert!(deque.is_empty());
}

#[test]
fn test_thief_steals_fifo() {
    let deque = WorkStealingDeque::new();
    let stealer = deque.stealer();

    for i in 0..5 {
        deque.push(i);
    }

    let stolen: Vec<_> = std::iter::from_fn(|| stealer.steal().success()).collect();
    assert_eq!(stolen, vec![0, 1, 2, 3, 4]);
    assert_eq!(stealer.steal(), Steal::Empty);
}

#[test]
fn test_pop_and_steal_meet_in_the_middle() {
    let deque = WorkStealingDeque::new();
    let stealer = deque.stealer();

    for i in 0..4 {
        deque.push(i);
    }

    assert_eq!(stealer.steal(), Steal::Success(0));
    assert_eq!(deque.pop(), Some(3));
    assert_eq!(stealer.steal(), Steal::Success(1));
    assert_eq!(deque.pop(), Some(2));
    assert_eq!(deque.pop(), None);
    assert_eq!(stealer.steal(), Steal::Empty);
}

#[test]
fn test_empty_deque() {
    let deque = WorkStealingDeque::<u32>::new();

    assert_eq!(deque.pop(), None);
    assert_eq!(deque.steal(), Steal::Empty);
    assert_eq!(deque.len(), 0);
    assert_eq!(deque.ssize(), 0);
    assert_eq!(deque.capacity(), DEFAULT_CAPACITY);
}

#[test]
fn test_size_tracks_pushes_and_pops() {
    let deque = WorkStealingDeque::with_capacity(8);

    deque.push('a');
    deque.push('b');
    deque.push('c');
    assert_eq!(deque.len(), 3);

    deque.pop();
    deque.steal();
    assert_eq!(deque.ssize(), 1);
}

#[test]
fn test_resize_doubles_and_preserves_order() {
    common::init_tracing();

    let capacity = 4;
    let deque = WorkStealingDeque::with_capacity(capacity);
    let stealer = deque.stealer();

    for i in 0..=capacity {
        deque.push(i);
    }

    assert_eq!(deque.capacity(), (capacity + 1).next_power_of_two());
    assert_eq!(deque.len(), capacity + 1);

    let stolen: Vec<_> = std::iter::from_fn(|| stealer.steal().success()).collect();
    assert_eq!(stolen, (0..=capacity).collect::<Vec<_>>());
}

#[test]
fn test_resize_after_wraparound() {
    let deque = WorkStealingDeque::with_capacity(4);
    let stealer = deque.stealer();

    // Move the live range away from index 0 before growing.
    for i in 0..3 {
        deque.push(i);
    }
    for _ in 0..3 {
        stealer.steal();
    }

    for i in 10..20 {
        deque.push(i);
    }

    assert_eq!(deque.capacity(), 16);

    let stolen: Vec<_> = std::iter::from_fn(|| stealer.steal().success()).collect();
    assert_eq!(stolen, (10..20).collect::<Vec<_>>());
}

#[test]
#[should_panic(expected = "power of two")]
fn test_capacity_must_be_power_of_two() {
    let _ = WorkStealingDeque::<u8>::with_capacity(3);
}

#[test]
fn test_single_item_steal_race() {
    const THIEVES: usize = 8;

    for _ in 0..200 {
        let deque = WorkStealingDeque::new();
        deque.push(7u32);

        let barrier = Arc::new(Barrier::new(THIEVES));
        let successes = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..THIEVES)
            .map(|_| {
                let stealer = deque.stealer();
                let barrier = barrier.clone();
                let successes = successes.clone();

                thread::spawn(move || {
                    barrier.wait();

                    match stealer.steal() {
                        Steal::Success(value) => {
                            assert_eq!(value, 7);
                            successes.fetch_add(1, Ordering::SeqCst);
                        }
                        Steal::Empty | Steal::Contended => {}
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert_eq!(deque.pop(), None);
    }
}

#[test]
fn test_owner_and_thief_race_for_last_item() {
    for _ in 0..1000 {
        let deque = WorkStealingDeque::new();
        let stealer = deque.stealer();
        deque.push(1u32);

        let thief = thread::spawn(move || stealer.steal().success());
        let popped = deque.pop();
        let stolen = thief.join().unwrap();

        assert_eq!(
            popped.is_some() as u8 + stolen.is_some() as u8,
            1,
            "exactly one side must win"
        );
    }
}

#[test]
fn test_concurrent_conservation() {
    const ITEMS: usize = 100_000;
    const THIEVES: usize = 4;

    // A tiny initial buffer forces resizes while thieves are active.
    let deque = WorkStealingDeque::with_capacity(2);
    let done = Arc::new(AtomicBool::new(false));

    let thieves: Vec<_> = (0..THIEVES)
        .map(|_| {
            let stealer = deque.stealer();
            let done = done.clone();

            thread::spawn(move || {
                let mut got = Vec::new();

                loop {
                    match stealer.steal() {
                        Steal::Success(value) => got.push(value),
                        Steal::Contended => {}
                        Steal::Empty if done.load(Ordering::Acquire) => break,
                        Steal::Empty => thread::yield_now(),
                    }
                }

                got
            })
        })
        .collect();

    let mut got = Vec::new();

    for i in 0..ITEMS {
        deque.push(i);

        if i % 3 == 0 {
            got.extend(deque.pop());
        }
    }

    while let Some(value) = deque.pop() {
        got.push(value);
    }

    done.store(true, Ordering::Release);

    for thief in thieves {
        got.extend(thief.join().unwrap());
    }

    got.sort_unstable();
    assert_eq!(got.len(), ITEMS, "values were lost or duplicated");
    assert!(got.iter().copied().eq(0..ITEMS));
}

#[test]
fn test_dropping_deque_drops_remaining_values() {
    struct Tracked(Arc<AtomicUsize>);

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let drops = Arc::new(AtomicUsize::new(0));

    {
        let deque = WorkStealingDeque::with_capacity(2);
        let stealer = deque.stealer();

        for _ in 0..10 {
            deque.push(Tracked(drops.clone()));
        }

        drop(stealer.steal());
        drop(deque.pop());
        assert_eq!(drops.load(Ordering::SeqCst), 2);

        // The stealer keeps the deque alive after the owner is gone.
        drop(deque);
        assert_eq!(drops.load(Ordering::SeqCst), 2);
        drop(stealer);
    }

    assert_eq!(drops.load(Ordering::SeqCst), 10);
}

#[test]
fn test_stealer_identity() {
    let a = WorkStealingDeque::<u8>::new();
    let b = WorkStealingDeque::<u8>::new();

    assert!(a.stealer().same_deque(&a.stealer().clone()));
    assert!(a.stealer().belongs_to(&a));
    assert!(!b.stealer().belongs_to(&a));
}

#[derive(Debug, Clone)]
enum Op {
    Push(u32),
    Pop,
    Steal,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<u32>().prop_map(Op::Push),
        1 => Just(Op::Pop),
        1 => Just(Op::Steal),
    ]
}

proptest! {
    #[test]
    fn test_matches_sequential_model(ops in prop::collection::vec(op(), 0..512)) {
        let deque = WorkStealingDeque::with_capacity(4);
        let stealer = deque.stealer();
        let mut model = VecDeque::new();

        for op in ops {
            match op {
                Op::Push(value) => {
                    deque.push(value);
                    model.push_back(value);
                }
                Op::Pop => prop_assert_eq!(deque.pop(), model.pop_back()),
                Op::Steal => prop_assert_eq!(stealer.steal().success(), model.pop_front()),
            }

            prop_assert_eq!(deque.len(), model.len());
        }
    }
}

mod common;

use forkpool::{BusyPool, ImmediateScheduler, Scheduler, algorithm};
use proptest::prelude::*;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

#[test]
fn test_fold_empty_is_none() {
    let data: Arc<[u64]> = Arc::new([]);
    let result = ImmediateScheduler::new().schedule(algorithm::fold(data, 4, |x| *x, |a, b| a + b));

    assert_eq!(result, None);
}

#[test]
fn test_fold_single_item() {
    let data: Arc<[u64]> = Arc::new([9]);
    let result = ImmediateScheduler::new().schedule(algorithm::fold(data, 4, |x| *x * 2, |a, b| a + b));

    assert_eq!(result, Some(18));
}

#[test]
fn test_fold_grain_zero_is_grain_one() {
    let data = common::numbers(1000);

    let zero = ImmediateScheduler::new().schedule(algorithm::fold(data.clone(), 0, |x| *x, |a, b| a + b));
    let one = ImmediateScheduler::new().schedule(algorithm::fold(data, 1, |x| *x, |a, b| a + b));

    assert_eq!(zero, one);
    assert_eq!(zero, Some(499_500));
}

#[test]
fn test_fold_keeps_index_order() {
    let letters: Arc<[char]> = ('a'..='z').collect();
    let expected: String = ('a'..='z').collect();

    let concat = |a: String, b: String| a + &b;

    let pool = BusyPool::with_workers(4).unwrap();
    let result = pool.schedule(algorithm::fold(letters.clone(), 1, |c| c.to_string(), concat));
    assert_eq!(result.as_deref(), Some(expected.as_str()));

    let result = ImmediateScheduler::new().schedule(algorithm::fold(letters, 3, |c| c.to_string(), concat));
    assert_eq!(result.as_deref(), Some(expected.as_str()));
}

#[test]
fn test_for_each_visits_every_item_once() {
    let data = common::numbers(10_000);
    let visits = Arc::new(AtomicUsize::new(0));
    let total = Arc::new(AtomicU64::new(0));

    let pool = BusyPool::with_workers(4).unwrap();

    {
        let visits = visits.clone();
        let total = total.clone();

        pool.schedule(algorithm::for_each(data.clone(), 8, move |x| {
            visits.fetch_add(1, Ordering::Relaxed);
            total.fetch_add(*x, Ordering::Relaxed);
        }));
    }

    assert_eq!(visits.load(Ordering::Relaxed), data.len());
    assert_eq!(total.load(Ordering::Relaxed), data.iter().sum::<u64>());
}

#[test]
fn test_map_preserves_order() {
    let data = common::numbers(5000);

    let pool = BusyPool::with_workers(3).unwrap();
    let squares = pool.schedule(algorithm::map(data.clone(), 7, |x| x * x));

    let expected: Vec<u64> = data.iter().map(|x| x * x).collect();
    assert_eq!(squares, expected);
}

#[test]
fn test_map_empty() {
    let data: Arc<[u8]> = Arc::new([]);
    let out = ImmediateScheduler::new().schedule(algorithm::map(data, 1, |x| *x));

    assert!(out.is_empty());
}

fn sequential_scan(values: &[i64]) -> Vec<i64> {
    values
        .iter()
        .scan(0i64, |acc, x| {
            *acc = acc.wrapping_add(*x);
            Some(*acc)
        })
        .collect()
}

#[test]
fn test_scan_empty() {
    let data: Arc<[u32]> = Arc::new([]);
    let out = ImmediateScheduler::new().schedule(algorithm::scan(data, 4, |x| *x, |a, b| a + b));

    assert!(out.is_empty());
}

#[test]
fn test_scan_prefix_sums_on_pool() {
    let data = common::numbers(10_000);

    let pool = BusyPool::with_workers(4).unwrap();
    let sums = pool.schedule(algorithm::scan(data.clone(), 16, |x| *x, |a, b| a + b));

    let mut acc = 0;
    let expected: Vec<u64> = data
        .iter()
        .map(|x| {
            acc += x;
            acc
        })
        .collect();

    assert_eq!(sums, expected);
}

#[test]
fn test_scan_keeps_index_order() {
    let letters: Arc<[char]> = ('a'..='h').collect();

    let pool = BusyPool::with_workers(2).unwrap();
    let out = pool.schedule(algorithm::scan(letters, 1, |c| c.to_string(), |a, b| a + &b));

    assert_eq!(out, ["a", "ab", "abc", "abcd", "abcde", "abcdef", "abcdefg", "abcdefgh"]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_fold_matches_iterator_sum(values in prop::collection::vec(0u64..1_000_000, 0..2000), grain in 0usize..64) {
        let expected = values.iter().copied().reduce(|a, b| a + b);
        let data: Arc<[u64]> = values.into();

        let result = ImmediateScheduler::new().schedule(algorithm::fold(data, grain, |x| *x, |a, b| a + b));

        prop_assert_eq!(result, expected);
    }

    #[test]
    fn test_map_matches_iterator_map(values in prop::collection::vec(any::<i32>(), 0..1000), grain in 1usize..32) {
        let expected: Vec<i64> = values.iter().map(|x| *x as i64 * 3).collect();
        let data: Arc<[i32]> = values.into();

        let result = ImmediateScheduler::new().schedule(algorithm::map(data, grain, |x| *x as i64 * 3));

        prop_assert_eq!(result, expected);
    }

    #[test]
    fn test_scan_matches_sequential_scan(values in prop::collection::vec(any::<i64>(), 0..1500), grain in 0usize..48) {
        let expected = sequential_scan(&values);
        let data: Arc<[i64]> = values.into();

        let immediate = ImmediateScheduler::new()
            .schedule(algorithm::scan(data.clone(), grain, |x| *x, |a: i64, b| a.wrapping_add(b)));
        prop_assert_eq!(&immediate, &expected);

        let pool = BusyPool::with_workers(3).unwrap();
        let pooled = pool.schedule(algorithm::scan(data, grain, |x| *x, |a: i64, b| a.wrapping_add(b)));
        prop_assert_eq!(pooled, expected);
    }
}

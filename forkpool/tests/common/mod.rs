#![allow(dead_code)]

use forkpool::task::{Task, call, fork};

use std::sync::{Arc, Once};
use tracing_subscriber::EnvFilter;

/// Installs a test subscriber once per test binary.
///
/// Filtered through `RUST_LOG`, e.g. `RUST_LOG=forkpool=trace`.
pub fn init_tracing() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Parallel Fibonacci: forks `n - 1`, calls `n - 2`.
pub fn fib(n: u64) -> Task<u64> {
    Task::new(async move {
        if n < 2 {
            return n;
        }

        let a = fork(fib(n - 1)).await;
        let b = call(fib(n - 2)).await;

        a.await + b
    })
}

pub fn fib_serial(n: u64) -> u64 {
    if n < 2 { n } else { fib_serial(n - 1) + fib_serial(n - 2) }
}

/// Parallel sum of `data[lo..hi]`, split until ranges hold `grain` items.
pub fn sum(data: Arc<[u64]>, lo: usize, hi: usize, grain: usize) -> Task<u64> {
    Task::new(async move {
        if hi - lo <= grain {
            return data[lo..hi].iter().sum();
        }

        let mid = lo + (hi - lo) / 2;

        let left = fork(sum(data.clone(), lo, mid, grain)).await;
        let right = fork(sum(data, mid, hi, grain)).await;

        left.await + right.await
    })
}

pub fn numbers(n: u64) -> Arc<[u64]> {
    (0..n).collect()
}

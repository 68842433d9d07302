//! Divide-and-conquer helpers built on fork and join.
//!
//! Each helper splits a shared slice in halves, forking the left half
//! and calling the right one, until a range holds at most `grain`
//! items. A `grain` of 0 is treated as 1.
//!
//! The returned [`Task`] can be scheduled as a root or forked from
//! another task.
//!
//! ```
//! use forkpool::algorithm;
//! use forkpool::{ImmediateScheduler, Scheduler};
//! use std::sync::Arc;
//!
//! let data: Arc<[u64]> = (1..=100).collect();
//! let task = algorithm::fold(data, 8, |x| *x, |a, b| a + b);
//!
//! assert_eq!(ImmediateScheduler::new().schedule(task), Some(5050));
//! ```

use crate::task::{Task, call, fork};

use std::sync::Arc;

/// Reduces `data` to a single value.
///
/// Every item is mapped with `f`, then results are combined with
/// `combine` in index order (left before right). `combine` must be
/// associative for the result to be independent of `grain`.
///
/// Returns `None` if `data` is empty.
pub fn fold<T, R, F, C>(data: Arc<[T]>, grain: usize, f: F, combine: C) -> Task<Option<R>>
where
    T: Send + Sync + 'static,
    R: Send + 'static,
    F: Fn(&T) -> R + Send + Sync + 'static,
    C: Fn(R, R) -> R + Send + Sync + 'static,
{
    let len = data.len();
    fold_range(data, 0, len, grain.max(1), Arc::new((f, combine)))
}

fn fold_range<T, R, F, C>(
    data: Arc<[T]>,
    lo: usize,
    hi: usize,
    grain: usize,
    ops: Arc<(F, C)>,
) -> Task<Option<R>>
where
    T: Send + Sync + 'static,
    R: Send + 'static,
    F: Fn(&T) -> R + Send + Sync + 'static,
    C: Fn(R, R) -> R + Send + Sync + 'static,
{
    Task::new(async move {
        let (f, combine) = &*ops;

        if hi - lo <= grain {
            return data[lo..hi].iter().map(f).reduce(combine);
        }

        let mid = lo + (hi - lo) / 2;

        let left = fork(fold_range(data.clone(), lo, mid, grain, ops.clone())).await;
        let right = call(fold_range(data, mid, hi, grain, ops.clone())).await;

        match (left.await, right) {
            (Some(left), Some(right)) => Some(combine(left, right)),
            (left, None) => left,
            (None, right) => right,
        }
    })
}

/// Inclusive prefix scan of `data`.
///
/// Item `i` of the result is the combination of `f` applied to items
/// `0..=i`, combined left to right. `combine` must be associative.
///
/// Runs in two passes over the same split tree: an up-sweep that
/// reduces every range, then a down-sweep that scans the leaves with
/// the total of everything to their left.
///
/// ```
/// use forkpool::algorithm;
/// use forkpool::{ImmediateScheduler, Scheduler};
/// use std::sync::Arc;
///
/// let data: Arc<[u32]> = Arc::new([1, 2, 3, 4]);
/// let task = algorithm::scan(data, 1, |x| *x, |a, b| a + b);
///
/// assert_eq!(ImmediateScheduler::new().schedule(task), vec![1, 3, 6, 10]);
/// ```
pub fn scan<T, R, F, C>(data: Arc<[T]>, grain: usize, f: F, combine: C) -> Task<Vec<R>>
where
    T: Send + Sync + 'static,
    R: Clone + Send + 'static,
    F: Fn(&T) -> R + Send + Sync + 'static,
    C: Fn(R, R) -> R + Send + Sync + 'static,
{
    let len = data.len();
    let grain = grain.max(1);
    let ops = Arc::new((f, combine));

    Task::new(async move {
        let tree = call(reduce_range(data.clone(), 0, len, grain, ops.clone())).await;
        call(scan_range(data, 0, len, grain, ops, tree, None)).await
    })
}

/// Range totals from the up-sweep, shaped like the split tree.
enum SumTree<R> {
    Leaf(Option<R>),
    Node {
        total: Option<R>,
        left: Box<SumTree<R>>,
        right: Box<SumTree<R>>,
    },
}

impl<R> SumTree<R> {
    fn total(&self) -> &Option<R> {
        match self {
            SumTree::Leaf(total) | SumTree::Node { total, .. } => total,
        }
    }
}

fn combine_opt<R, C: Fn(R, R) -> R>(combine: &C, left: Option<R>, right: Option<R>) -> Option<R> {
    match (left, right) {
        (Some(left), Some(right)) => Some(combine(left, right)),
        (left, None) => left,
        (None, right) => right,
    }
}

fn reduce_range<T, R, F, C>(
    data: Arc<[T]>,
    lo: usize,
    hi: usize,
    grain: usize,
    ops: Arc<(F, C)>,
) -> Task<SumTree<R>>
where
    T: Send + Sync + 'static,
    R: Clone + Send + 'static,
    F: Fn(&T) -> R + Send + Sync + 'static,
    C: Fn(R, R) -> R + Send + Sync + 'static,
{
    Task::new(async move {
        let (f, combine) = &*ops;

        if hi - lo <= grain {
            return SumTree::Leaf(data[lo..hi].iter().map(f).reduce(combine));
        }

        let mid = lo + (hi - lo) / 2;

        let left = fork(reduce_range(data.clone(), lo, mid, grain, ops.clone())).await;
        let right = call(reduce_range(data, mid, hi, grain, ops.clone())).await;
        let left = left.await;

        let total = combine_opt(combine, left.total().clone(), right.total().clone());

        SumTree::Node {
            total,
            left: Box::new(left),
            right: Box::new(right),
        }
    })
}

/// Scans `data[lo..hi]`, starting from `carry`, the total of every item
/// before `lo`.
fn scan_range<T, R, F, C>(
    data: Arc<[T]>,
    lo: usize,
    hi: usize,
    grain: usize,
    ops: Arc<(F, C)>,
    tree: SumTree<R>,
    carry: Option<R>,
) -> Task<Vec<R>>
where
    T: Send + Sync + 'static,
    R: Clone + Send + 'static,
    F: Fn(&T) -> R + Send + Sync + 'static,
    C: Fn(R, R) -> R + Send + Sync + 'static,
{
    Task::new(async move {
        let (f, combine) = &*ops;

        let (left_tree, right_tree) = match tree {
            SumTree::Node { left, right, .. } => (*left, *right),
            SumTree::Leaf(_) => {
                let mut acc = carry;
                let mut out = Vec::with_capacity(hi - lo);

                for item in &data[lo..hi] {
                    let next = combine_opt(combine, acc.take(), Some(f(item)));
                    out.extend(next.clone());
                    acc = next;
                }

                return out;
            }
        };

        let mid = lo + (hi - lo) / 2;
        let right_carry = combine_opt(combine, carry.clone(), left_tree.total().clone());

        let left = fork(scan_range(data.clone(), lo, mid, grain, ops.clone(), left_tree, carry)).await;
        let right = call(scan_range(data, mid, hi, grain, ops.clone(), right_tree, right_carry)).await;

        let mut out = left.await;
        out.extend(right);
        out
    })
}

/// Calls `f` on every item of `data`, in parallel.
///
/// No order is guaranteed between items.
pub fn for_each<T, F>(data: Arc<[T]>, grain: usize, f: F) -> Task<()>
where
    T: Send + Sync + 'static,
    F: Fn(&T) + Send + Sync + 'static,
{
    let len = data.len();
    for_each_range(data, 0, len, grain.max(1), Arc::new(f))
}

fn for_each_range<T, F>(data: Arc<[T]>, lo: usize, hi: usize, grain: usize, f: Arc<F>) -> Task<()>
where
    T: Send + Sync + 'static,
    F: Fn(&T) + Send + Sync + 'static,
{
    Task::new(async move {
        if hi - lo <= grain {
            data[lo..hi].iter().for_each(&*f);
            return;
        }

        let mid = lo + (hi - lo) / 2;

        let left = fork(for_each_range(data.clone(), lo, mid, grain, f.clone())).await;
        call(for_each_range(data, mid, hi, grain, f)).await;

        left.await
    })
}

/// Maps every item of `data` with `f`, in parallel.
///
/// The results are returned in input order.
pub fn map<T, R, F>(data: Arc<[T]>, grain: usize, f: F) -> Task<Vec<R>>
where
    T: Send + Sync + 'static,
    R: Send + 'static,
    F: Fn(&T) -> R + Send + Sync + 'static,
{
    let len = data.len();
    map_range(data, 0, len, grain.max(1), Arc::new(f))
}

fn map_range<T, R, F>(data: Arc<[T]>, lo: usize, hi: usize, grain: usize, f: Arc<F>) -> Task<Vec<R>>
where
    T: Send + Sync + 'static,
    R: Send + 'static,
    F: Fn(&T) -> R + Send + Sync + 'static,
{
    Task::new(async move {
        if hi - lo <= grain {
            return data[lo..hi].iter().map(&*f).collect();
        }

        let mid = lo + (hi - lo) / 2;

        let left = fork(map_range(data.clone(), lo, mid, grain, f.clone())).await;
        let right = call(map_range(data, mid, hi, grain, f)).await;

        let mut out = left.await;
        out.extend(right);
        out
    })
}

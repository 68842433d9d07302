//! Pool configuration and environment overrides.
//!
//! Settings are resolved in this order (highest priority first):
//!
//! 1. values set through [`PoolBuilder`](super::builder::PoolBuilder) methods,
//! 2. `FORKPOOL_*` environment variables, when the builder was created
//!    with [`PoolBuilder::from_env`](super::builder::PoolBuilder::from_env),
//! 3. the defaults of [`PoolConfig::default`].
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `FORKPOOL_WORKER_THREADS` | `usize` (> 0) | `worker_threads` |
//! | `FORKPOOL_IDLE_POLICY` | `spin` or `park` | `idle_policy` |
//! | `FORKPOOL_THREAD_NAME_PREFIX` | `String` | `thread_name_prefix` |
//! | `FORKPOOL_THREAD_STACK_SIZE` | `usize` | `thread_stack_size` |
//! | `FORKPOOL_DEQUE_CAPACITY` | `usize` (power of two) | `deque_capacity` |

use crate::deque::DEFAULT_CAPACITY;
use crate::error::{BuildError, ParseIdlePolicyError};

use std::str::FromStr;
use std::thread;

/// Environment variable for the worker count.
pub const ENV_WORKER_THREADS: &str = "FORKPOOL_WORKER_THREADS";
/// Environment variable for the idle policy.
pub const ENV_IDLE_POLICY: &str = "FORKPOOL_IDLE_POLICY";
/// Environment variable for the worker thread name prefix.
pub const ENV_THREAD_NAME_PREFIX: &str = "FORKPOOL_THREAD_NAME_PREFIX";
/// Environment variable for the worker stack size, in bytes.
pub const ENV_THREAD_STACK_SIZE: &str = "FORKPOOL_THREAD_STACK_SIZE";
/// Environment variable for the initial deque capacity.
pub const ENV_DEQUE_CAPACITY: &str = "FORKPOOL_DEQUE_CAPACITY";

/// What a worker does when no work can be found anywhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum IdlePolicy {
    /// Keep polling: spin with exponential backoff, then yield the
    /// thread between sweeps. Lowest latency, burns a core per idle
    /// worker.
    #[default]
    Spin,

    /// After the backoff, sleep on a condition variable until new work
    /// is pushed or a short timeout expires.
    Park,
}

impl FromStr for IdlePolicy {
    type Err = ParseIdlePolicyError;

    fn from_str(s: &str) -> Result<Self, ParseIdlePolicyError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spin" | "busy" => Ok(IdlePolicy::Spin),
            "park" | "sleep" => Ok(IdlePolicy::Park),
            _ => Err(ParseIdlePolicyError(s.to_owned())),
        }
    }
}

/// Settings of a [`BusyPool`](super::pool::BusyPool).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of worker threads.
    pub worker_threads: usize,

    /// Idle behavior of workers.
    pub idle_policy: IdlePolicy,

    /// Worker threads are named `{prefix}-{index}`.
    pub thread_name_prefix: String,

    /// Stack size of worker threads, or the platform default.
    pub thread_stack_size: Option<usize>,

    /// Initial capacity of each worker deque. Must be a power of two.
    pub deque_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let worker_threads = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            worker_threads,
            idle_policy: IdlePolicy::Spin,
            thread_name_prefix: String::from("forkpool-worker"),
            thread_stack_size: None,
            deque_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl PoolConfig {
    /// Checks that the configuration can start a pool.
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.worker_threads == 0 {
            return Err(BuildError::InvalidValue {
                field: "worker_threads",
                reason: String::from("must be > 0"),
            });
        }

        if !self.deque_capacity.is_power_of_two() {
            return Err(BuildError::InvalidValue {
                field: "deque_capacity",
                reason: format!("{} is not a power of two", self.deque_capacity),
            });
        }

        if self.thread_stack_size == Some(0) {
            return Err(BuildError::InvalidValue {
                field: "thread_stack_size",
                reason: String::from("must be > 0"),
            });
        }

        Ok(())
    }
}

/// Applies `FORKPOOL_*` environment variables to `config`.
///
/// Only variables that are set are applied. A variable that is set but
/// cannot be parsed is an error.
pub fn apply_env_overrides(config: &mut PoolConfig) -> Result<(), BuildError> {
    apply_overrides(config, |name| std::env::var(name).ok())
}

/// Applies overrides read through `lookup` to `config`.
///
/// `lookup` maps a variable name to its value, if set.
pub fn apply_overrides<F>(config: &mut PoolConfig, lookup: F) -> Result<(), BuildError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(ENV_WORKER_THREADS) {
        let workers = parse_usize(ENV_WORKER_THREADS, &value)?;

        if workers == 0 {
            return Err(invalid_env(ENV_WORKER_THREADS, "a positive integer", value));
        }

        config.worker_threads = workers;
    }

    if let Some(value) = lookup(ENV_IDLE_POLICY) {
        config.idle_policy = value
            .parse::<IdlePolicy>()
            .map_err(|_| invalid_env(ENV_IDLE_POLICY, "`spin` or `park`", value.clone()))?;
    }

    if let Some(value) = lookup(ENV_THREAD_NAME_PREFIX) {
        config.thread_name_prefix = value;
    }

    if let Some(value) = lookup(ENV_THREAD_STACK_SIZE) {
        config.thread_stack_size = Some(parse_usize(ENV_THREAD_STACK_SIZE, &value)?);
    }

    if let Some(value) = lookup(ENV_DEQUE_CAPACITY) {
        let capacity = parse_usize(ENV_DEQUE_CAPACITY, &value)?;

        if !capacity.is_power_of_two() {
            return Err(invalid_env(ENV_DEQUE_CAPACITY, "a power of two", value));
        }

        config.deque_capacity = capacity;
    }

    Ok(())
}

fn parse_usize(var: &'static str, value: &str) -> Result<usize, BuildError> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| invalid_env(var, "an unsigned integer", value.to_owned()))
}

fn invalid_env(var: &'static str, expected: &'static str, value: String) -> BuildError {
    BuildError::InvalidEnv {
        var,
        expected,
        value,
    }
}

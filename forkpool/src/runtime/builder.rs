use super::config::{self, IdlePolicy, PoolConfig};
use super::pool::BusyPool;
use crate::error::BuildError;

/// Builder for configuring and starting a [`BusyPool`].
///
/// # Examples
///
/// ```
/// use forkpool::{IdlePolicy, PoolBuilder, Scheduler, Task};
///
/// let pool = PoolBuilder::new()
///     .worker_threads(2)
///     .idle_policy(IdlePolicy::Park)
///     .build()
///     .unwrap();
///
/// assert_eq!(pool.schedule(Task::new(async { 1 + 1 })), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PoolBuilder {
    config: PoolConfig,
}

impl PoolBuilder {
    /// Creates a builder with the default configuration.
    ///
    /// By default, the number of worker threads is the number of
    /// available logical CPUs, falling back to `1` if unavailable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder from the default configuration with the
    /// `FORKPOOL_*` environment variables applied.
    ///
    /// Methods called on the returned builder take precedence over the
    /// environment.
    pub fn from_env() -> Result<Self, BuildError> {
        let mut config = PoolConfig::default();
        config::apply_env_overrides(&mut config)?;

        Ok(Self { config })
    }

    /// Creates a builder from an explicit configuration.
    pub fn from_config(config: PoolConfig) -> Self {
        Self { config }
    }

    /// Sets the number of worker threads.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn worker_threads(mut self, n: usize) -> Self {
        assert!(n > 0, "worker_threads must be > 0");

        self.config.worker_threads = n;
        self
    }

    /// Sets what idle workers do.
    pub fn idle_policy(mut self, policy: IdlePolicy) -> Self {
        self.config.idle_policy = policy;
        self
    }

    /// Sets the prefix of worker thread names.
    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    /// Sets the stack size of worker threads, in bytes.
    ///
    /// Deeply recursive task trees resume nested children on the worker
    /// stack, so large trees may need more than the platform default.
    pub fn thread_stack_size(mut self, size: usize) -> Self {
        self.config.thread_stack_size = Some(size);
        self
    }

    /// Sets the initial capacity of each worker deque.
    ///
    /// Deques grow on demand; this only avoids early resizes. Checked
    /// to be a power of two by [`build`](Self::build).
    pub fn deque_capacity(mut self, capacity: usize) -> Self {
        self.config.deque_capacity = capacity;
        self
    }

    /// Returns the configuration built so far.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Validates the configuration and starts the pool.
    pub fn build(self) -> Result<BusyPool, BuildError> {
        self.config.validate()?;
        BusyPool::start(self.config)
    }
}
